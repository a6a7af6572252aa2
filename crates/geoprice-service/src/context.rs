//! # Pricing Context
//!
//! Everything a service needs to build a [`PricingEngine`]: the database,
//! the store's identity and the immutable rate table and registry.
//!
//! ```text
//!   GeoPriceConfig ──► StoreSettings, Arc<RateTable>
//!                             │
//!   options table  ──► PricingSettings, CurrencyOverrides
//!                             │
//!                             ▼
//!                     PricingEngine (per call)
//! ```
//!
//! Settings live in storage and may change between calls, so the engine is
//! rebuilt from a fresh read every time. The rate table and the built-in
//! registry never change and are shared through `Arc`.

use std::sync::Arc;
use tracing::debug;

use geoprice_core::{CurrencyRegistry, PricingEngine, RateTable, StoreSettings};
use geoprice_db::Database;

use crate::config::GeoPriceConfig;
use crate::error::ServiceResult;

/// Shared handles for building pricing engines.
#[derive(Debug, Clone)]
pub struct PricingContext {
    db: Database,
    store: StoreSettings,
    rates: Arc<RateTable>,
    registry: Arc<CurrencyRegistry>,
}

impl PricingContext {
    pub fn new(db: Database, store: StoreSettings, rates: Arc<RateTable>) -> Self {
        PricingContext {
            db,
            store,
            rates,
            registry: Arc::new(CurrencyRegistry::builtin()),
        }
    }

    /// Builds a context from validated configuration.
    pub fn from_config(db: Database, config: &GeoPriceConfig) -> ServiceResult<Self> {
        let rates = config.rate_table()?;
        Ok(PricingContext::new(db, config.store_settings(), Arc::new(rates)))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn store(&self) -> &StoreSettings {
        &self.store
    }

    pub fn rates(&self) -> &Arc<RateTable> {
        &self.rates
    }

    /// Builds an engine from the current stored settings.
    pub async fn engine(&self) -> ServiceResult<PricingEngine> {
        let options = self.db.options();
        let settings = options.pricing_settings().await?;
        let overrides = options.currency_overrides().await?;

        let registry = if overrides.is_empty() {
            Arc::clone(&self.registry)
        } else {
            debug!(
                currencies = overrides.currencies.len(),
                symbols = overrides.symbols.len(),
                "Applying currency overrides"
            );
            Arc::new(overrides.apply(CurrencyRegistry::clone(&self.registry)))
        };

        Ok(PricingEngine::new(
            self.store.clone(),
            settings,
            registry,
            Arc::clone(&self.rates),
        ))
    }
}
