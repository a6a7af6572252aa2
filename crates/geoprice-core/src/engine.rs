//! # Pricing Engine
//!
//! Wires the registry, rate table, resolver and discounts for one store.
//!
//! ## Request Path
//! ```text
//! ┌──────────┐   ┌─────────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ signals  │──►│ CountryResolver │──►│ CurrencyRegistry │──►│ PriceResolver│
//! │ + geo    │   │  country        │   │  currency        │   │  + Discounts │
//! └──────────┘   └─────────────────┘   └──────────────────┘   └──────┬───────┘
//!                                                                    ▼
//!                                                               Quote
//! ```
//!
//! The engine is immutable. The rate table and registry are shared through
//! `Arc`, so building an engine per settings change is cheap.

use serde::Serialize;
use std::sync::Arc;

use crate::backfill::{price_fields, target_currencies, BatchConverter, PriceField};
use crate::discount::DiscountEngine;
use crate::pricing::{PriceResolver, RequestContext, ResolvedPrice, VisitorPricing};
use crate::rates::{Converter, RateTable, RoundingPolicy};
use crate::registry::{CountryOption, CurrencyRegistry};
use crate::resolver::{CountryResolver, Geolocator, VisitorSignals};
use crate::settings::{PricingSettings, StoreSettings};
use crate::types::{CountryCode, CurrencyCode, ProductPrices};

/// What the storefront shows for one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub country: CountryCode,
    pub currency: CurrencyCode,
    pub symbol: Option<String>,
    pub flag: Option<String>,
    pub price: ResolvedPrice,
    pub purchasable: bool,
}

/// Storefront pricing for one store configuration.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    store: StoreSettings,
    settings: PricingSettings,
    registry: Arc<CurrencyRegistry>,
    converter: Converter,
    resolver: PriceResolver,
    discounts: DiscountEngine,
    countries: CountryResolver,
}

impl PricingEngine {
    pub fn new(
        store: StoreSettings,
        settings: PricingSettings,
        registry: Arc<CurrencyRegistry>,
        rates: Arc<RateTable>,
    ) -> Self {
        let rounding = RoundingPolicy::new(store.price_decimals);
        PricingEngine {
            converter: Converter::new(rates, rounding, store.base_currency.clone()),
            resolver: PriceResolver::new(store.base_currency.clone()),
            discounts: DiscountEngine::new(settings.discounts.clone()),
            countries: CountryResolver::new(&store.base_country),
            registry,
            settings,
            store,
        }
    }

    pub fn store(&self) -> &StoreSettings {
        &self.store
    }

    pub fn settings(&self) -> &PricingSettings {
        &self.settings
    }

    pub fn registry(&self) -> &CurrencyRegistry {
        &self.registry
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn base_currency(&self) -> &CurrencyCode {
        &self.store.base_currency
    }

    // =========================================================================
    // Country & Currency
    // =========================================================================

    /// Resolves the visitor's country.
    pub fn visitor_country(&self, signals: &VisitorSignals, geo: &dyn Geolocator) -> CountryCode {
        self.countries.resolve(signals, geo)
    }

    /// Currency for a country; unknown countries pay in the base currency.
    pub fn currency_for(&self, country: &CountryCode) -> CurrencyCode {
        self.registry
            .currency_of(country)
            .unwrap_or_else(|| self.store.base_currency.clone())
    }

    /// Visitor currency, memoized in the request context.
    pub fn visitor_currency(
        &self,
        ctx: &RequestContext,
        signals: &VisitorSignals,
        geo: &dyn Geolocator,
    ) -> CurrencyCode {
        ctx.currency_with(&self.store.base_currency, || {
            self.currency_for(&self.visitor_country(signals, geo))
        })
    }

    /// Countries pricing is enabled for, base country included.
    pub fn supported_countries(&self) -> Vec<CountryOption> {
        self.registry
            .supported_countries(&self.settings.enabled_countries, &self.store.base_country)
    }

    /// Currencies that need per-currency price fields.
    pub fn target_currencies(&self) -> Vec<CurrencyCode> {
        target_currencies(
            &self.registry,
            &self.supported_countries(),
            &self.store.base_currency,
        )
    }

    /// Inputs of the per-product pricing form.
    pub fn price_fields(&self) -> Vec<PriceField> {
        price_fields(
            &self.registry,
            &self.supported_countries(),
            &self.store.base_currency,
        )
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Price provider for one visitor.
    pub fn visitor(&self, country: CountryCode) -> VisitorPricing<'_> {
        let currency = self.currency_for(&country);
        VisitorPricing::new(
            country,
            currency,
            &self.resolver,
            &self.discounts,
            self.converter.rounding(),
        )
    }

    /// Full storefront quote for a product and country.
    pub fn quote(&self, product: &ProductPrices, country: &CountryCode, host_purchasable: bool) -> Quote {
        let visitor = self.visitor(country.clone());
        let price = visitor.price(product);
        let purchasable = self
            .resolver
            .is_purchasable(product, &visitor.currency, host_purchasable);

        Quote {
            // Unknown countries are served the base currency, so show its symbol
            symbol: self
                .registry
                .symbol_of(country)
                .or_else(|| self.registry.symbol_of(&self.store.base_country)),
            flag: self.registry.flag_of(country),
            currency: visitor.currency.clone(),
            country: visitor.country.clone(),
            price,
            purchasable,
        }
    }

    /// Batch converter bound to this store's base currency and rounding.
    pub fn batch_converter(&self) -> BatchConverter {
        BatchConverter::new(self.converter.clone())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
