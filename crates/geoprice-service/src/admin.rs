//! # Admin Pricing Service
//!
//! Settings screens, the per-product price form and batch control.
//!
//! ## Save Flows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  save_settings(countries, rows)                                        │
//! │     sanitize ──► options.pricing_settings ──► schedule batch run       │
//! │                                                                         │
//! │  save_currency_overrides(overrides)                                    │
//! │     validate ──► options.currency_overrides ──► schedule batch run     │
//! │                                                                         │
//! │  save_product_prices(product_id, submission)                           │
//! │     load product ──► BatchConverter::plan(.., Some(submission))        │
//! │                  ──► apply_plan (Overwrite for submitted values)       │
//! │                                                                         │
//! │  run_batch_now(token)                                                  │
//! │     verify token ──► BatchRunner::run_full_pass                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Saving settings may add currencies, so every settings save schedules a
//! batch run. Scheduling is idempotent: a run already pending is reused.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use geoprice_core::backfill::PriceField;
use geoprice_core::validation::RawDiscountRow;
use geoprice_core::{CurrencyOverrides, PriceSubmission, PricingSettings, TokenVerifier};

use crate::batch::{BatchRunner, BatchSummary};
use crate::context::PricingContext;
use crate::error::{ServiceError, ServiceResult};
use crate::worker::BatchWorkerHandle;

/// Token action protecting the manual batch trigger.
pub const RUN_BATCH_TOKEN_ACTION: &str = "run_price_batch";

/// Progress shown on the settings screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchStatus {
    /// A run is pending or in progress.
    pub scheduled: bool,
    pub run_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// End of the last finished run.
    pub completed_at: Option<DateTime<Utc>>,
    pub ready_products: i64,
    pub total_products: i64,
}

/// Admin-side pricing operations.
#[derive(Debug, Clone)]
pub struct AdminPricing {
    ctx: PricingContext,
    runner: BatchRunner,
    worker: Option<BatchWorkerHandle>,
}

impl AdminPricing {
    pub fn new(runner: BatchRunner) -> Self {
        AdminPricing {
            ctx: runner.context().clone(),
            runner,
            worker: None,
        }
    }

    /// Routes scheduling through a running worker so runs start right away.
    pub fn with_worker(mut self, handle: BatchWorkerHandle) -> Self {
        self.worker = Some(handle);
        self
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub async fn settings(&self) -> ServiceResult<PricingSettings> {
        Ok(self.ctx.db().options().pricing_settings().await?)
    }

    /// Sanitizes and stores the settings form, then schedules a batch run.
    ///
    /// Invalid discount rows are dropped, not rejected.
    pub async fn save_settings<S: AsRef<str>>(
        &self,
        enabled_countries: &[S],
        discount_rows: &[RawDiscountRow],
    ) -> ServiceResult<PricingSettings> {
        let settings = PricingSettings::sanitize(enabled_countries, discount_rows);
        let dropped = discount_rows.len() - settings.discounts.len();
        if dropped > 0 {
            warn!(dropped, "Ignoring invalid discount rows");
        }

        self.ctx.db().options().save_pricing_settings(&settings).await?;
        info!(
            countries = settings.enabled_countries.len(),
            discounts = settings.discounts.len(),
            "Pricing settings saved"
        );

        self.schedule_batch().await?;
        Ok(settings)
    }

    pub async fn currency_overrides(&self) -> ServiceResult<CurrencyOverrides> {
        Ok(self.ctx.db().options().currency_overrides().await?)
    }

    pub async fn save_currency_overrides(&self, overrides: &CurrencyOverrides) -> ServiceResult<()> {
        overrides.validate()?;
        self.ctx
            .db()
            .options()
            .save_currency_overrides(overrides)
            .await?;
        info!(
            currencies = overrides.currencies.len(),
            symbols = overrides.symbols.len(),
            "Currency overrides saved"
        );

        self.schedule_batch().await?;
        Ok(())
    }

    // =========================================================================
    // Product Form
    // =========================================================================

    /// Inputs the product form should render.
    pub async fn price_fields(&self) -> ServiceResult<Vec<PriceField>> {
        Ok(self.ctx.engine().await?.price_fields())
    }

    /// Stores the per-currency prices from a product form save.
    ///
    /// Submitted values replace stored ones. Fields left blank keep their
    /// stored value, or are auto-converted when nothing is stored.
    ///
    /// ## Returns
    /// Number of fields written.
    pub async fn save_product_prices(
        &self,
        product_id: &str,
        submission: &PriceSubmission,
    ) -> ServiceResult<u64> {
        let engine = self.ctx.engine().await?;
        let products = self.ctx.db().products();
        let product = products
            .load_prices(product_id)
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound(product_id.to_string()))?;

        let plan = engine
            .batch_converter()
            .plan(&product, &engine.target_currencies(), Some(submission));
        if !plan.unrated.is_empty() {
            warn!(
                product_id,
                currencies = ?plan.unrated,
                "No exchange rate, storing base amount unconverted"
            );
        }

        let written = products.apply_plan(&plan).await?;
        info!(product_id, written, "Product prices saved");
        Ok(written)
    }

    // =========================================================================
    // Batch Control
    // =========================================================================

    /// Schedules a batch run unless one is pending.
    pub async fn schedule_batch(&self) -> ServiceResult<Option<Uuid>> {
        if let Some(worker) = &self.worker {
            return worker.schedule().await;
        }

        let run = self.ctx.db().options().try_schedule_batch().await?;
        if let Some(run) = &run {
            info!(run_id = %run.run_id, "Batch run scheduled, waiting for a worker");
        }
        Ok(run.map(|run| run.run_id))
    }

    pub async fn batch_status(&self) -> ServiceResult<BatchStatus> {
        let options = self.ctx.db().options();
        let products = self.ctx.db().products();

        let run = options.scheduled_batch().await?;
        Ok(BatchStatus {
            scheduled: run.is_some(),
            run_id: run.as_ref().map(|r| r.run_id),
            scheduled_at: run.as_ref().map(|r| r.scheduled_at),
            completed_at: options.batch_completed_at().await?,
            ready_products: products.count_ready().await?,
            total_products: products.count().await?,
        })
    }

    /// Runs a full pass in the caller's task after checking the token.
    pub async fn run_batch_now(
        &self,
        token: &str,
        verifier: &(dyn TokenVerifier + Sync),
    ) -> ServiceResult<BatchSummary> {
        if !verifier.verify(token, RUN_BATCH_TOKEN_ACTION) {
            warn!("Manual batch run rejected: invalid token");
            return Err(ServiceError::InvalidToken {
                action: RUN_BATCH_TOKEN_ACTION.to_string(),
            });
        }

        info!("Manual batch run started");
        self.runner.run_full_pass().await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeoPriceConfig;
    use geoprice_core::{CountryCode, CurrencyCode, PriceKind};
    use geoprice_db::{Database, DbConfig, NewProduct};
    use rust_decimal::Decimal;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn admin() -> AdminPricing {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = GeoPriceConfig::default();
        let ctx = PricingContext::from_config(db, &config).unwrap();
        AdminPricing::new(BatchRunner::new(ctx, config.batch.clone()))
    }

    #[tokio::test]
    async fn test_save_settings_sanitizes_and_schedules() {
        let admin = admin().await;
        let rows = vec![
            RawDiscountRow::new("DE", "percent", "10"),
            RawDiscountRow::new("", "percent", "10"),
            RawDiscountRow::new("FR", "bogus", "5"),
            RawDiscountRow::new("JP", "amount", "-3"),
        ];

        let saved = admin.save_settings(&["de", " ", "JP"], &rows).await.unwrap();
        assert_eq!(
            saved.enabled_countries,
            vec![CountryCode::new("DE"), CountryCode::new("JP")]
        );
        // Blank country, unknown type and non-positive amount rows are dropped
        assert_eq!(saved.discounts.len(), 1);
        assert_eq!(saved.discounts[0].country, CountryCode::new("DE"));

        assert_eq!(admin.settings().await.unwrap(), saved);
        let status = admin.batch_status().await.unwrap();
        assert!(status.scheduled);
        assert!(status.run_id.is_some());

        // A pending run is reused
        assert!(admin.schedule_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_overrides_rejected() {
        let admin = admin().await;
        let mut overrides = CurrencyOverrides::default();
        overrides
            .currencies
            .insert(CountryCode::new("PK"), CurrencyCode::new(""));

        assert!(admin.save_currency_overrides(&overrides).await.is_err());
        assert!(admin.currency_overrides().await.unwrap().is_empty());
        assert!(!admin.batch_status().await.unwrap().scheduled);
    }

    #[tokio::test]
    async fn test_save_product_prices() {
        let admin = admin().await;
        admin.save_settings(&["DE"], &[]).await.unwrap();
        let p = admin
            .ctx
            .db()
            .products()
            .insert(&NewProduct::published("Shirt", d("100")))
            .await
            .unwrap();

        let fields = admin.price_fields().await.unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields.iter().all(|f| f.currency.as_str() == "EUR"));

        let submission = PriceSubmission::from_form([
            ("regular_price_EUR", "95"),
            ("sale_price_EUR", ""),
        ]);
        let written = admin.save_product_prices(&p.id, &submission).await.unwrap();
        assert_eq!(written, 2);

        let loaded = admin
            .ctx
            .db()
            .products()
            .load_prices(&p.id)
            .await
            .unwrap()
            .unwrap();
        let eur = CurrencyCode::new("EUR");
        assert_eq!(loaded.meta.get(&PriceKind::Regular.meta_key(&eur)), Some(&d("95")));
        // Blank sale input falls back to the converted base regular price
        assert_eq!(loaded.meta.get(&PriceKind::Sale.meta_key(&eur)), Some(&d("91.00")));

        // A later save overwrites the admin value
        let submission = PriceSubmission::new().with(PriceKind::Regular, &eur, d("97"));
        admin.save_product_prices(&p.id, &submission).await.unwrap();
        let loaded = admin
            .ctx
            .db()
            .products()
            .load_prices(&p.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.meta.get(&PriceKind::Regular.meta_key(&eur)), Some(&d("97")));
    }

    #[tokio::test]
    async fn test_save_prices_refills_blank_stored_value() {
        let admin = admin().await;
        admin.save_settings(&["DE"], &[]).await.unwrap();
        let products = admin.ctx.db().products();
        let p = products
            .insert(&NewProduct::published("Shirt", d("100")))
            .await
            .unwrap();
        products.set_meta(&p.id, "regular_price_EUR", " ").await.unwrap();

        let submission = PriceSubmission::from_form([("regular_price_EUR", "")]);
        admin.save_product_prices(&p.id, &submission).await.unwrap();

        let loaded = products.load_prices(&p.id).await.unwrap().unwrap();
        let eur = CurrencyCode::new("EUR");
        assert_eq!(loaded.meta.get(&PriceKind::Regular.meta_key(&eur)), Some(&d("91.00")));
    }

    #[tokio::test]
    async fn test_save_prices_unknown_product() {
        let admin = admin().await;
        let err = admin
            .save_product_prices("missing", &PriceSubmission::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_manual_run_requires_token() {
        let admin = admin().await;
        admin.save_settings(&["DE"], &[]).await.unwrap();
        admin
            .ctx
            .db()
            .products()
            .insert(&NewProduct::published("Shirt", d("100")))
            .await
            .unwrap();

        let verifier = |token: &str, action: &str| token == "ok" && action == RUN_BATCH_TOKEN_ACTION;

        let err = admin.run_batch_now("forged", &verifier).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken { .. }));

        let summary = admin.run_batch_now("ok", &verifier).await.unwrap();
        assert_eq!(summary.products, 1);
        assert_eq!(summary.written, 2);

        let status = admin.batch_status().await.unwrap();
        assert!(!status.scheduled);
        assert!(status.completed_at.is_some());
        assert_eq!(status.ready_products, 1);
        assert_eq!(status.total_products, 1);
    }
}
