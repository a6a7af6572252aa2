//! # Batch Price Conversion
//!
//! Processes the catalog one page at a time, filling in the per-currency
//! prices that are still missing.
//!
//! ## Page Processing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      process_page(offset)                               │
//! │                                                                         │
//! │  1. Engine: rebuild from stored settings (target currencies)           │
//! │                                                                         │
//! │  2. Load:   SELECT sellable products ORDER BY created_at, id           │
//! │             LIMIT page_size OFFSET offset                              │
//! │                                                                         │
//! │     ├── empty page ──► store batch_completed_at                        │
//! │     │                  clear batch_scheduled                           │
//! │     │                  return Completed                                 │
//! │     ▼                                                                   │
//! │  3. Plan:   BatchConverter::plan(product, currencies, None)            │
//! │             (products without a positive base price: no-op)            │
//! │                                                                         │
//! │  4. Write:  one transaction per product, converted values fill only    │
//! │             missing/blank/malformed fields, prices_ready = yes         │
//! │                                                                         │
//! │  5. Return Next(offset + page length)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage calls that fail transiently (busy database, exhausted pool) are
//! retried with exponential backoff before the page is reported as failed.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;
use std::future::Future;
use tracing::{debug, info, warn};

use geoprice_db::DbResult;

use crate::config::BatchSection;
use crate::context::PricingContext;
use crate::error::ServiceResult;

// =============================================================================
// Outcomes
// =============================================================================

/// What the worker should do after a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Enqueue the page at this offset.
    Next(u32),

    /// The run is finished.
    Completed,
}

/// Counters for one processed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    pub offset: u32,
    pub products: usize,
    /// Products with nothing to convert from.
    pub skipped: usize,
    /// Price fields actually written.
    pub written: u64,
    pub outcome: PageOutcome,
}

/// Totals for a full pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub pages: u32,
    pub products: usize,
    pub skipped: usize,
    pub written: u64,
}

impl BatchSummary {
    fn absorb(&mut self, report: &PageReport) {
        if report.products > 0 {
            self.pages += 1;
        }
        self.products += report.products;
        self.skipped += report.skipped;
        self.written += report.written;
    }
}

// =============================================================================
// Batch Runner
// =============================================================================

/// Runs batch pages against storage.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    ctx: PricingContext,
    settings: BatchSection,
}

impl BatchRunner {
    pub fn new(ctx: PricingContext, settings: BatchSection) -> Self {
        BatchRunner { ctx, settings }
    }

    pub fn context(&self) -> &PricingContext {
        &self.ctx
    }

    pub fn page_size(&self) -> u32 {
        self.settings.page_size
    }

    /// Processes the page starting at `offset`.
    pub async fn process_page(&self, offset: u32) -> ServiceResult<PageReport> {
        let engine = self.ctx.engine().await?;
        let currencies = engine.target_currencies();
        let converter = engine.batch_converter();

        let products = self.ctx.db().products();
        let options = self.ctx.db().options();
        let limit = self.settings.page_size;

        let page = self
            .with_retry("load_page", || products.load_page(offset, limit))
            .await?;

        if page.is_empty() {
            let now = Utc::now();
            self.with_retry("set_batch_completed_at", || options.set_batch_completed_at(now))
                .await?;
            self.with_retry("clear_scheduled_batch", || options.clear_scheduled_batch())
                .await?;

            info!(offset, completed_at = %now, "Batch run completed");
            return Ok(PageReport {
                offset,
                products: 0,
                skipped: 0,
                written: 0,
                outcome: PageOutcome::Completed,
            });
        }

        let mut skipped = 0;
        let mut written = 0;

        for product in &page {
            let plan = converter.plan(product, &currencies, None);
            if plan.is_noop() {
                debug!(product_id = %product.product_id, "No base price, skipping product");
                skipped += 1;
                continue;
            }
            if !plan.unrated.is_empty() {
                warn!(
                    product_id = %product.product_id,
                    currencies = ?plan.unrated,
                    "No exchange rate, storing base amount unconverted"
                );
            }

            written += self
                .with_retry("apply_plan", || products.apply_plan(&plan))
                .await?;
        }

        let next = offset + page.len() as u32;
        info!(
            offset,
            products = page.len(),
            skipped,
            written,
            next,
            "Batch page processed"
        );

        Ok(PageReport {
            offset,
            products: page.len(),
            skipped,
            written,
            outcome: PageOutcome::Next(next),
        })
    }

    /// Runs every page from offset 0 in this task.
    pub async fn run_full_pass(&self) -> ServiceResult<BatchSummary> {
        let mut summary = BatchSummary::default();
        let mut offset = 0;

        loop {
            let report = self.process_page(offset).await?;
            summary.absorb(&report);
            match report.outcome {
                PageOutcome::Next(next) => offset = next,
                PageOutcome::Completed => break,
            }
        }

        info!(
            pages = summary.pages,
            products = summary.products,
            written = summary.written,
            "Full batch pass finished"
        );
        Ok(summary)
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.settings.initial_backoff(),
            max_interval: self.settings.max_backoff(),
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Runs a storage call, retrying transient failures.
    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut call: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempt = 1u32;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.settings.max_retries => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| self.settings.max_backoff());
                    warn!(op, attempt, ?delay, error = %e, "Transient storage error, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeoPriceConfig;
    use geoprice_core::{CountryCode, PricingSettings};
    use geoprice_db::{Database, DbConfig, NewProduct};
    use rust_decimal::Decimal;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn runner(page_size: u32) -> BatchRunner {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = GeoPriceConfig::default();
        let ctx = PricingContext::from_config(db, &config).unwrap();

        ctx.db()
            .options()
            .save_pricing_settings(&PricingSettings {
                enabled_countries: vec![CountryCode::new("DE"), CountryCode::new("JP")],
                discounts: vec![],
            })
            .await
            .unwrap();

        let mut settings = config.batch.clone();
        settings.page_size = page_size;
        BatchRunner::new(ctx, settings)
    }

    #[tokio::test]
    async fn test_full_pass_converts_and_completes() {
        let runner = runner(2).await;
        let products = runner.context().db().products();
        let p = products
            .insert(&NewProduct::published("Shirt", d("100")).with_sale(d("80")))
            .await
            .unwrap();
        for i in 0..2 {
            products
                .insert(&NewProduct::published(format!("P{}", i), d("10")))
                .await
                .unwrap();
        }

        let summary = runner.run_full_pass().await.unwrap();
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.products, 3);
        // EUR + JPY, regular + sale each
        assert_eq!(summary.written, 12);

        let loaded = products.load_prices(&p.id).await.unwrap().unwrap();
        assert!(loaded.prices_ready);
        assert_eq!(loaded.meta.get("regular_price_EUR"), Some(&d("91.00")));
        assert_eq!(loaded.meta.get("sale_price_EUR"), Some(&d("72.80")));
        assert_eq!(loaded.meta.get("regular_price_JPY"), Some(&d("14800")));

        let options = runner.context().db().options();
        assert!(options.batch_completed_at().await.unwrap().is_some());
        assert_eq!(products.count_ready().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_second_pass_writes_nothing() {
        let runner = runner(50).await;
        runner
            .context()
            .db()
            .products()
            .insert(&NewProduct::published("Shirt", d("100")))
            .await
            .unwrap();

        assert_eq!(runner.run_full_pass().await.unwrap().written, 4);
        assert_eq!(runner.run_full_pass().await.unwrap().written, 0);
    }

    #[tokio::test]
    async fn test_admin_values_survive_batch() {
        let runner = runner(50).await;
        let products = runner.context().db().products();
        let p = products
            .insert(&NewProduct::published("Shirt", d("100")))
            .await
            .unwrap();
        products
            .set_meta(&p.id, "regular_price_EUR", "99.00")
            .await
            .unwrap();

        runner.run_full_pass().await.unwrap();

        let loaded = products.load_prices(&p.id).await.unwrap().unwrap();
        assert_eq!(loaded.meta.get("regular_price_EUR"), Some(&d("99.00")));
    }

    #[tokio::test]
    async fn test_blank_and_malformed_meta_refilled() {
        let runner = runner(50).await;
        let products = runner.context().db().products();
        let p = products
            .insert(&NewProduct::published("Shirt", d("100")))
            .await
            .unwrap();
        products.set_meta(&p.id, "regular_price_EUR", "").await.unwrap();
        products.set_meta(&p.id, "sale_price_EUR", "abc").await.unwrap();

        let summary = runner.run_full_pass().await.unwrap();
        assert_eq!(summary.written, 4);

        assert_eq!(
            products.get_meta(&p.id, "regular_price_EUR").await.unwrap().as_deref(),
            Some("91.00")
        );
        assert_eq!(
            products.get_meta(&p.id, "sale_price_EUR").await.unwrap().as_deref(),
            Some("91.00")
        );
        let loaded = products.load_prices(&p.id).await.unwrap().unwrap();
        assert!(loaded.prices_ready);
        assert_eq!(loaded.meta.get("regular_price_EUR"), Some(&d("91.00")));
    }

    #[tokio::test]
    async fn test_zero_price_skipped_not_ready() {
        let runner = runner(50).await;
        let products = runner.context().db().products();
        let p = products
            .insert(&NewProduct::published("Free", Decimal::ZERO))
            .await
            .unwrap();

        let report = runner.process_page(0).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.outcome, PageOutcome::Next(1));

        let loaded = products.load_prices(&p.id).await.unwrap().unwrap();
        assert!(!loaded.prices_ready);
        assert!(loaded.meta.is_empty());
    }

    #[tokio::test]
    async fn test_empty_page_clears_schedule() {
        let runner = runner(50).await;
        let options = runner.context().db().options();
        options.try_schedule_batch().await.unwrap().unwrap();

        let report = runner.process_page(0).await.unwrap();
        assert_eq!(report.outcome, PageOutcome::Completed);
        assert!(options.scheduled_batch().await.unwrap().is_none());
    }
}
