//! # geoprice-service: Orchestration Layer for GeoPrice
//!
//! Connects the pure pricing rules in `geoprice-core` to the storage in
//! `geoprice-db` and runs the background batch conversion job.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Service Layer Architecture                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  GeoPriceConfig (TOML file + GEOPRICE_* env overrides)           │  │
//! │  │  store identity, batch tuning, rate overrides, gateway rules     │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  PricingContext: Database + StoreSettings + Arc<RateTable>       │  │
//! │  │  builds a PricingEngine from the stored settings on demand       │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  Storefront    │  │  AdminPricing  │  │  BatchWorker           │    │
//! │  │                │  │                │  │                        │    │
//! │  │ quotes,        │  │ settings save, │  │ one page per job,      │    │
//! │  │ country switch,│  │ product form,  │  │ continuation queue,    │    │
//! │  │ gateways       │  │ batch control  │  │ retry with backoff     │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`admin`] - Settings, per-product prices, batch status and manual runs
//! - [`batch`] - Page processing and full passes
//! - [`config`] - Configuration file and environment overrides
//! - [`context`] - Shared handles and engine construction
//! - [`error`] - Service error types
//! - [`storefront`] - Visitor-facing pricing
//! - [`worker`] - Background batch worker
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geoprice_service::{AdminPricing, BatchRunner, BatchWorker, GeoPriceConfig, PricingContext};
//!
//! let config = GeoPriceConfig::load_or_default(None);
//! let db = Database::new(config.db_config()).await?;
//! let ctx = PricingContext::from_config(db, &config)?;
//!
//! let runner = BatchRunner::new(ctx.clone(), config.batch.clone());
//! let (worker, handle) = BatchWorker::new(runner.clone(), config.batch.poll_interval());
//! tokio::spawn(worker.run());
//!
//! let admin = AdminPricing::new(runner).with_worker(handle);
//! admin.save_settings(&["DE", "JP"], &[]).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod admin;
pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod storefront;
pub mod worker;

// =============================================================================
// Re-exports
// =============================================================================

pub use admin::{AdminPricing, BatchStatus, RUN_BATCH_TOKEN_ACTION};
pub use batch::{BatchRunner, BatchSummary, PageOutcome, PageReport};
pub use config::{BatchSection, GeoPriceConfig, RateMode};
pub use context::PricingContext;
pub use error::{ServiceError, ServiceResult};
pub use storefront::Storefront;
pub use worker::{BatchJob, BatchWorker, BatchWorkerHandle};
