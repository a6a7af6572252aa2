//! # geoprice-core: Pure Pricing Logic for GeoPrice
//!
//! This crate is the **heart** of GeoPrice. It decides which currency a
//! visitor pays in, what a product costs in that currency, and which
//! per-currency prices the background job should fill in. It has zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        GeoPrice Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Host storefront                              │   │
//! │  │    session/cookie ──► price callbacks ──► checkout gateways    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 geoprice-service                                │   │
//! │  │    Storefront, AdminPricing, BatchWorker, config               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ geoprice-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │ resolver │ │ registry │ │  rates   │ │ pricing  │          │   │
//! │  │   │ country  │ │ currency │ │ convert  │ │ discount │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐                       │   │
//! │  │   │ backfill │ │ gateway  │ │selection │                       │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘                       │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 geoprice-db (Storage Layer)                     │   │
//! │  │         products, per-currency price meta, options              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Country/currency codes, product price fields
//! - [`registry`] - Country → currency, symbol, flag
//! - [`rates`] - Static USD-relative rates, rounding, conversion
//! - [`resolver`] - Visitor country precedence
//! - [`pricing`] - Per-currency price resolution, purchasability, request context
//! - [`discount`] - Country discount rules
//! - [`backfill`] - Batch/admin per-currency price planning
//! - [`gateway`] - Payment gateway allow/deny lists
//! - [`selection`] - Visitor country switcher
//! - [`settings`] - Store and admin settings, option keys
//! - [`validation`] - Admin input validation
//! - [`engine`] - Everything above wired for one store
//!
//! ## Design Principles
//!
//! 1. **Convert once**: conversion happens at save/batch time, never per view
//! 2. **Absent is not zero**: a missing price means "do not sell"
//! 3. **Admin wins**: auto-converted values never replace stored amounts
//! 4. **Decimal money**: `rust_decimal` with a per-currency scale
//!
//! ## Example Usage
//!
//! ```rust
//! use geoprice_core::rates::{Converter, RateTable, RoundingPolicy};
//! use geoprice_core::types::CurrencyCode;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! let converter = Converter::new(
//!     Arc::new(RateTable::builtin()),
//!     RoundingPolicy::default(),
//!     CurrencyCode::new("USD"),
//! );
//!
//! let eur = converter.convert_from_base(Decimal::from(100), &CurrencyCode::new("EUR"));
//! assert_eq!(eur.to_string(), "91.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backfill;
pub mod discount;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod pricing;
pub mod rates;
pub mod registry;
pub mod resolver;
pub mod selection;
pub mod settings;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use backfill::{BackfillPlan, BatchConverter, FieldWrite, PriceSubmission, WriteMode};
pub use discount::{apply_discount, DiscountEngine, DiscountKind, DiscountRule};
pub use engine::{PricingEngine, Quote};
pub use error::{CoreResult, PricingError, ValidationError};
pub use gateway::{GatewayFilter, GatewayRule};
pub use pricing::{PriceProvider, PriceResolver, RequestContext, ResolvedPrice, VisitorPricing};
pub use rates::{Converter, RateTable, RoundingPolicy};
pub use registry::{CountryOption, CurrencyRegistry};
pub use resolver::{CountryResolver, Geolocator, VisitorSignals};
pub use selection::{CountrySelection, TokenVerifier};
pub use settings::{CurrencyOverrides, PricingSettings, StoreSettings};
pub use types::*;
