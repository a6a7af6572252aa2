//! # Repository Module
//!
//! Database repository implementations for GeoPrice.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Storefront / batch worker                                             │
//! │       │                                                                 │
//! │       │  db.products().load_page(0, 50)                                │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── load_prices(&self, id)                                            │
//! │  ├── load_page(&self, offset, limit)                                   │
//! │  └── apply_plan(&self, plan)                                           │
//! │                                                                         │
//! │  OptionsRepository                                                     │
//! │  ├── pricing_settings(&self)                                           │
//! │  ├── currency_overrides(&self)                                         │
//! │  └── try_schedule_batch(&self)                                         │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog rows and price meta
//! - [`OptionsRepository`](options::OptionsRepository) - Settings and batch flags

pub mod options;
pub mod product;
