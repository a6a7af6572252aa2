//! # Price Resolution
//!
//! Turns a product's stored fields into the prices a visitor sees.
//!
//! ## Precedence (per product × visitor currency)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  currency == base ?                                                     │
//! │     yes ──► native regular / sale / active, untouched                   │
//! │     no  ──► regular = regular_price_{CUR}      (absent → absent)        │
//! │             sale    = sale_price_{CUR}         (absent → absent)        │
//! │             final   = sale if sale < regular, else regular              │
//! │                       (absent when regular is absent)                   │
//! │                                                                         │
//! │  then: final ──► DiscountEngine (first matching country rule)           │
//! │                                                                         │
//! │  purchasable = false when regular_price_{CUR} is absent (CUR ≠ base),   │
//! │                otherwise the host's own answer                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is converted on the read path. A product without a stored price
//! for the visitor's currency is shown without a price and cannot be bought.
//!
//! ## Reentrancy
//! The host may ask for the visitor's currency from inside its own price
//! callbacks, which in turn ask for the currency again. [`RequestContext`]
//! is created once per request and detects that loop: a nested lookup gets
//! the base currency instead of recursing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, OnceCell};
use ts_rs::TS;

use crate::discount::DiscountEngine;
use crate::rates::RoundingPolicy;
use crate::types::{CountryCode, CurrencyCode, PriceKind, ProductPrices};

// =============================================================================
// Resolved Price
// =============================================================================

/// Prices for one product in one currency.
///
/// `None` means "do not sell", never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolvedPrice {
    #[ts(type = "string | null")]
    pub regular: Option<Decimal>,

    #[ts(type = "string | null")]
    pub sale: Option<Decimal>,

    #[serde(rename = "final")]
    #[ts(type = "string | null")]
    pub final_price: Option<Decimal>,
}

impl ResolvedPrice {
    /// Checks if the product is on sale at this price.
    pub fn is_on_sale(&self) -> bool {
        match (self.sale, self.regular) {
            (Some(sale), Some(regular)) => sale < regular,
            _ => false,
        }
    }
}

// =============================================================================
// Price Resolver
// =============================================================================

/// Resolves regular/sale/final prices from stored per-currency fields.
#[derive(Debug, Clone)]
pub struct PriceResolver {
    base_currency: CurrencyCode,
}

impl PriceResolver {
    pub fn new(base_currency: CurrencyCode) -> Self {
        PriceResolver { base_currency }
    }

    pub fn base_currency(&self) -> &CurrencyCode {
        &self.base_currency
    }

    /// Resolves the undiscounted prices for a currency.
    pub fn resolve(&self, product: &ProductPrices, currency: &CurrencyCode) -> ResolvedPrice {
        if *currency == self.base_currency {
            return ResolvedPrice {
                regular: product.native.regular,
                sale: product.native.sale,
                final_price: product.native.active,
            };
        }

        let regular = product.currency_price(PriceKind::Regular, currency);
        let sale = product.currency_price(PriceKind::Sale, currency);
        let final_price = regular.map(|regular| match sale {
            Some(sale) if sale < regular => sale,
            _ => regular,
        });

        ResolvedPrice {
            regular,
            sale,
            final_price,
        }
    }

    /// Applies the purchasability gate.
    ///
    /// Outside the base currency a missing regular price blocks the sale,
    /// whatever the host says.
    pub fn is_purchasable(
        &self,
        product: &ProductPrices,
        currency: &CurrencyCode,
        host_purchasable: bool,
    ) -> bool {
        if *currency != self.base_currency
            && product.currency_price(PriceKind::Regular, currency).is_none()
        {
            return false;
        }
        host_purchasable
    }
}

// =============================================================================
// Provider Seam
// =============================================================================

/// The four price callbacks the host's catalog consults.
///
/// The host passes its own value for each (`host_*`); the provider decides
/// what the visitor actually sees.
pub trait PriceProvider {
    fn regular_price(&self, product: &ProductPrices) -> Option<Decimal>;
    fn sale_price(&self, product: &ProductPrices) -> Option<Decimal>;
    fn final_price(&self, product: &ProductPrices) -> Option<Decimal>;
    fn is_purchasable(&self, product: &ProductPrices, host_purchasable: bool) -> bool;
}

/// Pricing for one visitor: a resolved country and currency plus the rules.
#[derive(Debug, Clone)]
pub struct VisitorPricing<'a> {
    pub country: CountryCode,
    pub currency: CurrencyCode,
    resolver: &'a PriceResolver,
    discounts: &'a DiscountEngine,
    rounding: RoundingPolicy,
}

impl<'a> VisitorPricing<'a> {
    pub fn new(
        country: CountryCode,
        currency: CurrencyCode,
        resolver: &'a PriceResolver,
        discounts: &'a DiscountEngine,
        rounding: RoundingPolicy,
    ) -> Self {
        VisitorPricing {
            country,
            currency,
            resolver,
            discounts,
            rounding,
        }
    }

    /// Resolves all three prices, discount applied to the final price.
    pub fn price(&self, product: &ProductPrices) -> ResolvedPrice {
        let mut resolved = self.resolver.resolve(product, &self.currency);
        resolved.final_price = self.discounts.apply_rounded(
            resolved.final_price,
            &self.country,
            &self.currency,
            self.rounding,
        );
        resolved
    }
}

impl PriceProvider for VisitorPricing<'_> {
    fn regular_price(&self, product: &ProductPrices) -> Option<Decimal> {
        self.resolver.resolve(product, &self.currency).regular
    }

    fn sale_price(&self, product: &ProductPrices) -> Option<Decimal> {
        self.resolver.resolve(product, &self.currency).sale
    }

    fn final_price(&self, product: &ProductPrices) -> Option<Decimal> {
        self.price(product).final_price
    }

    fn is_purchasable(&self, product: &ProductPrices, host_purchasable: bool) -> bool {
        self.resolver
            .is_purchasable(product, &self.currency, host_purchasable)
    }
}

// =============================================================================
// Request Context
// =============================================================================

/// Per-request memo and reentrancy guard for the visitor's currency.
///
/// Not `Sync`: one context belongs to one request on one thread.
#[derive(Debug, Default)]
pub struct RequestContext {
    resolving: Cell<bool>,
    currency: OnceCell<CurrencyCode>,
}

impl RequestContext {
    pub fn new() -> Self {
        RequestContext::default()
    }

    /// Returns the visitor currency, computing it at most once.
    ///
    /// A call made while `compute` is still running returns `base` instead
    /// of recursing, and the nested answer is not memoized.
    pub fn currency_with<F>(&self, base: &CurrencyCode, compute: F) -> CurrencyCode
    where
        F: FnOnce() -> CurrencyCode,
    {
        if let Some(currency) = self.currency.get() {
            return currency.clone();
        }
        if self.resolving.replace(true) {
            return base.clone();
        }

        let currency = compute();
        self.resolving.set(false);
        self.currency.get_or_init(|| currency).clone()
    }

    /// Checks if a lookup is in progress.
    pub fn is_resolving(&self) -> bool {
        self.resolving.get()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
