//! # Domain Types
//!
//! Core domain types used throughout GeoPrice.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │  CountryCode    │   │  CurrencyCode   │   │   ProductPrices     │   │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────────  │   │
//! │  │  "US", "DE"     │   │  "USD", "EUR"   │   │  native regular/sale│   │
//! │  │  uppercase      │   │  uppercase      │   │  per-currency fields│   │
//! │  └─────────────────┘   └─────────────────┘   │  prices_ready flag  │   │
//! │                                              └─────────────────────┘   │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │   PriceKind     │   │  NativePrices   │                             │
//! │  │  Regular | Sale │   │  catalog fields │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Per-Currency Fields
//! The catalog owns the product. The core only sees a bag of fields keyed
//! `"{regular|sale}_price_{CURRENCY}"`, e.g. `regular_price_EUR`.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Codes
// =============================================================================

/// ISO 3166 alpha-2 country code, uppercase-normalized.
///
/// No validation beyond normalization: unknown codes are legal and simply
/// fail registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, TS)]
#[ts(export)]
pub struct CountryCode(String);

impl CountryCode {
    /// Creates a code, trimming whitespace and uppercasing.
    pub fn new(raw: impl AsRef<str>) -> Self {
        CountryCode(raw.as_ref().trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks if the code is empty (e.g. an unset cookie).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Creates a code only if the raw value is non-blank.
    pub fn non_empty(raw: impl AsRef<str>) -> Option<Self> {
        let code = CountryCode::new(raw);
        (!code.is_empty()).then_some(code)
    }
}

/// ISO 4217 alpha-3 currency code, uppercase-normalized.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, TS)]
#[ts(export)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Creates a code, trimming whitespace and uppercasing.
    pub fn new(raw: impl AsRef<str>) -> Self {
        CurrencyCode(raw.as_ref().trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks if the code is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Deserialization goes through `new` so stored or configured values are
// normalized the same way as values built in code.
impl<'de> Deserialize<'de> for CountryCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(CountryCode::new)
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(CurrencyCode::new)
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CountryCode {
    fn from(s: &str) -> Self {
        CountryCode::new(s)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        CurrencyCode::new(s)
    }
}

// =============================================================================
// Price Fields
// =============================================================================

/// Per-product flag written once the batch job has processed the product.
pub const PRICES_READY_KEY: &str = "prices_ready";

/// Which of the two per-currency price fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceKind {
    Regular,
    Sale,
}

impl PriceKind {
    /// Both kinds, regular first.
    pub const ALL: [PriceKind; 2] = [PriceKind::Regular, PriceKind::Sale];

    /// Returns the storage key for this kind in `currency`.
    ///
    /// ## Example
    /// ```rust
    /// use geoprice_core::types::{CurrencyCode, PriceKind};
    ///
    /// let key = PriceKind::Sale.meta_key(&CurrencyCode::new("eur"));
    /// assert_eq!(key, "sale_price_EUR");
    /// ```
    pub fn meta_key(&self, currency: &CurrencyCode) -> String {
        match self {
            PriceKind::Regular => format!("regular_price_{}", currency),
            PriceKind::Sale => format!("sale_price_{}", currency),
        }
    }
}

// =============================================================================
// Native Prices
// =============================================================================

/// The catalog's own price fields, denominated in the store base currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NativePrices {
    pub regular: Option<Decimal>,
    pub sale: Option<Decimal>,
    /// The active price the catalog would charge on its own.
    pub active: Option<Decimal>,
}

impl NativePrices {
    /// Builds native prices, deriving the active price the way the catalog
    /// does: sale when present and lower than regular, else regular.
    pub fn new(regular: Option<Decimal>, sale: Option<Decimal>) -> Self {
        let active = match (regular, sale) {
            (Some(r), Some(s)) if s < r => Some(s),
            (Some(r), _) => Some(r),
            (None, s) => s,
        };
        NativePrices {
            regular,
            sale,
            active,
        }
    }
}

// =============================================================================
// Product Prices
// =============================================================================

/// Everything the core reads about one product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPrices {
    /// Catalog identifier (opaque to the core).
    pub product_id: String,

    /// Native price fields in the base currency.
    pub native: NativePrices,

    /// Per-currency fields keyed `"{regular|sale}_price_{CURRENCY}"`.
    pub meta: BTreeMap<String, Decimal>,

    /// Set once the batch job has processed the product.
    pub prices_ready: bool,
}

impl ProductPrices {
    /// Creates an empty record for a product with native prices.
    pub fn new(product_id: impl Into<String>, native: NativePrices) -> Self {
        ProductPrices {
            product_id: product_id.into(),
            native,
            meta: BTreeMap::new(),
            prices_ready: false,
        }
    }

    /// Builder-style setter for a per-currency field.
    pub fn with_price(mut self, kind: PriceKind, currency: &CurrencyCode, amount: Decimal) -> Self {
        self.meta.insert(kind.meta_key(currency), amount);
        self
    }

    /// Returns the stored per-currency field, if any.
    #[inline]
    pub fn currency_price(&self, kind: PriceKind, currency: &CurrencyCode) -> Option<Decimal> {
        self.meta.get(&kind.meta_key(currency)).copied()
    }

    /// Checks if a per-currency field has been stored.
    #[inline]
    pub fn has_field(&self, key: &str) -> bool {
        self.meta.contains_key(key)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_normalize() {
        assert_eq!(CountryCode::new(" de ").as_str(), "DE");
        assert_eq!(CurrencyCode::new("eur").as_str(), "EUR");
        assert!(CountryCode::non_empty("  ").is_none());
    }

    #[test]
    fn test_codes_deserialize_normalized() {
        let code: CountryCode = serde_json::from_str("\"gb\"").unwrap();
        assert_eq!(code, CountryCode::new("GB"));
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"GB\"");
    }

    #[test]
    fn test_meta_keys() {
        let eur = CurrencyCode::new("EUR");
        assert_eq!(PriceKind::Regular.meta_key(&eur), "regular_price_EUR");
        assert_eq!(PriceKind::Sale.meta_key(&eur), "sale_price_EUR");
    }

    #[test]
    fn test_native_active_price() {
        let native = NativePrices::new(Some(Decimal::new(2000, 2)), Some(Decimal::new(1500, 2)));
        assert_eq!(native.active, Some(Decimal::new(1500, 2)));

        // Sale not lower than regular is ignored
        let native = NativePrices::new(Some(Decimal::new(2000, 2)), Some(Decimal::new(2500, 2)));
        assert_eq!(native.active, Some(Decimal::new(2000, 2)));

        assert_eq!(NativePrices::new(None, None).active, None);
    }

    #[test]
    fn test_product_currency_price() {
        let eur = CurrencyCode::new("EUR");
        let product = ProductPrices::new("p1", NativePrices::default())
            .with_price(PriceKind::Regular, &eur, Decimal::new(910, 1));

        assert_eq!(
            product.currency_price(PriceKind::Regular, &eur),
            Some(Decimal::new(910, 1))
        );
        assert_eq!(product.currency_price(PriceKind::Sale, &eur), None);
        assert!(product.has_field("regular_price_EUR"));
    }
}
