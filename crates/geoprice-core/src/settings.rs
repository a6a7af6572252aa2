//! # Settings
//!
//! Store settings and the admin-editable pricing settings, plus the option
//! keys they are stored under.
//!
//! ## Option Keys
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────────────┐
//! │ key                          │ value (JSON)                             │
//! ├──────────────────────────────┼──────────────────────────────────────────┤
//! │ enabled_countries            │ ["DE", "JP"]                             │
//! │ country_discounts            │ [{country, type, amount}]                │
//! │ country_currency_map         │ {"CH": "EUR"}                            │
//! │ country_currency_symbol_map  │ {"CH": "€"}                              │
//! │ batch_scheduled              │ {"run_id": "...", "scheduled_at": ...}   │
//! │ batch_completed_at           │ "2026-01-01T00:00:00Z"                   │
//! └──────────────────────────────┴──────────────────────────────────────────┘
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::discount::DiscountRule;
use crate::error::{CoreResult, PricingError, ValidationError};
use crate::rates::DEFAULT_PRICE_DECIMALS;
use crate::registry::CurrencyRegistry;
use crate::types::{CountryCode, CurrencyCode};
use crate::validation::{
    validate_country_code, validate_currency_code, validate_discount_row, validate_price_decimals,
    RawDiscountRow, ValidationResult,
};

// =============================================================================
// Option Keys
// =============================================================================

pub const OPT_ENABLED_COUNTRIES: &str = "enabled_countries";
pub const OPT_COUNTRY_DISCOUNTS: &str = "country_discounts";
pub const OPT_COUNTRY_CURRENCY_MAP: &str = "country_currency_map";
pub const OPT_COUNTRY_SYMBOL_MAP: &str = "country_currency_symbol_map";
pub const OPT_BATCH_SCHEDULED: &str = "batch_scheduled";
pub const OPT_BATCH_COMPLETED_AT: &str = "batch_completed_at";

/// Decodes a stored option value.
pub fn decode_option<T: DeserializeOwned>(name: &str, value: serde_json::Value) -> CoreResult<T> {
    serde_json::from_value(value).map_err(|e| PricingError::MalformedOption {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// Store Settings
// =============================================================================

/// The host store's own settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub base_country: CountryCode,
    pub base_currency: CurrencyCode,
    pub price_decimals: u32,
}

impl StoreSettings {
    pub fn new(base_country: impl Into<CountryCode>, base_currency: impl Into<CurrencyCode>) -> Self {
        StoreSettings {
            base_country: base_country.into(),
            base_currency: base_currency.into(),
            price_decimals: DEFAULT_PRICE_DECIMALS,
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        validate_country_code(self.base_country.as_str())?;
        validate_currency_code(self.base_currency.as_str())?;
        validate_price_decimals(self.price_decimals)?;
        Ok(())
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings::new("US", "USD")
    }
}

// =============================================================================
// Pricing Settings
// =============================================================================

/// Admin-editable pricing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Empty means "the built-in default country set".
    pub enabled_countries: Vec<CountryCode>,

    /// Ordered; first match per country wins.
    pub discounts: Vec<DiscountRule>,
}

impl PricingSettings {
    /// Sanitizes a settings form submission.
    ///
    /// Countries are normalized and deduplicated with blanks dropped.
    /// Discount rows failing [`validate_discount_row`] are dropped.
    pub fn sanitize<S: AsRef<str>>(enabled: &[S], rows: &[RawDiscountRow]) -> Self {
        PricingSettings {
            enabled_countries: sanitize_countries(enabled),
            discounts: sanitize_discounts(rows),
        }
    }
}

/// Normalizes and deduplicates a country list, keeping first-seen order.
pub fn sanitize_countries<S: AsRef<str>>(raw: &[S]) -> Vec<CountryCode> {
    let mut seen = BTreeSet::new();
    raw.iter()
        .filter_map(|c| CountryCode::non_empty(c.as_ref()))
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// Keeps the valid discount rows in order.
pub fn sanitize_discounts(rows: &[RawDiscountRow]) -> Vec<DiscountRule> {
    rows.iter()
        .filter_map(|row| validate_discount_row(row).ok())
        .collect()
}

// =============================================================================
// Currency Overrides
// =============================================================================

/// Admin overrides of the country → currency/symbol mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyOverrides {
    #[serde(default)]
    pub currencies: BTreeMap<CountryCode, CurrencyCode>,
    #[serde(default)]
    pub symbols: BTreeMap<CountryCode, String>,
}

impl CurrencyOverrides {
    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty() && self.symbols.is_empty()
    }

    /// Rejects malformed currency codes before they are stored.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (country, currency) in &self.currencies {
            validate_country_code(country.as_str())?;
            validate_currency_code(currency.as_str())?;
        }
        Ok(())
    }

    /// Layers the overrides over a registry.
    pub fn apply(&self, registry: CurrencyRegistry) -> CurrencyRegistry {
        registry.with_overrides(self.currencies.clone(), self.symbols.clone())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
