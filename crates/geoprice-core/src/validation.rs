//! # Validation Module
//!
//! Input validation for admin settings and configuration.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Settings form                                                 │
//! │  └── number inputs with min="0", fixed type select                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Codes: two/three ASCII letters                                    │
//! │  ├── Discount rows: country required, known type, amount above zero    │
//! │  └── Store precision within range                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Storage                                                       │
//! │  └── NOT NULL / CHECK constraints                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storefront reads never validate: unknown values there degrade to
//! fallbacks. Only writes go through here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::discount::{DiscountKind, DiscountRule};
use crate::error::ValidationError;
use crate::types::{CountryCode, CurrencyCode};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Highest store price precision accepted.
pub const MAX_PRICE_DECIMALS: u32 = 8;

// =============================================================================
// Code Validators
// =============================================================================

/// Validates and normalizes a country code.
///
/// ## Example
/// ```rust
/// use geoprice_core::validation::validate_country_code;
///
/// assert_eq!(validate_country_code(" de ").unwrap().as_str(), "DE");
/// assert!(validate_country_code("").is_err());
/// assert!(validate_country_code("DEU").is_err());
/// ```
pub fn validate_country_code(raw: &str) -> ValidationResult<CountryCode> {
    validate_code(raw, "country", 2).map(CountryCode::new)
}

/// Validates and normalizes a currency code.
pub fn validate_currency_code(raw: &str) -> ValidationResult<CurrencyCode> {
    validate_code(raw, "currency", 3).map(CurrencyCode::new)
}

fn validate_code<'a>(raw: &'a str, field: &str, len: usize) -> ValidationResult<&'a str> {
    let code = raw.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if code.len() != len || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("must be {} letters", len),
        });
    }

    Ok(code)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the store price precision.
pub fn validate_price_decimals(decimals: u32) -> ValidationResult<u32> {
    if decimals > MAX_PRICE_DECIMALS {
        return Err(ValidationError::OutOfRange {
            field: "price_decimals".to_string(),
            min: 0,
            max: i64::from(MAX_PRICE_DECIMALS),
        });
    }
    Ok(decimals)
}

// =============================================================================
// Discount Rows
// =============================================================================

/// One discount row exactly as the settings form posts it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDiscountRow {
    #[serde(default)]
    pub country: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub amount: String,
}

impl RawDiscountRow {
    pub fn new(country: &str, kind: &str, amount: &str) -> Self {
        RawDiscountRow {
            country: country.to_string(),
            kind: kind.to_string(),
            amount: amount.to_string(),
        }
    }
}

/// Validates one posted discount row.
///
/// ## Rules
/// - Country must not be blank
/// - Type must be `amount` or `percent`
/// - Amount is coerced (unparsable → 0) and must end up above zero; a zero
///   row would match first and hide later rules for the same country
pub fn validate_discount_row(row: &RawDiscountRow) -> ValidationResult<DiscountRule> {
    let country = CountryCode::non_empty(&row.country).ok_or_else(|| ValidationError::Required {
        field: "country".to_string(),
    })?;

    let kind = match row.kind.trim() {
        "amount" => DiscountKind::Flat,
        "percent" => DiscountKind::Percent,
        _ => {
            return Err(ValidationError::NotAllowed {
                field: "type".to_string(),
                allowed: DiscountKind::ALLOWED.iter().map(|s| s.to_string()).collect(),
            })
        }
    };

    let amount = row.amount.trim().parse::<Decimal>().unwrap_or(Decimal::ZERO);
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NotPositive {
            field: "amount".to_string(),
        });
    }

    Ok(DiscountRule::new(country, kind, amount))
}

// =============================================================================
// Unit Tests
// =============================================================================
