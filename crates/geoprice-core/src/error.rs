//! # Error Types
//!
//! Domain-specific error types for geoprice-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  geoprice-core errors (this file)                                      │
//! │  ├── PricingError     - Domain failures that callers opt into          │
//! │  └── ValidationError  - Admin/config input validation failures         │
//! │                                                                         │
//! │  geoprice-db errors (separate crate)                                   │
//! │  └── DbError          - Storage failures                               │
//! │                                                                         │
//! │  geoprice-service errors                                               │
//! │  └── ServiceError     - Config, jobs, token rejection                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Note
//! Storefront lookups never return these errors. Unknown countries, missing
//! rates and missing per-currency prices all degrade to an absent value or
//! a fallback. Errors only surface on the admin and configuration paths.

use thiserror::Error;

// =============================================================================
// Pricing Error
// =============================================================================

/// Pricing domain errors.
#[derive(Debug, Error)]
pub enum PricingError {
    /// A currency is not present in the rate table.
    ///
    /// ## When This Occurs
    /// Only from strict conversion paths. The default `convert` falls back to
    /// the rounded source amount instead.
    #[error("No exchange rate for currency: {0}")]
    UnknownRate(String),

    /// A rate override is not a positive number.
    #[error("Invalid exchange rate for {currency}: {rate}")]
    InvalidRate { currency: String, rate: String },

    /// Stored option value could not be decoded.
    #[error("Malformed option '{name}': {reason}")]
    MalformedOption { name: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Code has the wrong length or characters.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be strictly positive.
    #[error("{field} must be greater than zero")]
    NotPositive { field: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with PricingError.
pub type CoreResult<T> = Result<T, PricingError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PricingError::InvalidRate {
            currency: "EUR".to_string(),
            rate: "-1".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid exchange rate for EUR: -1");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "country".to_string(),
        };
        assert_eq!(err.to_string(), "country is required");

        let err = ValidationError::OutOfRange {
            field: "price_decimals".to_string(),
            min: 0,
            max: 8,
        };
        assert_eq!(err.to_string(), "price_decimals must be between 0 and 8");
    }

    #[test]
    fn test_validation_converts_to_pricing_error() {
        let validation_err = ValidationError::Required {
            field: "currency".to_string(),
        };
        let err: PricingError = validation_err.into();
        assert!(matches!(err, PricingError::Validation(_)));
    }
}
