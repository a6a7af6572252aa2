//! # Service Error Types
//!
//! Error types for the storefront, admin and batch services.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Service Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Storage      │  │     Pricing             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Database       │  │  Pricing                │ │
//! │  │  ConfigLoad...  │  │  (DbError)      │  │  Validation             │ │
//! │  │  ConfigSave...  │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Requests     │  │     Worker      │                              │
//! │  │                 │  │                 │                              │
//! │  │  InvalidToken   │  │  ChannelError   │                              │
//! │  │  ProductNotFound│  │  ShuttingDown   │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use geoprice_core::{PricingError, ValidationError};
use geoprice_db::DbError;

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error type.
#[derive(Debug, Error)]
pub enum ServiceError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to write the config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Storage / Pricing Errors
    // =========================================================================
    /// Storage operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Pricing rule or rate problem.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Admin input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Request Errors
    // =========================================================================
    /// Anti-forgery token missing or rejected on a protected action.
    #[error("Invalid or expired token for '{action}'")]
    InvalidToken { action: String },

    /// Product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    // =========================================================================
    // Worker Errors
    // =========================================================================
    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Worker is shutting down.
    #[error("Batch worker is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ServiceError {
    fn from(err: toml::de::Error) -> Self {
        ServiceError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ServiceError {
    fn from(err: toml::ser::Error) -> Self {
        ServiceError::ConfigSaveFailed(err.to_string())
    }
}

impl From<url::ParseError> for ServiceError {
    fn from(err: url::ParseError) -> Self {
        ServiceError::InvalidConfig(format!("invalid URL: {}", err))
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl ServiceError {
    /// Returns true if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Database(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidConfig(_)
                | ServiceError::ConfigLoadFailed(_)
                | ServiceError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ServiceError::Database(DbError::PoolExhausted).is_retryable());
        assert!(!ServiceError::Database(DbError::not_found("Product", "p1")).is_retryable());
        assert!(!ServiceError::InvalidToken {
            action: "run_batch".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ServiceError::InvalidToken {
            action: "run_batch".into(),
        };
        assert!(err.to_string().contains("run_batch"));

        let err: ServiceError = PricingError::UnknownRate("XYZ".into()).into();
        assert!(err.to_string().contains("XYZ"));
    }
}
