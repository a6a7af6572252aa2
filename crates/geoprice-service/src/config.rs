//! # GeoPrice Configuration
//!
//! Store, batch, database and rate-table configuration.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     GEOPRICE_BASE_COUNTRY=DE                                           │
//! │     GEOPRICE_BASE_CURRENCY=EUR                                         │
//! │     GEOPRICE_PRICE_DECIMALS=2                                          │
//! │     GEOPRICE_DB_PATH=/var/lib/geoprice/geoprice.db                     │
//! │     GEOPRICE_BATCH_SIZE=50                                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/geoprice/geoprice.toml (Linux)                           │
//! │     ~/Library/Application Support/com.geoprice.geoprice/... (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     US / USD, 2 decimals, pages of 50                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [store]
//! base_country = "US"
//! base_currency = "USD"
//! price_decimals = 2
//! home_url = "https://shop.example.com/"
//!
//! [batch]
//! page_size = 50
//! poll_interval_secs = 30
//! max_retries = 3
//!
//! [database]
//! path = "/var/lib/geoprice/geoprice.db"
//!
//! [rates]
//! mode = "augment"   # augment | replace
//!
//! [rates.entries]
//! EUR = "0.95"
//!
//! [[gateways]]
//! gateway_id = "cod"
//! allowed_countries = ["PK", "IN"]
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use geoprice_core::rates::{parse_rate_overrides, RateTable};
use geoprice_core::{GatewayFilter, GatewayRule, StoreSettings};
use geoprice_db::DbConfig;

use crate::error::{ServiceError, ServiceResult};

/// Largest accepted batch page.
pub const MAX_PAGE_SIZE: u32 = 500;

// =============================================================================
// Store Section
// =============================================================================

/// The store's own country, currency and price precision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_base_country")]
    pub base_country: String,

    #[serde(default = "default_base_currency")]
    pub base_currency: String,

    /// Decimals for currencies outside the zero-decimal set.
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,

    /// Where a country switch redirects when there is no usable referer.
    #[serde(default = "default_home_url")]
    pub home_url: String,
}

fn default_base_country() -> String {
    "US".to_string()
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_price_decimals() -> u32 {
    2
}

fn default_home_url() -> String {
    "http://localhost/".to_string()
}

impl Default for StoreSection {
    fn default() -> Self {
        StoreSection {
            base_country: default_base_country(),
            base_currency: default_base_currency(),
            price_decimals: default_price_decimals(),
            home_url: default_home_url(),
        }
    }
}

// =============================================================================
// Batch Section
// =============================================================================

/// Background conversion job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSection {
    /// Products per page (one job unit).
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// How often the worker looks for a scheduled run it isn't processing.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Attempts per storage call before a page fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff duration (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_page_size() -> u32 {
    geoprice_core::backfill::DEFAULT_PAGE_SIZE
}
fn default_poll_interval() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    200
}
fn default_max_backoff() -> u64 {
    10
}

impl Default for BatchSection {
    fn default() -> Self {
        BatchSection {
            page_size: default_page_size(),
            poll_interval_secs: default_poll_interval(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl BatchSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

// =============================================================================
// Database Section
// =============================================================================

/// Storage location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// SQLite file path. Unset means the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Rates Section
// =============================================================================

/// How configured rates combine with the built-in table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateMode {
    /// Configured entries patch the built-in table.
    #[default]
    Augment,

    /// Configured entries are the whole table.
    Replace,
}

impl std::fmt::Display for RateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateMode::Augment => write!(f, "augment"),
            RateMode::Replace => write!(f, "replace"),
        }
    }
}

impl std::str::FromStr for RateMode {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "augment" | "merge" => Ok(RateMode::Augment),
            "replace" => Ok(RateMode::Replace),
            other => Err(ServiceError::InvalidConfig(format!(
                "Unknown rate mode: '{}'. Valid options: augment, replace",
                other
            ))),
        }
    }
}

/// The rate-table extension point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatesSection {
    #[serde(default)]
    pub mode: RateMode,

    /// Currency code → rate against USD.
    #[serde(default)]
    pub entries: BTreeMap<String, Decimal>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete GeoPrice configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoPriceConfig {
    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub batch: BatchSection,

    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub rates: RatesSection,

    /// Payment gateway allow/deny lists.
    #[serde(default)]
    pub gateways: Vec<GatewayRule>,
}

impl GeoPriceConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (geoprice.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ServiceResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ServiceResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ServiceError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ServiceResult<()> {
        self.store_settings().validate()?;

        Url::parse(&self.store.home_url)?;

        if self.batch.page_size == 0 || self.batch.page_size > MAX_PAGE_SIZE {
            return Err(ServiceError::InvalidConfig(format!(
                "batch.page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        parse_rate_overrides(&self.rates.entries)?;
        if self.rates.mode == RateMode::Replace && self.rates.entries.is_empty() {
            return Err(ServiceError::InvalidConfig(
                "rates.mode = \"replace\" needs at least one rate entry".into(),
            ));
        }

        Ok(())
    }

    /// Applies `GEOPRICE_*` overrides from a variable lookup.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(country) = lookup("GEOPRICE_BASE_COUNTRY") {
            debug!(country = %country, "Overriding base country from environment");
            self.store.base_country = country;
        }

        if let Some(currency) = lookup("GEOPRICE_BASE_CURRENCY") {
            debug!(currency = %currency, "Overriding base currency from environment");
            self.store.base_currency = currency;
        }

        if let Some(decimals) = lookup("GEOPRICE_PRICE_DECIMALS") {
            match decimals.parse::<u32>() {
                Ok(d) => self.store.price_decimals = d,
                Err(_) => warn!(value = %decimals, "Ignoring non-numeric GEOPRICE_PRICE_DECIMALS"),
            }
        }

        if let Some(path) = lookup("GEOPRICE_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(size) = lookup("GEOPRICE_BATCH_SIZE") {
            match size.parse::<u32>() {
                Ok(s) => self.batch.page_size = s,
                Err(_) => warn!(value = %size, "Ignoring non-numeric GEOPRICE_BATCH_SIZE"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "geoprice", "geoprice")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("geoprice.toml"))
    }

    // =========================================================================
    // Derived Values
    // =========================================================================

    /// The store's pricing identity.
    pub fn store_settings(&self) -> StoreSettings {
        let mut store = StoreSettings::new(
            self.store.base_country.as_str(),
            self.store.base_currency.as_str(),
        );
        store.price_decimals = self.store.price_decimals;
        store
    }

    /// Builds the rate table through the configured hook.
    pub fn rate_table(&self) -> ServiceResult<RateTable> {
        let overrides = parse_rate_overrides(&self.rates.entries)?;
        if overrides.is_empty() {
            return Ok(RateTable::builtin());
        }

        info!(
            mode = %self.rates.mode,
            entries = overrides.len(),
            "Applying configured exchange rates"
        );
        let table = match self.rates.mode {
            RateMode::Augment => RateTable::with_hook(|mut rates| {
                rates.extend(overrides);
                rates
            }),
            RateMode::Replace => RateTable::with_hook(|_| overrides),
        };
        Ok(table)
    }

    /// Payment gateway filter from the configured rules.
    pub fn gateway_filter(&self) -> GatewayFilter {
        GatewayFilter::new(self.gateways.iter().cloned())
    }

    /// The redirect fallback for country selection.
    pub fn home_url(&self) -> ServiceResult<Url> {
        Ok(Url::parse(&self.store.home_url)?)
    }

    /// Database path: configured, else the platform data directory.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("geoprice.db")))
            .unwrap_or_else(|| PathBuf::from("./geoprice.db"))
    }

    /// Database connection settings.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoprice_core::CurrencyCode;

    #[test]
    fn test_default_config() {
        let config = GeoPriceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch.page_size, 50);
        assert_eq!(config.store_settings(), StoreSettings::new("US", "USD"));
    }

    #[test]
    fn test_rate_mode_parsing() {
        assert_eq!("augment".parse::<RateMode>().unwrap(), RateMode::Augment);
        assert_eq!("REPLACE".parse::<RateMode>().unwrap(), RateMode::Replace);
        assert!("fetch".parse::<RateMode>().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GeoPriceConfig::default();
        config.apply_overrides(|key| match key {
            "GEOPRICE_BASE_COUNTRY" => Some("de".to_string()),
            "GEOPRICE_BASE_CURRENCY" => Some("eur".to_string()),
            "GEOPRICE_BATCH_SIZE" => Some("25".to_string()),
            "GEOPRICE_PRICE_DECIMALS" => Some("many".to_string()),
            _ => None,
        });

        let store = config.store_settings();
        assert_eq!(store.base_country.as_str(), "DE");
        assert_eq!(store.base_currency.as_str(), "EUR");
        assert_eq!(store.price_decimals, 2);
        assert_eq!(config.batch.page_size, 25);
    }

    #[test]
    fn test_config_validation() {
        let mut config = GeoPriceConfig::default();
        config.batch.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = GeoPriceConfig::default();
        config.store.base_currency = "DOLLARS".into();
        assert!(config.validate().is_err());

        let mut config = GeoPriceConfig::default();
        config.rates.entries.insert("EUR".into(), Decimal::ZERO);
        assert!(config.validate().is_err());

        let mut config = GeoPriceConfig::default();
        config.rates.mode = RateMode::Replace;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_rates_augment_and_replace() {
        let config: GeoPriceConfig = toml::from_str(
            r#"
            [rates.entries]
            EUR = "0.95"
            "#,
        )
        .unwrap();
        let table = config.rate_table().unwrap();
        assert_eq!(table.rate(&CurrencyCode::new("EUR")), Some(Decimal::new(95, 2)));
        assert!(table.contains(&CurrencyCode::new("JPY")));

        let config: GeoPriceConfig = toml::from_str(
            r#"
            [rates]
            mode = "replace"

            [rates.entries]
            eur = "0.95"
            "#,
        )
        .unwrap();
        let table = config.rate_table().unwrap();
        assert!(table.contains(&CurrencyCode::new("EUR")));
        assert!(table.contains(&CurrencyCode::new("USD")));
        assert!(!table.contains(&CurrencyCode::new("JPY")));
    }

    #[test]
    fn test_toml_gateways() {
        let config: GeoPriceConfig = toml::from_str(
            r#"
            [[gateways]]
            gateway_id = "cod"
            allowed_countries = ["PK"]
            "#,
        )
        .unwrap();
        let filter = config.gateway_filter();
        let pkr = CurrencyCode::new("PKR");
        assert!(filter.is_available("cod", &"PK".into(), &pkr));
        assert!(!filter.is_available("cod", &"US".into(), &pkr));
    }

    #[test]
    fn test_toml_serialization() {
        let config = GeoPriceConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[batch]"));
    }
}
