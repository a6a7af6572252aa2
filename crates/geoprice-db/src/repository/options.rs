//! # Options Repository
//!
//! Store-wide settings and flags, one JSON value per name.
//!
//! ## Batch Flags
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  batch_scheduled     present while a run is queued or running           │
//! │                      set with INSERT ... ON CONFLICT DO NOTHING, so     │
//! │                      exactly one caller wins a concurrent schedule      │
//! │                                                                         │
//! │  batch_completed_at  timestamp of the last finished run                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use geoprice_core::settings::{
    OPT_BATCH_COMPLETED_AT, OPT_BATCH_SCHEDULED, OPT_COUNTRY_CURRENCY_MAP, OPT_COUNTRY_DISCOUNTS,
    OPT_COUNTRY_SYMBOL_MAP, OPT_ENABLED_COUNTRIES,
};
use geoprice_core::{CountryCode, CurrencyCode, CurrencyOverrides, DiscountRule, PricingSettings};

/// Marker stored while a batch run is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledRun {
    pub run_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
}

impl ScheduledRun {
    pub fn new() -> Self {
        ScheduledRun {
            run_id: Uuid::new_v4(),
            scheduled_at: Utc::now(),
        }
    }
}

impl Default for ScheduledRun {
    fn default() -> Self {
        ScheduledRun::new()
    }
}

/// Repository for option values.
#[derive(Debug, Clone)]
pub struct OptionsRepository {
    pool: SqlitePool,
}

impl OptionsRepository {
    /// Creates a new OptionsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OptionsRepository { pool }
    }

    // =========================================================================
    // Generic Access
    // =========================================================================

    /// Reads and decodes an option.
    pub async fn get<T: DeserializeOwned>(&self, name: &str) -> DbResult<Option<T>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM options WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        raw.map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| DbError::invalid_data(format!("options.{}", name), e.to_string()))
        })
        .transpose()
    }

    /// Encodes and stores an option, replacing any previous value.
    pub async fn set<T: Serialize>(&self, name: &str, value: &T) -> DbResult<()> {
        let raw = encode(name, value)?;
        sqlx::query(
            r#"
            INSERT INTO options (name, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(raw)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(option = name, "Option saved");
        Ok(())
    }

    /// Stores an option only if it doesn't exist yet.
    ///
    /// ## Returns
    /// `true` when this call created the option.
    pub async fn insert_if_absent<T: Serialize>(&self, name: &str, value: &T) -> DbResult<bool> {
        let raw = encode(name, value)?;
        let result = sqlx::query(
            r#"
            INSERT INTO options (name, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(raw)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Deletes an option. Returns whether it existed.
    pub async fn delete(&self, name: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM options WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Pricing Settings
    // =========================================================================

    /// Loads the admin pricing settings. Missing options mean defaults.
    pub async fn pricing_settings(&self) -> DbResult<PricingSettings> {
        let enabled_countries: Vec<CountryCode> =
            self.get(OPT_ENABLED_COUNTRIES).await?.unwrap_or_default();
        let discounts: Vec<DiscountRule> =
            self.get(OPT_COUNTRY_DISCOUNTS).await?.unwrap_or_default();

        Ok(PricingSettings {
            enabled_countries,
            discounts,
        })
    }

    /// Stores already-sanitized pricing settings.
    pub async fn save_pricing_settings(&self, settings: &PricingSettings) -> DbResult<()> {
        self.set(OPT_ENABLED_COUNTRIES, &settings.enabled_countries)
            .await?;
        self.set(OPT_COUNTRY_DISCOUNTS, &settings.discounts).await?;
        Ok(())
    }

    /// Loads the admin country → currency/symbol overrides.
    pub async fn currency_overrides(&self) -> DbResult<CurrencyOverrides> {
        let currencies: BTreeMap<CountryCode, CurrencyCode> =
            self.get(OPT_COUNTRY_CURRENCY_MAP).await?.unwrap_or_default();
        let symbols: BTreeMap<CountryCode, String> =
            self.get(OPT_COUNTRY_SYMBOL_MAP).await?.unwrap_or_default();

        Ok(CurrencyOverrides {
            currencies,
            symbols,
        })
    }

    /// Stores the admin country → currency/symbol overrides.
    pub async fn save_currency_overrides(&self, overrides: &CurrencyOverrides) -> DbResult<()> {
        self.set(OPT_COUNTRY_CURRENCY_MAP, &overrides.currencies)
            .await?;
        self.set(OPT_COUNTRY_SYMBOL_MAP, &overrides.symbols).await?;
        Ok(())
    }

    // =========================================================================
    // Batch Flags
    // =========================================================================

    /// Claims the scheduled flag. `None` when a run is already pending.
    pub async fn try_schedule_batch(&self) -> DbResult<Option<ScheduledRun>> {
        let run = ScheduledRun::new();
        if self.insert_if_absent(OPT_BATCH_SCHEDULED, &run).await? {
            debug!(run_id = %run.run_id, "Batch scheduled flag claimed");
            Ok(Some(run))
        } else {
            Ok(None)
        }
    }

    /// Returns the pending run, if any.
    pub async fn scheduled_batch(&self) -> DbResult<Option<ScheduledRun>> {
        self.get(OPT_BATCH_SCHEDULED).await
    }

    /// Clears the scheduled flag.
    pub async fn clear_scheduled_batch(&self) -> DbResult<bool> {
        self.delete(OPT_BATCH_SCHEDULED).await
    }

    /// Returns when the last run finished.
    pub async fn batch_completed_at(&self) -> DbResult<Option<DateTime<Utc>>> {
        self.get(OPT_BATCH_COMPLETED_AT).await
    }

    /// Records a finished run.
    pub async fn set_batch_completed_at(&self, at: DateTime<Utc>) -> DbResult<()> {
        self.set(OPT_BATCH_COMPLETED_AT, &at).await
    }
}

fn encode<T: Serialize>(name: &str, value: &T) -> DbResult<String> {
    serde_json::to_string(value)
        .map_err(|e| DbError::invalid_data(format!("options.{}", name), e.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================
