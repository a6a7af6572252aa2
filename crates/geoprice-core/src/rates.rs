//! # Rate Table & Converter
//!
//! Static exchange rates relative to USD and currency-aware rounding.
//!
//! ## Why Static Rates?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Rates never expire and are never fetched.                              │
//! │                                                                         │
//! │  • Deterministic: the same base price always converts the same way     │
//! │  • No external dependency on the save/batch path                       │
//! │  • Conversion happens ONCE (save/batch time), never per page view      │
//! │                                                                         │
//! │  Admins adjust rates through the single override hook.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conversion Path
//! ```text
//!   amount (FROM) ──► ÷ rate[FROM] ──► USD ──► × rate[TO] ──► round(TO)
//!                     (skipped when FROM = USD)  (skipped when TO = USD)
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CoreResult, PricingError};
use crate::types::CurrencyCode;

// =============================================================================
// Constants
// =============================================================================

/// Pivot currency every rate is relative to (1 USD = rate).
pub const REFERENCE_CURRENCY: &str = "USD";

/// Currencies priced without a fractional part.
pub const ZERO_DECIMAL_CURRENCIES: &[&str] = &["JPY", "KRW", "VND"];

/// Store price precision used when nothing is configured.
pub const DEFAULT_PRICE_DECIMALS: u32 = 2;

/// Built-in rates as (currency, mantissa, scale): 1 USD = mantissa × 10^-scale.
const BUILTIN_RATES: &[(&str, i64, u32)] = &[
    // Americas
    ("USD", 1, 0),
    ("CAD", 136, 2),
    ("MXN", 1690, 2),
    ("BRL", 495, 2),
    ("ARS", 850, 0),
    ("CLP", 980, 0),
    ("COP", 3900, 0),
    ("PEN", 375, 2),
    // Europe
    ("EUR", 91, 2),
    ("GBP", 78, 2),
    ("CHF", 88, 2),
    ("SEK", 104, 1),
    ("NOK", 106, 1),
    ("DKK", 68, 1),
    ("PLN", 395, 2),
    ("CZK", 228, 1),
    ("HUF", 355, 0),
    ("RON", 455, 2),
    ("BGN", 178, 2),
    ("HRK", 69, 1),
    // Asia
    ("INR", 8320, 2),
    ("PKR", 279, 0),
    ("BDT", 110, 0),
    ("LKR", 310, 0),
    ("NPR", 133, 0),
    ("CNY", 720, 2),
    ("JPY", 148, 0),
    ("KRW", 1320, 0),
    ("IDR", 15600, 0),
    ("MYR", 470, 2),
    ("THB", 358, 1),
    ("PHP", 560, 1),
    ("VND", 24500, 0),
    ("SGD", 134, 2),
    ("HKD", 783, 2),
    ("TWD", 315, 1),
    // Middle East
    ("AED", 367, 2),
    ("SAR", 375, 2),
    ("QAR", 364, 2),
    ("KWD", 31, 2),
    ("BHD", 38, 2),
    ("OMR", 38, 2),
    ("ILS", 365, 2),
    // Africa
    ("ZAR", 185, 1),
    ("NGN", 1450, 0),
    ("KES", 156, 0),
    ("EGP", 48, 0),
    ("MAD", 100, 1),
    ("GHS", 123, 1),
    // Oceania
    ("AUD", 152, 2),
    ("NZD", 164, 2),
];

// =============================================================================
// Rate Table
// =============================================================================

/// Currency → rate relative to [`REFERENCE_CURRENCY`].
///
/// ## Invariants
/// - The reference currency is always present with rate 1
/// - Every stored rate is strictly positive
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: BTreeMap<CurrencyCode, Decimal>,
}

impl RateTable {
    /// Creates the table from the compiled-in rates.
    pub fn builtin() -> Self {
        RateTable::from_rates(builtin_rates())
    }

    /// Creates a table from an arbitrary mapping, enforcing the invariants.
    ///
    /// Non-positive rates are dropped (they would mean "no rate").
    pub fn from_rates(rates: BTreeMap<CurrencyCode, Decimal>) -> Self {
        let mut rates: BTreeMap<CurrencyCode, Decimal> = rates
            .into_iter()
            .filter(|(code, rate)| !code.is_empty() && rate.is_sign_positive() && !rate.is_zero())
            .collect();
        rates.insert(CurrencyCode::new(REFERENCE_CURRENCY), Decimal::ONE);
        RateTable { rates }
    }

    /// Builds the table through the extension hook.
    ///
    /// The hook receives the full built-in mapping and returns the mapping
    /// to use, so it may augment, patch or replace it entirely.
    ///
    /// ## Example
    /// ```rust
    /// use geoprice_core::rates::RateTable;
    /// use geoprice_core::types::CurrencyCode;
    /// use rust_decimal::Decimal;
    ///
    /// let table = RateTable::with_hook(|mut rates| {
    ///     rates.insert(CurrencyCode::new("EUR"), Decimal::new(95, 2));
    ///     rates
    /// });
    /// assert_eq!(table.rate(&CurrencyCode::new("EUR")), Some(Decimal::new(95, 2)));
    /// ```
    pub fn with_hook<F>(hook: F) -> Self
    where
        F: FnOnce(BTreeMap<CurrencyCode, Decimal>) -> BTreeMap<CurrencyCode, Decimal>,
    {
        RateTable::from_rates(hook(builtin_rates()))
    }

    /// Returns the rate for a currency, if known.
    #[inline]
    pub fn rate(&self, currency: &CurrencyCode) -> Option<Decimal> {
        self.rates.get(currency).copied()
    }

    /// Checks if a currency has a rate.
    #[inline]
    pub fn contains(&self, currency: &CurrencyCode) -> bool {
        self.rates.contains_key(currency)
    }

    /// Returns the full mapping.
    pub fn rates(&self) -> &BTreeMap<CurrencyCode, Decimal> {
        &self.rates
    }
}

impl Default for RateTable {
    fn default() -> Self {
        RateTable::builtin()
    }
}

/// Validates configured rate overrides.
///
/// Unlike [`RateTable::from_rates`], which silently drops bad rates, this
/// rejects them so a typo in the configuration is reported.
pub fn parse_rate_overrides(
    entries: &BTreeMap<String, Decimal>,
) -> CoreResult<BTreeMap<CurrencyCode, Decimal>> {
    entries
        .iter()
        .map(|(code, rate)| {
            if *rate <= Decimal::ZERO {
                return Err(PricingError::InvalidRate {
                    currency: code.clone(),
                    rate: rate.to_string(),
                });
            }
            Ok((CurrencyCode::new(code), *rate))
        })
        .collect()
}

fn builtin_rates() -> BTreeMap<CurrencyCode, Decimal> {
    BUILTIN_RATES
        .iter()
        .map(|&(code, mantissa, scale)| (CurrencyCode::new(code), Decimal::new(mantissa, scale)))
        .collect()
}

// =============================================================================
// Rounding Policy
// =============================================================================

/// Currency-aware rounding.
///
/// Zero-decimal currencies round to whole units, all others to the store's
/// price precision. Midpoints round away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundingPolicy {
    price_decimals: u32,
}

impl RoundingPolicy {
    /// Creates a policy with the store's price precision.
    pub const fn new(price_decimals: u32) -> Self {
        RoundingPolicy { price_decimals }
    }

    /// Returns the number of decimal places for a currency.
    pub fn decimals_for(&self, currency: &CurrencyCode) -> u32 {
        if ZERO_DECIMAL_CURRENCIES.contains(&currency.as_str()) {
            0
        } else {
            self.price_decimals
        }
    }

    /// Rounds an amount for a currency, fixing the scale.
    ///
    /// ## Example
    /// ```rust
    /// use geoprice_core::rates::RoundingPolicy;
    /// use geoprice_core::types::CurrencyCode;
    /// use rust_decimal::Decimal;
    ///
    /// let policy = RoundingPolicy::default();
    /// let jpy = policy.round(Decimal::new(1480050, 2), &CurrencyCode::new("JPY"));
    /// assert_eq!(jpy.to_string(), "14801");
    ///
    /// let eur = policy.round(Decimal::new(91, 0), &CurrencyCode::new("EUR"));
    /// assert_eq!(eur.to_string(), "91.00");
    /// ```
    pub fn round(&self, amount: Decimal, currency: &CurrencyCode) -> Decimal {
        let dp = self.decimals_for(currency);
        let mut rounded = amount.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
        // round_dp never increases the scale; pad so "91" displays as "91.00"
        rounded.rescale(dp);
        rounded
    }
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        RoundingPolicy::new(DEFAULT_PRICE_DECIMALS)
    }
}

// =============================================================================
// Converter
// =============================================================================

/// Converts amounts between currencies through the reference currency.
#[derive(Debug, Clone)]
pub struct Converter {
    rates: Arc<RateTable>,
    rounding: RoundingPolicy,
    base_currency: CurrencyCode,
}

impl Converter {
    /// Creates a converter for a store.
    pub fn new(rates: Arc<RateTable>, rounding: RoundingPolicy, base_currency: CurrencyCode) -> Self {
        Converter {
            rates,
            rounding,
            base_currency,
        }
    }

    /// Returns the rate table.
    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    /// Returns the rounding policy.
    pub fn rounding(&self) -> RoundingPolicy {
        self.rounding
    }

    /// Returns the store base currency.
    pub fn base_currency(&self) -> &CurrencyCode {
        &self.base_currency
    }

    /// Converts `amount` from one currency to another.
    ///
    /// ## Rules
    /// - `amount <= 0` → 0
    /// - same currency → amount rounded for that currency
    /// - either currency missing from the table → amount rounded in the
    ///   SOURCE currency (unconverted; see [`Converter::try_convert`])
    /// - otherwise route through USD and round for the target
    pub fn convert(&self, amount: Decimal, from: &CurrencyCode, to: &CurrencyCode) -> Decimal {
        if amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        match self.try_convert(amount, from, to) {
            Some(converted) => converted,
            None => self.rounding.round(amount, from),
        }
    }

    /// Strict variant of [`Converter::convert`]: `None` when either
    /// currency has no rate instead of returning an unconverted amount.
    pub fn try_convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Option<Decimal> {
        if amount <= Decimal::ZERO {
            return Some(Decimal::ZERO);
        }

        if from == to {
            return Some(self.rounding.round(amount, to));
        }

        let from_rate = self.rates.rate(from)?;
        let to_rate = self.rates.rate(to)?;

        let reference = CurrencyCode::new(REFERENCE_CURRENCY);
        let usd = if *from == reference {
            amount
        } else {
            amount.checked_div(from_rate)?
        };
        let result = if *to == reference {
            usd
        } else {
            usd.checked_mul(to_rate)?
        };

        Some(self.rounding.round(result, to))
    }

    /// Like [`Converter::try_convert`], naming the missing currency.
    pub fn convert_checked(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> CoreResult<Decimal> {
        if from != to && amount > Decimal::ZERO {
            for code in [from, to] {
                if !self.rates.contains(code) {
                    return Err(PricingError::UnknownRate(code.to_string()));
                }
            }
        }
        self.try_convert(amount, from, to)
            .ok_or_else(|| PricingError::UnknownRate(to.to_string()))
    }

    /// Converts from the store base currency.
    pub fn convert_from_base(&self, amount: Decimal, to: &CurrencyCode) -> Decimal {
        self.convert(amount, &self.base_currency, to)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn usd() -> CurrencyCode {
        CurrencyCode::new("USD")
    }
    fn eur() -> CurrencyCode {
        CurrencyCode::new("EUR")
    }
    fn jpy() -> CurrencyCode {
        CurrencyCode::new("JPY")
    }

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn converter() -> Converter {
        Converter::new(Arc::new(RateTable::builtin()), RoundingPolicy::default(), usd())
    }

    #[test]
    fn test_reference_rate_is_one() {
        let table = RateTable::from_rates(BTreeMap::from([(usd(), d("3"))]));
        assert_eq!(table.rate(&usd()), Some(Decimal::ONE));
        assert_eq!(RateTable::builtin().rate(&usd()), Some(Decimal::ONE));
    }

    #[test]
    fn test_non_positive_rates_dropped() {
        let table = RateTable::from_rates(BTreeMap::from([(eur(), d("0")), (jpy(), d("-1"))]));
        assert!(!table.contains(&eur()));
        assert!(!table.contains(&jpy()));
    }

    #[test]
    fn test_hook_can_replace_table() {
        let table = RateTable::with_hook(|_| BTreeMap::from([(eur(), d("0.5"))]));
        assert_eq!(table.rates().len(), 2); // EUR + forced USD
        assert!(!table.contains(&jpy()));
    }

    #[test]
    fn test_usd_to_eur() {
        let result = converter().convert(d("100"), &usd(), &eur());
        assert_eq!(result, d("91.00"));
        assert_eq!(result.scale(), 2);
    }

    #[test]
    fn test_eur_to_usd_round_trip_within_tolerance() {
        let c = converter();
        let back = c.convert(d("91"), &eur(), &usd());
        assert!((back - d("100")).abs() <= d("0.01"));

        let there = c.convert(d("19.99"), &usd(), &eur());
        let back = c.convert(there, &eur(), &usd());
        assert!((back - d("19.99")).abs() <= d("0.02"));
    }

    #[test]
    fn test_zero_decimal_currency() {
        let result = converter().convert(d("100"), &usd(), &jpy());
        assert_eq!(result, d("14800"));
        assert_eq!(result.scale(), 0);
        assert_eq!(result.to_string(), "14800");
    }

    #[test]
    fn test_cross_rate_via_usd() {
        // 100 EUR → 109.89... USD → × 0.78 = 85.71 GBP
        let result = converter().convert(d("100"), &eur(), &CurrencyCode::new("GBP"));
        assert_eq!(result, d("85.71"));
    }

    #[test]
    fn test_non_positive_amount_guard() {
        let c = converter();
        assert_eq!(c.convert(d("0"), &usd(), &eur()), Decimal::ZERO);
        assert_eq!(c.convert(d("-5"), &usd(), &eur()), Decimal::ZERO);
    }

    #[test]
    fn test_same_currency_still_rounds() {
        let c = converter();
        let result = c.convert(d("1499.50"), &jpy(), &jpy());
        assert_eq!(result.to_string(), "1500");
    }

    #[test]
    fn test_missing_rate_falls_back_to_source_rounding() {
        let c = converter();
        let afn = CurrencyCode::new("AFN");
        assert_eq!(c.convert(d("10.555"), &usd(), &afn).to_string(), "10.56");
        assert_eq!(c.convert(d("1480.4"), &jpy(), &afn).to_string(), "1480");
        assert!(c.try_convert(d("10"), &usd(), &afn).is_none());
    }

    #[test]
    fn test_convert_checked_names_missing_currency() {
        let c = converter();
        let err = c.convert_checked(d("1"), &CurrencyCode::new("XYZ"), &eur()).unwrap_err();
        assert!(matches!(err, PricingError::UnknownRate(code) if code == "XYZ"));
        assert_eq!(c.convert_checked(d("100"), &usd(), &eur()).unwrap(), d("91.00"));
    }

    #[test]
    fn test_parse_rate_overrides() {
        let ok = parse_rate_overrides(&BTreeMap::from([("eur".to_string(), d("0.95"))])).unwrap();
        assert_eq!(ok.get(&eur()), Some(&d("0.95")));

        let err = parse_rate_overrides(&BTreeMap::from([("EUR".to_string(), d("0"))]));
        assert!(matches!(err, Err(PricingError::InvalidRate { .. })));
    }

    #[test]
    fn test_convert_from_base() {
        let c = Converter::new(Arc::new(RateTable::builtin()), RoundingPolicy::default(), eur());
        assert_eq!(c.convert_from_base(d("91"), &usd()), d("100.00"));
        assert_eq!(c.convert_from_base(d("10"), &eur()), d("10.00"));
    }

    #[test]
    fn test_store_precision() {
        let c = Converter::new(Arc::new(RateTable::builtin()), RoundingPolicy::new(3), usd());
        assert_eq!(c.convert(d("1"), &usd(), &CurrencyCode::new("KWD")).to_string(), "0.310");
    }
}
