//! # Discount Engine
//!
//! Country-specific discounts applied to a resolved final price.
//!
//! ## Rule Evaluation
//! ```text
//!   rules: [ {US, percent, 10}, {US, flat, 5}, {DE, flat, 3} ]
//!              ▲
//!              └── first rule whose country matches wins; the rest are
//!                  never evaluated (US: 100 → 90, not 85)
//! ```
//!
//! - Percent: `p - p × amount / 100`
//! - Flat:    `p - amount`
//! - Result clamped at 0, then rounded for the visitor's currency
//! - Absent prices stay absent

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::rates::RoundingPolicy;
use crate::types::{CountryCode, CurrencyCode};

// =============================================================================
// Discount Rule
// =============================================================================

/// Kind of discount.
///
/// Stored as `"amount"` (flat) or `"percent"`, matching the settings form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum DiscountKind {
    #[serde(rename = "amount")]
    Flat,
    #[serde(rename = "percent")]
    Percent,
}

impl DiscountKind {
    /// Stored values accepted by the settings form.
    pub const ALLOWED: [&'static str; 2] = ["amount", "percent"];

    /// Parses a stored/submitted kind. Anything else is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "amount" | "flat" => Some(DiscountKind::Flat),
            "percent" => Some(DiscountKind::Percent),
            _ => None,
        }
    }

    /// Returns the stored value.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Flat => "amount",
            DiscountKind::Percent => "percent",
        }
    }
}

/// One configured discount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRule {
    pub country: CountryCode,

    #[serde(rename = "type")]
    pub kind: DiscountKind,

    /// Non-negative; percent rules above 100 simply clamp the price to 0.
    #[ts(type = "string")]
    pub amount: Decimal,
}

impl DiscountRule {
    pub fn new(country: impl Into<CountryCode>, kind: DiscountKind, amount: Decimal) -> Self {
        DiscountRule {
            country: country.into(),
            kind,
            amount: amount.max(Decimal::ZERO),
        }
    }

    /// Applies this rule to a price, clamping at zero.
    pub fn apply(&self, price: Decimal) -> Decimal {
        let discounted = match self.kind {
            DiscountKind::Percent => price - price * self.amount / Decimal::ONE_HUNDRED,
            DiscountKind::Flat => price - self.amount,
        };
        discounted.max(Decimal::ZERO)
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Applies the first matching rule for a country.
#[derive(Debug, Clone, Default)]
pub struct DiscountEngine {
    rules: Vec<DiscountRule>,
}

impl DiscountEngine {
    pub fn new(rules: Vec<DiscountRule>) -> Self {
        DiscountEngine { rules }
    }

    pub fn rules(&self) -> &[DiscountRule] {
        &self.rules
    }

    /// Returns the rule that would apply to a country.
    pub fn rule_for(&self, country: &CountryCode) -> Option<&DiscountRule> {
        self.rules.iter().find(|rule| &rule.country == country)
    }

    /// Applies the matching rule, if any, without rounding.
    pub fn apply(&self, price: Option<Decimal>, country: &CountryCode) -> Option<Decimal> {
        apply_discount(price, country, &self.rules)
    }

    /// Applies the matching rule and rounds for the visitor's currency.
    ///
    /// Prices with no matching rule are returned untouched.
    pub fn apply_rounded(
        &self,
        price: Option<Decimal>,
        country: &CountryCode,
        currency: &CurrencyCode,
        rounding: RoundingPolicy,
    ) -> Option<Decimal> {
        let price = price?;
        match self.rule_for(country) {
            Some(rule) => Some(rounding.round(rule.apply(price), currency)),
            None => Some(price),
        }
    }
}

/// Applies the first rule matching `country` to `price`.
///
/// ## Example
/// ```rust
/// use geoprice_core::discount::{apply_discount, DiscountKind, DiscountRule};
/// use geoprice_core::types::CountryCode;
/// use rust_decimal::Decimal;
///
/// let rules = vec![
///     DiscountRule::new("US", DiscountKind::Percent, Decimal::from(10)),
///     DiscountRule::new("US", DiscountKind::Flat, Decimal::from(5)),
/// ];
/// let us = CountryCode::new("US");
/// assert_eq!(apply_discount(Some(Decimal::from(100)), &us, &rules), Some(Decimal::from(90)));
/// ```
pub fn apply_discount(
    price: Option<Decimal>,
    country: &CountryCode,
    rules: &[DiscountRule],
) -> Option<Decimal> {
    let price = price?;
    match rules.iter().find(|rule| &rule.country == country) {
        Some(rule) => Some(rule.apply(price)),
        None => Some(price),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_first_match_only() {
        let rules = vec![
            DiscountRule::new("US", DiscountKind::Percent, d("10")),
            DiscountRule::new("US", DiscountKind::Flat, d("5")),
        ];
        let result = apply_discount(Some(d("100")), &CountryCode::new("US"), &rules);
        assert_eq!(result, Some(d("90")));
    }

    #[test]
    fn test_flat_clamps_at_zero() {
        let rules = vec![DiscountRule::new("DE", DiscountKind::Flat, d("50"))];
        let result = apply_discount(Some(d("20")), &CountryCode::new("DE"), &rules);
        assert_eq!(result, Some(Decimal::ZERO));
    }

    #[test]
    fn test_percent_over_hundred_clamps() {
        let rules = vec![DiscountRule::new("DE", DiscountKind::Percent, d("150"))];
        let result = apply_discount(Some(d("20")), &CountryCode::new("DE"), &rules);
        assert_eq!(result, Some(Decimal::ZERO));
    }

    #[test]
    fn test_no_match_unchanged() {
        let rules = vec![DiscountRule::new("DE", DiscountKind::Flat, d("5"))];
        let result = apply_discount(Some(d("20")), &CountryCode::new("FR"), &rules);
        assert_eq!(result, Some(d("20")));
    }

    #[test]
    fn test_absent_stays_absent() {
        let rules = vec![DiscountRule::new("DE", DiscountKind::Flat, d("5"))];
        assert_eq!(apply_discount(None, &CountryCode::new("DE"), &rules), None);
    }

    #[test]
    fn test_negative_amount_coerced() {
        let rule = DiscountRule::new("DE", DiscountKind::Flat, d("-5"));
        assert_eq!(rule.amount, Decimal::ZERO);
    }

    #[test]
    fn test_apply_rounded_for_currency() {
        let engine = DiscountEngine::new(vec![DiscountRule::new(
            "JP",
            DiscountKind::Percent,
            d("15"),
        )]);
        // 1499 × 0.85 = 1274.15 → 1274 yen
        let result = engine.apply_rounded(
            Some(d("1499")),
            &CountryCode::new("JP"),
            &CurrencyCode::new("JPY"),
            RoundingPolicy::default(),
        );
        assert_eq!(result.map(|p| p.to_string()), Some("1274".to_string()));
    }

    #[test]
    fn test_kind_wire_format() {
        assert_eq!(DiscountKind::parse("Percent"), Some(DiscountKind::Percent));
        assert_eq!(DiscountKind::parse("amount"), Some(DiscountKind::Flat));
        assert_eq!(DiscountKind::parse("bogus"), None);

        let rule = DiscountRule::new("us", DiscountKind::Flat, d("2.5"));
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "amount");
        assert_eq!(json["country"], "US");
    }
}
