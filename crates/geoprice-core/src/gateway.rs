//! # Gateway Filter
//!
//! Hides payment gateways that don't serve the visitor's country or currency.
//!
//! ```text
//!   denied country?  ──yes──► hidden
//!   denied currency? ──yes──► hidden
//!   allow-list set and visitor not in it? ──yes──► hidden
//!   otherwise ──► available
//! ```
//!
//! Gateways without a rule are always available.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{CountryCode, CurrencyCode};

/// Allow/deny lists for one gateway. Empty allow lists mean "everyone".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRule {
    pub gateway_id: String,
    #[serde(default)]
    pub allowed_countries: Vec<CountryCode>,
    #[serde(default)]
    pub denied_countries: Vec<CountryCode>,
    #[serde(default)]
    pub allowed_currencies: Vec<CurrencyCode>,
    #[serde(default)]
    pub denied_currencies: Vec<CurrencyCode>,
}

impl GatewayRule {
    pub fn new(gateway_id: impl Into<String>) -> Self {
        GatewayRule {
            gateway_id: gateway_id.into(),
            ..GatewayRule::default()
        }
    }

    /// Checks the rule against a visitor.
    pub fn allows(&self, country: &CountryCode, currency: &CurrencyCode) -> bool {
        if self.denied_countries.contains(country) || self.denied_currencies.contains(currency) {
            return false;
        }
        let country_ok = self.allowed_countries.is_empty() || self.allowed_countries.contains(country);
        let currency_ok =
            self.allowed_currencies.is_empty() || self.allowed_currencies.contains(currency);
        country_ok && currency_ok
    }
}

/// Filters a host-supplied gateway list.
#[derive(Debug, Clone, Default)]
pub struct GatewayFilter {
    rules: BTreeMap<String, GatewayRule>,
}

impl GatewayFilter {
    /// Builds a filter. A later rule for the same gateway replaces an earlier one.
    pub fn new(rules: impl IntoIterator<Item = GatewayRule>) -> Self {
        GatewayFilter {
            rules: rules
                .into_iter()
                .map(|rule| (rule.gateway_id.clone(), rule))
                .collect(),
        }
    }

    pub fn is_available(&self, gateway_id: &str, country: &CountryCode, currency: &CurrencyCode) -> bool {
        self.rules
            .get(gateway_id)
            .map_or(true, |rule| rule.allows(country, currency))
    }

    /// Keeps the available gateways, preserving the host's order.
    pub fn filter<'a, I>(&self, gateway_ids: I, country: &CountryCode, currency: &CurrencyCode) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        gateway_ids
            .into_iter()
            .filter(|id| self.is_available(id, country, currency))
            .map(str::to_string)
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cc(code: &str) -> CountryCode {
        CountryCode::new(code)
    }
    fn cur(code: &str) -> CurrencyCode {
        CurrencyCode::new(code)
    }

    #[test]
    fn test_unruled_gateway_available() {
        let filter = GatewayFilter::default();
        assert!(filter.is_available("paypal", &cc("DE"), &cur("EUR")));
    }

    #[test]
    fn test_deny_lists() {
        let filter = GatewayFilter::new([GatewayRule {
            denied_countries: vec![cc("RU")],
            denied_currencies: vec![cur("JPY")],
            ..GatewayRule::new("card")
        }]);
        assert!(!filter.is_available("card", &cc("RU"), &cur("USD")));
        assert!(!filter.is_available("card", &cc("JP"), &cur("JPY")));
        assert!(filter.is_available("card", &cc("DE"), &cur("EUR")));
    }

    #[test]
    fn test_allow_lists() {
        let filter = GatewayFilter::new([GatewayRule {
            allowed_countries: vec![cc("IN")],
            allowed_currencies: vec![cur("INR")],
            ..GatewayRule::new("upi")
        }]);
        assert!(filter.is_available("upi", &cc("IN"), &cur("INR")));
        assert!(!filter.is_available("upi", &cc("IN"), &cur("USD")));
        assert!(!filter.is_available("upi", &cc("US"), &cur("INR")));
    }

    #[test]
    fn test_filter_preserves_order() {
        let filter = GatewayFilter::new([GatewayRule {
            denied_countries: vec![cc("DE")],
            ..GatewayRule::new("cod")
        }]);
        let available = filter.filter(["stripe", "cod", "paypal"], &cc("DE"), &cur("EUR"));
        assert_eq!(available, vec!["stripe", "paypal"]);
    }
}
