//! # Currency Registry
//!
//! Static mapping of country → {currency, symbol, display name, flag}.
//!
//! ## Lookup Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Country → Currency Lookup                            │
//! │                                                                         │
//! │  currency_of("de")                                                     │
//! │       │  normalize → "DE"                                               │
//! │       ▼                                                                 │
//! │  1. Admin override map (country_currency_map)     ← wins if present    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. Built-in table (compiled in)                  → "EUR"              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. Unknown country                               → None (never error) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The registry is built once at startup and shared read-only (`Arc`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::types::{CountryCode, CurrencyCode};

// =============================================================================
// Built-in Table
// =============================================================================

/// (country, display name, currency, symbol), in display order.
const COUNTRY_TABLE: &[(&str, &str, &str, &str)] = &[
    // Americas
    ("US", "United States", "USD", "$"),
    ("CA", "Canada", "CAD", "C$"),
    ("MX", "Mexico", "MXN", "MX$"),
    ("BR", "Brazil", "BRL", "R$"),
    ("AR", "Argentina", "ARS", "AR$"),
    ("CL", "Chile", "CLP", "CLP$"),
    ("CO", "Colombia", "COP", "COL$"),
    ("PE", "Peru", "PEN", "S/"),
    // Europe
    ("GB", "United Kingdom", "GBP", "£"),
    ("DE", "Germany", "EUR", "€"),
    ("FR", "France", "EUR", "€"),
    ("IT", "Italy", "EUR", "€"),
    ("ES", "Spain", "EUR", "€"),
    ("NL", "Netherlands", "EUR", "€"),
    ("BE", "Belgium", "EUR", "€"),
    ("AT", "Austria", "EUR", "€"),
    ("IE", "Ireland", "EUR", "€"),
    ("PT", "Portugal", "EUR", "€"),
    ("FI", "Finland", "EUR", "€"),
    ("GR", "Greece", "EUR", "€"),
    ("CH", "Switzerland", "CHF", "CHF"),
    ("SE", "Sweden", "SEK", "kr"),
    ("NO", "Norway", "NOK", "kr"),
    ("DK", "Denmark", "DKK", "kr."),
    ("PL", "Poland", "PLN", "zł"),
    ("CZ", "Czech Republic", "CZK", "Kč"),
    ("HU", "Hungary", "HUF", "Ft"),
    ("RO", "Romania", "RON", "lei"),
    ("BG", "Bulgaria", "BGN", "лв"),
    ("HR", "Croatia", "EUR", "€"),
    // Asia
    ("IN", "India", "INR", "₹"),
    ("PK", "Pakistan", "PKR", "₨"),
    ("BD", "Bangladesh", "BDT", "৳"),
    ("LK", "Sri Lanka", "LKR", "Rs"),
    ("NP", "Nepal", "NPR", "रू"),
    ("AF", "Afghanistan", "AFN", "؋"),
    ("CN", "China", "CNY", "¥"),
    ("JP", "Japan", "JPY", "¥"),
    ("KR", "South Korea", "KRW", "₩"),
    ("ID", "Indonesia", "IDR", "Rp"),
    ("MY", "Malaysia", "MYR", "RM"),
    ("TH", "Thailand", "THB", "฿"),
    ("PH", "Philippines", "PHP", "₱"),
    ("VN", "Vietnam", "VND", "₫"),
    ("SG", "Singapore", "SGD", "S$"),
    ("HK", "Hong Kong", "HKD", "HK$"),
    ("TW", "Taiwan", "TWD", "NT$"),
    // Middle East
    ("AE", "United Arab Emirates", "AED", "د.إ"),
    ("SA", "Saudi Arabia", "SAR", "﷼"),
    ("QA", "Qatar", "QAR", "ر.ق"),
    ("KW", "Kuwait", "KWD", "د.ك"),
    ("BH", "Bahrain", "BHD", ".د.ب"),
    ("OM", "Oman", "OMR", "ر.ع."),
    ("IL", "Israel", "ILS", "₪"),
    // Africa
    ("ZA", "South Africa", "ZAR", "R"),
    ("NG", "Nigeria", "NGN", "₦"),
    ("KE", "Kenya", "KES", "KSh"),
    ("EG", "Egypt", "EGP", "E£"),
    ("MA", "Morocco", "MAD", "DH"),
    ("GH", "Ghana", "GHS", "GH₵"),
    // Oceania
    ("AU", "Australia", "AUD", "A$"),
    ("NZ", "New Zealand", "NZD", "NZ$"),
];

// =============================================================================
// Entry
// =============================================================================

/// One row of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryCurrencyEntry {
    pub country: CountryCode,
    pub currency: CurrencyCode,
    pub symbol: String,
    pub display_name: String,
    pub flag: String,
}

/// A selectable country for settings and storefront pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CountryOption {
    pub code: CountryCode,
    pub name: String,
}

/// Builds the regional-indicator flag glyph for a two-letter code.
///
/// Returns `None` for anything that isn't two ASCII letters.
pub fn flag_glyph(country: &CountryCode) -> Option<String> {
    let code = country.as_str();
    if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }

    code.bytes()
        .map(|b| char::from_u32(0x1F1E6 + u32::from(b - b'A')))
        .collect()
}

// =============================================================================
// Registry
// =============================================================================

/// Country → currency registry with optional admin overrides.
#[derive(Debug, Clone)]
pub struct CurrencyRegistry {
    /// Entries in display order.
    entries: Vec<CountryCurrencyEntry>,

    /// Country → index into `entries`.
    index: BTreeMap<CountryCode, usize>,

    /// Admin override: country → currency.
    currency_overrides: BTreeMap<CountryCode, CurrencyCode>,

    /// Admin override: country → symbol.
    symbol_overrides: BTreeMap<CountryCode, String>,
}

impl CurrencyRegistry {
    /// Creates the registry from the compiled-in table.
    pub fn builtin() -> Self {
        let entries: Vec<CountryCurrencyEntry> = COUNTRY_TABLE
            .iter()
            .map(|(country, name, currency, symbol)| {
                let country = CountryCode::new(country);
                CountryCurrencyEntry {
                    flag: flag_glyph(&country).unwrap_or_default(),
                    country,
                    currency: CurrencyCode::new(currency),
                    symbol: symbol.to_string(),
                    display_name: name.to_string(),
                }
            })
            .collect();

        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.country.clone(), i))
            .collect();

        CurrencyRegistry {
            entries,
            index,
            currency_overrides: BTreeMap::new(),
            symbol_overrides: BTreeMap::new(),
        }
    }

    /// Layers admin-configured mapping overrides on top of the table.
    ///
    /// Blank values are ignored so an emptied settings field falls back to
    /// the built-in mapping.
    pub fn with_overrides(
        mut self,
        currencies: BTreeMap<CountryCode, CurrencyCode>,
        symbols: BTreeMap<CountryCode, String>,
    ) -> Self {
        self.currency_overrides = currencies
            .into_iter()
            .filter(|(country, currency)| !country.is_empty() && !currency.is_empty())
            .collect();
        self.symbol_overrides = symbols
            .into_iter()
            .filter(|(country, symbol)| !country.is_empty() && !symbol.trim().is_empty())
            .collect();
        self
    }

    /// Returns the built-in entry for a country, ignoring overrides.
    pub fn entry(&self, country: &CountryCode) -> Option<&CountryCurrencyEntry> {
        self.index
            .get(&CountryCode::new(country.as_str()))
            .map(|&i| &self.entries[i])
    }

    /// Returns the currency for a country.
    ///
    /// ## Example
    /// ```rust
    /// use geoprice_core::registry::CurrencyRegistry;
    /// use geoprice_core::types::CountryCode;
    ///
    /// let registry = CurrencyRegistry::builtin();
    /// let eur = registry.currency_of(&CountryCode::new("de")).unwrap();
    /// assert_eq!(eur.as_str(), "EUR");
    /// assert!(registry.currency_of(&CountryCode::new("XX")).is_none());
    /// ```
    pub fn currency_of(&self, country: &CountryCode) -> Option<CurrencyCode> {
        let country = CountryCode::new(country.as_str());
        self.currency_overrides
            .get(&country)
            .cloned()
            .or_else(|| self.entry(&country).map(|e| e.currency.clone()))
    }

    /// Returns the currency symbol for a country.
    pub fn symbol_of(&self, country: &CountryCode) -> Option<String> {
        let country = CountryCode::new(country.as_str());
        self.symbol_overrides
            .get(&country)
            .cloned()
            .or_else(|| self.entry(&country).map(|e| e.symbol.clone()))
    }

    /// Returns the flag glyph for a known country.
    pub fn flag_of(&self, country: &CountryCode) -> Option<String> {
        self.entry(country).map(|e| e.flag.clone())
    }

    /// Returns the display name for a known country.
    pub fn name_of(&self, country: &CountryCode) -> Option<&str> {
        self.entry(country).map(|e| e.display_name.as_str())
    }

    /// Returns the built-in default country set, in table order.
    pub fn default_countries(&self) -> Vec<CountryOption> {
        self.entries
            .iter()
            .map(|e| CountryOption {
                code: e.country.clone(),
                name: e.display_name.clone(),
            })
            .collect()
    }

    /// Returns the countries pricing is enabled for.
    ///
    /// ## Rules
    /// - Empty allow-list → the built-in default set
    /// - Otherwise the allow-list in its own order, duplicates removed
    /// - The store base country is always present (first when missing), so
    ///   base-currency editing is never hidden
    /// - Countries unknown to the table are kept, named by their code
    pub fn supported_countries(
        &self,
        enabled: &[CountryCode],
        base_country: &CountryCode,
    ) -> Vec<CountryOption> {
        let mut options: Vec<CountryOption> = if enabled.is_empty() {
            self.default_countries()
        } else {
            let mut seen = std::collections::BTreeSet::new();
            enabled
                .iter()
                .map(|c| CountryCode::new(c.as_str()))
                .filter(|c| !c.is_empty() && seen.insert(c.clone()))
                .map(|code| CountryOption {
                    name: self.name_of(&code).unwrap_or(code.as_str()).to_string(),
                    code,
                })
                .collect()
        };

        if !base_country.is_empty() && !options.iter().any(|o| &o.code == base_country) {
            options.insert(
                0,
                CountryOption {
                    code: base_country.clone(),
                    name: self
                        .name_of(base_country)
                        .unwrap_or(base_country.as_str())
                        .to_string(),
                },
            );
        }

        options
    }
}

impl Default for CurrencyRegistry {
    fn default() -> Self {
        CurrencyRegistry::builtin()
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

    #[test]
    fn test_lookups_are_case_insensitive() {
        let registry = CurrencyRegistry::builtin();
        assert_eq!(registry.currency_of(&cc("jp")), Some(CurrencyCode::new("JPY")));
        assert_eq!(registry.symbol_of(&cc("gb")).as_deref(), Some("£"));
        assert_eq!(registry.flag_of(&cc("us")).as_deref(), Some("🇺🇸"));
    }

    #[test]
    fn test_unknown_country_is_absent() {
        let registry = CurrencyRegistry::builtin();
        assert!(registry.currency_of(&cc("ZZ")).is_none());
        assert!(registry.symbol_of(&cc("ZZ")).is_none());
        assert!(registry.flag_of(&cc("ZZ")).is_none());
    }

    #[test]
    fn test_eurozone_shares_currency() {
        let registry = CurrencyRegistry::builtin();
        for country in ["DE", "FR", "IT", "ES"] {
            assert_eq!(registry.currency_of(&cc(country)), Some(CurrencyCode::new("EUR")));
        }
    }

    #[test]
    fn test_overrides_take_precedence() {
        let registry = CurrencyRegistry::builtin().with_overrides(
            BTreeMap::from([(cc("CH"), CurrencyCode::new("EUR"))]),
            BTreeMap::from([(cc("CH"), "€".to_string()), (cc("US"), "  ".to_string())]),
        );

        assert_eq!(registry.currency_of(&cc("ch")), Some(CurrencyCode::new("EUR")));
        assert_eq!(registry.symbol_of(&cc("CH")).as_deref(), Some("€"));
        // Blank override is ignored
        assert_eq!(registry.symbol_of(&cc("US")).as_deref(), Some("$"));
    }

    #[test]
    fn test_supported_countries_default_set() {
        let registry = CurrencyRegistry::builtin();
        let options = registry.supported_countries(&[], &cc("US"));
        assert_eq!(options.len(), COUNTRY_TABLE.len());
        assert_eq!(options[0].code, cc("US"));
    }

    #[test]
    fn test_supported_countries_forces_base() {
        let registry = CurrencyRegistry::builtin();
        let options = registry.supported_countries(&[cc("de"), cc("JP"), cc("DE")], &cc("GB"));

        let codes: Vec<&str> = options.iter().map(|o| o.code.as_str()).collect();
        assert_eq!(codes, vec!["GB", "DE", "JP"]);
        assert_eq!(options[1].name, "Germany");
    }

    #[test]
    fn test_supported_countries_keeps_unknown() {
        let registry = CurrencyRegistry::builtin();
        let options = registry.supported_countries(&[cc("XK")], &cc("US"));
        assert!(options.iter().any(|o| o.code == cc("XK") && o.name == "XK"));
    }

    #[test]
    fn test_flag_glyph() {
        assert_eq!(flag_glyph(&cc("DE")).as_deref(), Some("🇩🇪"));
        assert!(flag_glyph(&cc("D1")).is_none());
        assert!(flag_glyph(&cc("USA")).is_none());
    }
}
