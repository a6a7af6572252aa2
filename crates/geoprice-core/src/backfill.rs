//! # Batch Converter
//!
//! Decides which per-currency price fields to write for a product.
//!
//! ## Three-Step Rule (per currency, per regular/sale field)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Admin submitted a value in this save?                               │
//! │        yes ──► max(value, 0)                        Overwrite           │
//! │                                                                         │
//! │  2. Field already stored?                                               │
//! │        yes ──► leave it alone (admin overrides survive every run)       │
//! │                                                                         │
//! │  3. Auto-convert from the base price                IfAbsent            │
//! │        regular ◄── base regular                                         │
//! │        sale    ◄── base sale, else base regular                         │
//! │        source ≤ 0 ──► nothing written                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The plan is pure. Storage executes `IfAbsent` writes as a checked upsert
//! inside the product's transaction: a stored value that parses as an amount
//! is kept, a missing, blank or malformed one is replaced.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::rates::Converter;
use crate::registry::{CountryOption, CurrencyRegistry};
use crate::types::{CurrencyCode, PriceKind, ProductPrices};

/// Products processed per batch page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

// =============================================================================
// Submission
// =============================================================================

/// Per-currency values an admin typed into the product form.
///
/// Blank or unparsable inputs are not recorded, which makes them count as
/// "not submitted" for the three-step rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSubmission {
    fields: BTreeMap<String, Decimal>,
}

impl PriceSubmission {
    pub fn new() -> Self {
        PriceSubmission::default()
    }

    /// Builds a submission from raw form pairs.
    pub fn from_form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut submission = PriceSubmission::new();
        for (key, raw) in pairs {
            submission.insert_raw(key, raw.as_ref());
        }
        submission
    }

    /// Records one raw input. Returns whether it was accepted.
    pub fn insert_raw(&mut self, key: impl Into<String>, raw: &str) -> bool {
        let raw = raw.trim();
        if raw.is_empty() {
            return false;
        }
        match raw.parse::<Decimal>() {
            Ok(amount) => {
                self.fields.insert(key.into(), amount);
                true
            }
            Err(_) => false,
        }
    }

    /// Builder-style setter for an already-parsed value.
    pub fn with(mut self, kind: PriceKind, currency: &CurrencyCode, amount: Decimal) -> Self {
        self.fields.insert(kind.meta_key(currency), amount);
        self
    }

    pub fn get(&self, key: &str) -> Option<Decimal> {
        self.fields.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// =============================================================================
// Plan
// =============================================================================

/// How a planned value must be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Admin value: replace whatever is stored.
    Overwrite,
    /// Auto-converted value: write only when no usable value is stored.
    IfAbsent,
}

/// One field write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWrite {
    pub key: String,
    pub amount: Decimal,
    pub mode: WriteMode,
}

/// Everything to persist for one product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillPlan {
    pub product_id: String,
    pub writes: Vec<FieldWrite>,

    /// Set the product's ready flag (batch runs only).
    pub mark_ready: bool,

    /// Currencies converted without a rate (amount kept in the base currency).
    pub unrated: Vec<CurrencyCode>,
}

impl BackfillPlan {
    /// Checks if the plan touches nothing.
    pub fn is_noop(&self) -> bool {
        self.writes.is_empty() && !self.mark_ready
    }
}

// =============================================================================
// Batch Converter
// =============================================================================

/// Plans per-currency price writes from base prices.
#[derive(Debug, Clone)]
pub struct BatchConverter {
    converter: Converter,
}

impl BatchConverter {
    pub fn new(converter: Converter) -> Self {
        BatchConverter { converter }
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Plans the writes for one product.
    ///
    /// `submission` is `Some` on the admin save path and `None` on the batch
    /// path. A batch run skips products without a positive base regular
    /// price entirely and marks every other product ready.
    pub fn plan(
        &self,
        product: &ProductPrices,
        currencies: &[CurrencyCode],
        submission: Option<&PriceSubmission>,
    ) -> BackfillPlan {
        let mut plan = BackfillPlan {
            product_id: product.product_id.clone(),
            ..BackfillPlan::default()
        };

        let base_regular = product.native.regular.filter(|p| *p > Decimal::ZERO);
        if submission.is_none() && base_regular.is_none() {
            return plan;
        }
        let base_sale = product.native.sale.filter(|p| *p > Decimal::ZERO);
        let base = self.converter.base_currency();

        let mut seen = BTreeSet::new();
        for currency in currencies {
            if currency == base || !seen.insert(currency) {
                continue;
            }

            for kind in PriceKind::ALL {
                let key = kind.meta_key(currency);

                if let Some(posted) = submission.and_then(|s| s.get(&key)) {
                    plan.writes.push(FieldWrite {
                        key,
                        amount: posted.max(Decimal::ZERO),
                        mode: WriteMode::Overwrite,
                    });
                    continue;
                }

                if product.has_field(&key) {
                    continue;
                }

                let source = match kind {
                    PriceKind::Regular => base_regular,
                    PriceKind::Sale => base_sale.or(base_regular),
                };
                let Some(source) = source else {
                    continue;
                };

                if !self.converter.rates().contains(currency) && !plan.unrated.contains(currency) {
                    plan.unrated.push(currency.clone());
                }
                plan.writes.push(FieldWrite {
                    key,
                    amount: self.converter.convert_from_base(source, currency),
                    mode: WriteMode::IfAbsent,
                });
            }
        }

        plan.mark_ready = submission.is_none();
        plan
    }
}

/// Currencies needing per-currency fields: one per supported country,
/// base currency and duplicates removed, first-seen order.
pub fn target_currencies(
    registry: &CurrencyRegistry,
    supported: &[CountryOption],
    base_currency: &CurrencyCode,
) -> Vec<CurrencyCode> {
    let mut seen = BTreeSet::new();
    supported
        .iter()
        .filter_map(|option| registry.currency_of(&option.code))
        .filter(|currency| currency != base_currency && seen.insert(currency.clone()))
        .collect()
}

// =============================================================================
// Field Listing
// =============================================================================

/// One input of the per-product pricing form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceField {
    pub key: String,
    pub label: String,
    pub currency: CurrencyCode,
    pub kind: PriceKind,
}

/// Lists the regular/sale inputs for every supported non-base currency.
///
/// Countries whose symbol is unknown get no inputs. A currency shared by
/// several countries is listed once, with the first country's symbol.
pub fn price_fields(
    registry: &CurrencyRegistry,
    supported: &[CountryOption],
    base_currency: &CurrencyCode,
) -> Vec<PriceField> {
    let mut seen = BTreeSet::new();
    let mut fields = Vec::new();

    for option in supported {
        let Some(currency) = registry.currency_of(&option.code) else {
            continue;
        };
        if &currency == base_currency || seen.contains(&currency) {
            continue;
        }
        let Some(symbol) = registry.symbol_of(&option.code) else {
            continue;
        };
        seen.insert(currency.clone());

        for kind in PriceKind::ALL {
            let label = match kind {
                PriceKind::Regular => format!("Regular price ({})", symbol),
                PriceKind::Sale => format!("Sale price ({})", symbol),
            };
            fields.push(PriceField {
                key: kind.meta_key(&currency),
                label,
                currency: currency.clone(),
                kind,
            });
        }
    }

    fields
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::{RateTable, RoundingPolicy};
    use crate::types::{CountryCode, NativePrices};
    use std::sync::Arc;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn cur(code: &str) -> CurrencyCode {
        CurrencyCode::new(code)
    }

    fn batch() -> BatchConverter {
        BatchConverter::new(Converter::new(
            Arc::new(RateTable::builtin()),
            RoundingPolicy::default(),
            cur("USD"),
        ))
    }

    fn product(regular: Option<&str>, sale: Option<&str>) -> ProductPrices {
        ProductPrices::new("p1", NativePrices::new(regular.map(d), sale.map(d)))
    }

    fn write<'a>(plan: &'a BackfillPlan, key: &str) -> Option<&'a FieldWrite> {
        plan.writes.iter().find(|w| w.key == key)
    }

    #[test]
    fn test_batch_fills_missing_fields() {
        let plan = batch().plan(
            &product(Some("100"), Some("80")),
            &[cur("USD"), cur("EUR"), cur("JPY")],
            None,
        );

        assert!(plan.mark_ready);
        assert_eq!(plan.writes.len(), 4);
        assert_eq!(write(&plan, "regular_price_EUR").unwrap().amount, d("91.00"));
        assert_eq!(write(&plan, "sale_price_EUR").unwrap().amount, d("72.80"));
        assert_eq!(write(&plan, "regular_price_JPY").unwrap().amount, d("14800"));
        assert!(write(&plan, "regular_price_USD").is_none());
        assert!(plan.writes.iter().all(|w| w.mode == WriteMode::IfAbsent));
    }

    #[test]
    fn test_sale_falls_back_to_regular() {
        let plan = batch().plan(&product(Some("100"), None), &[cur("EUR")], None);
        assert_eq!(write(&plan, "sale_price_EUR").unwrap().amount, d("91.00"));
    }

    #[test]
    fn test_existing_values_untouched() {
        let p = product(Some("100"), None).with_price(PriceKind::Regular, &cur("EUR"), d("50"));
        let plan = batch().plan(&p, &[cur("EUR")], None);
        assert!(write(&plan, "regular_price_EUR").is_none());
        assert!(write(&plan, "sale_price_EUR").is_some());
    }

    #[test]
    fn test_second_run_writes_nothing() {
        let b = batch();
        let mut p = product(Some("100"), Some("90"));
        let first = b.plan(&p, &[cur("EUR"), cur("GBP")], None);
        for w in &first.writes {
            p.meta.insert(w.key.clone(), w.amount);
        }

        let second = b.plan(&p, &[cur("EUR"), cur("GBP")], None);
        assert!(second.writes.is_empty());
        assert!(second.mark_ready);
    }

    #[test]
    fn test_batch_skips_products_without_base_price() {
        for p in [product(None, Some("5")), product(Some("0"), None)] {
            let plan = batch().plan(&p, &[cur("EUR")], None);
            assert!(plan.is_noop());
        }
    }

    #[test]
    fn test_admin_submission_overrides() {
        let p = product(Some("100"), None).with_price(PriceKind::Regular, &cur("EUR"), d("91.00"));
        let submission = PriceSubmission::new().with(PriceKind::Regular, &cur("EUR"), d("79.99"));

        let plan = batch().plan(&p, &[cur("EUR")], Some(&submission));
        let w = write(&plan, "regular_price_EUR").unwrap();
        assert_eq!(w.amount, d("79.99"));
        assert_eq!(w.mode, WriteMode::Overwrite);
        assert!(!plan.mark_ready);
    }

    #[test]
    fn test_admin_negative_clamped() {
        let submission = PriceSubmission::from_form([("sale_price_EUR", "-3")]);
        let plan = batch().plan(&product(Some("100"), None), &[cur("EUR")], Some(&submission));
        assert_eq!(write(&plan, "sale_price_EUR").unwrap().amount, Decimal::ZERO);
    }

    #[test]
    fn test_admin_submission_without_base_price() {
        let submission = PriceSubmission::from_form([("regular_price_EUR", "12")]);
        let plan = batch().plan(&product(None, None), &[cur("EUR")], Some(&submission));
        assert_eq!(plan.writes.len(), 1);
        assert_eq!(plan.writes[0].amount, d("12"));
    }

    #[test]
    fn test_blank_and_garbage_not_submitted() {
        let submission = PriceSubmission::from_form([
            ("regular_price_EUR", "  "),
            ("sale_price_EUR", "abc"),
        ]);
        assert!(submission.is_empty());
    }

    #[test]
    fn test_unrated_currency_reported() {
        let plan = batch().plan(&product(Some("10"), None), &[cur("AFN")], None);
        assert_eq!(plan.unrated, vec![cur("AFN")]);
        assert_eq!(write(&plan, "regular_price_AFN").unwrap().amount, d("10.00"));
    }

    #[test]
    fn test_target_currencies_dedup() {
        let registry = CurrencyRegistry::builtin();
        let supported = registry.supported_countries(
            &[CountryCode::new("DE"), CountryCode::new("FR"), CountryCode::new("JP")],
            &CountryCode::new("US"),
        );
        let currencies = target_currencies(&registry, &supported, &cur("USD"));
        assert_eq!(currencies, vec![cur("EUR"), cur("JPY")]);
    }

    #[test]
    fn test_price_fields_labels() {
        let registry = CurrencyRegistry::builtin();
        let supported = registry.supported_countries(
            &[CountryCode::new("DE"), CountryCode::new("FR"), CountryCode::new("ZZ")],
            &CountryCode::new("US"),
        );
        let fields = price_fields(&registry, &supported, &cur("USD"));

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].key, "regular_price_EUR");
        assert_eq!(fields[0].label, "Regular price (€)");
        assert_eq!(fields[1].label, "Sale price (€)");
    }
}
