use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical line-item names shared by extraction, ratios and guidance.
pub mod names {
    pub const REVENUE: &str = "Revenue";
    pub const COGS: &str = "COGS";
    pub const GROSS_PROFIT: &str = "Gross Profit";
    pub const OPERATING_INCOME: &str = "Operating Income";
    pub const NET_INCOME: &str = "Net Income";
    pub const TOTAL_ASSETS: &str = "Total Assets";
    pub const TOTAL_LIABILITIES: &str = "Total Liabilities";
    pub const TOTAL_EQUITY: &str = "Total Equity";
    pub const CURRENT_ASSETS: &str = "Current Assets";
    pub const CURRENT_LIABILITIES: &str = "Current Liabilities";
    pub const INVENTORY: &str = "Inventory";
    pub const CASH: &str = "Cash";
    pub const RECEIVABLES: &str = "Trade Receivables";
    pub const OPERATING_EXPENSES: &str = "Operating Expenses";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[schemars(description = "The comparative (earlier) period, e.g. 2024")]
    Prior,
    #[schemars(description = "The reporting (later) period, e.g. 2025")]
    Current,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Prior => write!(f, "prior"),
            Period::Current => write!(f, "current"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineItem {
    #[schemars(description = "Canonical name used as the key for ratios and guidance lookups")]
    pub name: String,

    #[schemars(description = "The label as it appeared in the input text, cleaned for display")]
    pub label: String,

    pub value: f64,

    #[schemars(
        description = "Period tag for dual-year extraction. Absent for single-period values, which stand in for any requested period."
    )]
    pub period: Option<Period>,
}

impl LineItem {
    pub fn new(name: impl Into<String>, value: f64, period: Option<Period>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            value,
            period,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    #[schemars(description = "Labels followed by prior-year and current-year values")]
    DualYear,
    #[schemars(description = "Known line-item keywords followed by a nearby number")]
    Keyword,
    #[schemars(
        description = "Bare numbers assigned to a fixed template by position. Low confidence."
    )]
    Positional,
    #[schemars(description = "Nothing recognizable was found")]
    None,
}

/// The line items of one analysis run, in the order they were first seen.
///
/// At most one value is kept per `(name, period)` pair; later duplicates are
/// rejected by [`LineItemSet::insert`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineItemSet {
    items: Vec<LineItem>,
    method: ExtractionMethod,
    low_confidence: bool,
}

impl Default for LineItemSet {
    fn default() -> Self {
        Self::new(ExtractionMethod::None)
    }
}

impl LineItemSet {
    pub fn new(method: ExtractionMethod) -> Self {
        Self {
            items: Vec::new(),
            method,
            low_confidence: method == ExtractionMethod::Positional,
        }
    }

    /// Returns `false` and leaves the set untouched when the `(name, period)`
    /// pair is already present.
    pub fn insert(&mut self, item: LineItem) -> bool {
        if self.get(&item.name, item.period).is_some() {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Exact lookup on `(name, period)`.
    pub fn get(&self, name: &str, period: Option<Period>) -> Option<&LineItem> {
        self.items
            .iter()
            .find(|item| item.name == name && item.period == period)
    }

    /// Resolves the value of `name` for `period`: an exactly tagged value
    /// wins, otherwise an untagged single-period value is used.
    pub fn value_for(&self, name: &str, period: Period) -> Option<f64> {
        self.get(name, Some(period))
            .or_else(|| self.get(name, None))
            .map(|item| item.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|item| item.name == name)
    }

    /// Distinct names in first-seen order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for item in &self.items {
            if !names.contains(&item.name.as_str()) {
                names.push(&item.name);
            }
        }
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn method(&self) -> ExtractionMethod {
        self.method
    }

    pub fn is_low_confidence(&self) -> bool {
        self.low_confidence
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Guidance {
    #[schemars(description = "The item is covered by the guidance catalog")]
    Mapped {
        standards: Vec<String>,
        note: String,
    },
    #[schemars(
        description = "The item is not in the catalog but moved beyond the significance threshold"
    )]
    ManualReview { note: String },
}

impl Guidance {
    pub fn note(&self) -> &str {
        match self {
            Guidance::Mapped { note, .. } => note,
            Guidance::ManualReview { note } => note,
        }
    }

    pub fn standards(&self) -> &[String] {
        match self {
            Guidance::Mapped { standards, .. } => standards,
            Guidance::ManualReview { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VarianceResult {
    pub item: String,
    pub label: String,
    pub prior: f64,
    pub current: f64,

    #[schemars(
        description = "Signed percentage change from prior to current. Defined as 0 when the prior value is 0."
    )]
    pub percent_change: f64,

    #[schemars(description = "True when the absolute percent change exceeds the threshold")]
    pub significant: bool,

    pub guidance: Option<Guidance>,

    #[schemars(description = "Attached only to significant movements")]
    pub investigation_note: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RatioUnit {
    #[schemars(description = "Expressed as a percentage (multiplied by 100)")]
    Percent,
    #[schemars(description = "Expressed as a plain multiple")]
    Times,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatioValue {
    pub name: String,
    pub value: f64,
    pub unit: RatioUnit,

    #[schemars(
        description = "True when the denominator resolved to zero and 1.0 was used instead. The value is an approximation."
    )]
    pub denominator_substituted: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyLabel {
    Normal,
    Anomalous,
}

impl fmt::Display for AnomalyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyLabel::Normal => write!(f, "Normal"),
            AnomalyLabel::Anomalous => write!(f, "Anomalous"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransactionRow {
    #[schemars(description = "Zero-based position of the row among the scored rows")]
    pub index: usize,
    pub features: Vec<f64>,

    #[schemars(description = "Isolation score in (0, 1]. Higher means easier to isolate.")]
    pub score: f64,
    pub label: AnomalyLabel,

    #[schemars(description = "Base64 fingerprint of the row's full input record, or of its feature values when scored without one")]
    pub encoded: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_rejects_duplicate_name_and_period() {
        let mut set = LineItemSet::new(ExtractionMethod::Keyword);
        assert!(set.insert(LineItem::new(names::REVENUE, 100.0, None)));
        assert!(!set.insert(LineItem::new(names::REVENUE, 200.0, None)));
        assert!(set.insert(LineItem::new(names::REVENUE, 300.0, Some(Period::Prior))));

        assert_eq!(set.len(), 2);
        assert_eq!(set.get(names::REVENUE, None).unwrap().value, 100.0);
    }

    #[test]
    fn test_value_for_prefers_tagged_value() {
        let mut set = LineItemSet::new(ExtractionMethod::DualYear);
        set.insert(LineItem::new("Cash", 10.0, None));
        set.insert(LineItem::new("Cash", 20.0, Some(Period::Current)));

        assert_eq!(set.value_for("Cash", Period::Current), Some(20.0));
        assert_eq!(set.value_for("Cash", Period::Prior), Some(10.0));
        assert_eq!(set.value_for("Inventory", Period::Current), None);
    }

    #[test]
    fn test_names_keep_first_seen_order() {
        let mut set = LineItemSet::new(ExtractionMethod::DualYear);
        set.insert(LineItem::new("B", 1.0, Some(Period::Prior)));
        set.insert(LineItem::new("A", 1.0, Some(Period::Prior)));
        set.insert(LineItem::new("B", 2.0, Some(Period::Current)));

        assert_eq!(set.names(), vec!["B", "A"]);
    }

    #[test]
    fn test_positional_sets_are_low_confidence() {
        assert!(LineItemSet::new(ExtractionMethod::Positional).is_low_confidence());
        assert!(!LineItemSet::new(ExtractionMethod::Keyword).is_low_confidence());
        assert!(LineItemSet::default().is_empty());
    }
}
