use crate::schema::{names, LineItemSet, Period, RatioUnit, RatioValue};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One side of a ratio, resolved against a [`LineItemSet`] for a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Item(String),
    Difference(Box<Term>, Box<Term>),
    /// The first alternative that resolves.
    FirstOf(Vec<Term>),
}

impl Term {
    pub fn item(name: &str) -> Self {
        Term::Item(name.to_string())
    }

    pub fn difference(minuend: Term, subtrahend: Term) -> Self {
        Term::Difference(Box::new(minuend), Box::new(subtrahend))
    }

    pub fn resolve(&self, items: &LineItemSet, period: Period) -> Option<f64> {
        match self {
            Term::Item(name) => items.value_for(name, period),
            Term::Difference(a, b) => Some(a.resolve(items, period)? - b.resolve(items, period)?),
            Term::FirstOf(alternatives) => alternatives
                .iter()
                .find_map(|term| term.resolve(items, period)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatioDefinition {
    pub name: String,
    pub numerator: Term,
    pub denominator: Term,
    pub unit: RatioUnit,
}

impl RatioDefinition {
    pub fn new(name: &str, numerator: Term, denominator: Term, unit: RatioUnit) -> Self {
        Self {
            name: name.to_string(),
            numerator,
            denominator,
            unit,
        }
    }
}

/// Ordered, immutable set of ratio definitions. Output follows declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatioCatalog {
    definitions: Vec<RatioDefinition>,
}

impl RatioCatalog {
    pub fn from_definitions(definitions: Vec<RatioDefinition>) -> Self {
        Self { definitions }
    }

    pub fn standard() -> Self {
        let equity = || {
            Term::FirstOf(vec![
                Term::item(names::TOTAL_EQUITY),
                Term::difference(
                    Term::item(names::TOTAL_ASSETS),
                    Term::item(names::TOTAL_LIABILITIES),
                ),
            ])
        };

        Self::from_definitions(vec![
            RatioDefinition::new(
                "Return on Capital Employed",
                Term::item(names::OPERATING_INCOME),
                Term::difference(
                    Term::item(names::TOTAL_ASSETS),
                    Term::item(names::CURRENT_LIABILITIES),
                ),
                RatioUnit::Percent,
            ),
            RatioDefinition::new(
                "Gross Profit Margin",
                Term::FirstOf(vec![
                    Term::item(names::GROSS_PROFIT),
                    Term::difference(Term::item(names::REVENUE), Term::item(names::COGS)),
                ]),
                Term::item(names::REVENUE),
                RatioUnit::Percent,
            ),
            RatioDefinition::new(
                "Net Profit Margin",
                Term::item(names::NET_INCOME),
                Term::item(names::REVENUE),
                RatioUnit::Percent,
            ),
            RatioDefinition::new(
                "Debt-to-Equity",
                Term::item(names::TOTAL_LIABILITIES),
                equity(),
                RatioUnit::Times,
            ),
            RatioDefinition::new(
                "Current Ratio",
                Term::item(names::CURRENT_ASSETS),
                Term::item(names::CURRENT_LIABILITIES),
                RatioUnit::Times,
            ),
            RatioDefinition::new(
                "Quick Ratio",
                Term::difference(
                    Term::item(names::CURRENT_ASSETS),
                    Term::item(names::INVENTORY),
                ),
                Term::item(names::CURRENT_LIABILITIES),
                RatioUnit::Times,
            ),
            RatioDefinition::new(
                "Asset Turnover",
                Term::item(names::REVENUE),
                Term::item(names::TOTAL_ASSETS),
                RatioUnit::Times,
            ),
            RatioDefinition::new(
                "Return on Assets",
                Term::item(names::NET_INCOME),
                Term::item(names::TOTAL_ASSETS),
                RatioUnit::Percent,
            ),
            RatioDefinition::new(
                "Equity Ratio",
                equity(),
                Term::item(names::TOTAL_ASSETS),
                RatioUnit::Percent,
            ),
        ])
    }

    pub fn definitions(&self) -> &[RatioDefinition] {
        &self.definitions
    }
}

pub struct RatioEngine<'a> {
    catalog: &'a RatioCatalog,
}

impl<'a> RatioEngine<'a> {
    pub fn new(catalog: &'a RatioCatalog) -> Self {
        Self { catalog }
    }

    /// Computes every ratio whose components resolve for `period`.
    ///
    /// A zero denominator is replaced by 1.0 and reported through
    /// [`RatioValue::denominator_substituted`]; ratios with missing components
    /// are left out.
    pub fn compute(&self, items: &LineItemSet, period: Period) -> Vec<RatioValue> {
        let mut results = Vec::with_capacity(self.catalog.definitions.len());

        for definition in &self.catalog.definitions {
            let (Some(numerator), Some(denominator)) = (
                definition.numerator.resolve(items, period),
                definition.denominator.resolve(items, period),
            ) else {
                debug!("Skipping {}: missing components", definition.name);
                continue;
            };

            let substituted = denominator.abs() < f64::EPSILON;
            let denominator = if substituted {
                debug!("{}: zero denominator replaced with 1.0", definition.name);
                1.0
            } else {
                denominator
            };

            let raw = numerator / denominator;
            let value = match definition.unit {
                RatioUnit::Percent => raw * 100.0,
                RatioUnit::Times => raw,
            };

            results.push(RatioValue {
                name: definition.name.clone(),
                value,
                unit: definition.unit,
                denominator_substituted: substituted,
            });
        }

        results
    }
}
