use crate::schema::names;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GuidanceEntry {
    #[schemars(description = "Accounting standard codes, e.g. 'IAS 40'")]
    pub standards: Vec<String>,
    #[schemars(description = "What a reviewer should look at when the item moves")]
    pub note: String,
}

/// Read-only mapping from canonical line-item names to applicable standards.
///
/// Built once and shared by reference. [`GuidanceCatalog::lookup`] is
/// case-sensitive; use [`GuidanceCatalog::canonical_name`] to resolve a label
/// typed in arbitrary case first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GuidanceCatalog {
    entries: BTreeMap<String, GuidanceEntry>,
}

impl GuidanceCatalog {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, GuidanceEntry)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, entry)| (name.into(), entry))
                .collect(),
        }
    }

    pub fn standard() -> Self {
        let table: &[(&str, &[&str], &str)] = &[
            (
                "Investment Property",
                &["IAS 40", "IFRS 13"],
                "Confirm the measurement model, valuation inputs and any transfers to or from investment property.",
            ),
            (
                names::REVENUE,
                &["IFRS 15"],
                "Review contract terms, performance obligations and cut-off around the period end.",
            ),
            (
                names::COGS,
                &["IAS 2"],
                "Reconcile cost of sales to inventory movements and check cost formulas applied.",
            ),
            (
                names::INVENTORY,
                &["IAS 2"],
                "Check net realisable value write-downs and count reconciliations.",
            ),
            (
                names::RECEIVABLES,
                &["IFRS 9", "IFRS 7"],
                "Review expected credit loss provisioning and ageing of balances.",
            ),
            (
                names::CASH,
                &["IAS 7"],
                "Agree balances to bank confirmations and review restricted cash disclosures.",
            ),
            (
                "Property, Plant and Equipment",
                &["IAS 16", "IAS 36"],
                "Review additions, disposals, depreciation policy and impairment indicators.",
            ),
            (
                "Intangible Assets",
                &["IAS 38", "IAS 36"],
                "Check capitalisation criteria, useful lives and impairment testing.",
            ),
            (
                "Goodwill",
                &["IFRS 3", "IAS 36"],
                "Review the annual impairment test and cash-generating unit allocation.",
            ),
            (
                "Lease Liabilities",
                &["IFRS 16"],
                "Check lease modifications, discount rates and remeasurement events.",
            ),
            (
                "Right-of-use Assets",
                &["IFRS 16"],
                "Check lease commencements, terminations and depreciation of right-of-use assets.",
            ),
            (
                "Provisions",
                &["IAS 37"],
                "Assess recognition criteria and the basis for estimates of outflows.",
            ),
            (
                "Borrowings",
                &["IFRS 9", "IFRS 7"],
                "Review covenant compliance, classification and effective interest calculations.",
            ),
            (
                "Deferred Tax",
                &["IAS 12"],
                "Review recoverability of deferred tax assets and rate changes.",
            ),
            (
                "Income Tax",
                &["IAS 12"],
                "Reconcile the effective tax rate and uncertain tax positions.",
            ),
            (
                "Employee Benefits",
                &["IAS 19"],
                "Review actuarial assumptions and plan amendments.",
            ),
            (
                "Biological Assets",
                &["IAS 41"],
                "Review fair value less costs to sell and the valuation inputs used.",
            ),
            (
                "Share-based Payment",
                &["IFRS 2"],
                "Check grant-date fair values and vesting assumptions.",
            ),
            (
                names::OPERATING_EXPENSES,
                &["IAS 1"],
                "Analyse by nature or function and investigate unusual items.",
            ),
            (
                names::NET_INCOME,
                &["IAS 1", "IAS 33"],
                "Reconcile the movement to underlying revenue and cost drivers.",
            ),
            (
                names::TOTAL_EQUITY,
                &["IAS 1", "IAS 32"],
                "Review share issues, buy-backs, dividends and reserve movements.",
            ),
        ];

        Self::from_entries(table.iter().map(|(name, standards, note)| {
            (
                *name,
                GuidanceEntry {
                    standards: standards.iter().map(|s| s.to_string()).collect(),
                    note: note.to_string(),
                },
            )
        }))
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, name: &str) -> Option<&GuidanceEntry> {
        self.entries.get(name)
    }

    /// Resolves `label` to the catalog's own spelling, ignoring case and
    /// surrounding whitespace.
    pub fn canonical_name(&self, label: &str) -> Option<&str> {
        let wanted = label.trim();
        self.entries
            .keys()
            .find(|key| key.eq_ignore_ascii_case(wanted))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_sensitive() {
        let catalog = GuidanceCatalog::standard();

        let entry = catalog.lookup("Investment Property").unwrap();
        assert_eq!(entry.standards, vec!["IAS 40", "IFRS 13"]);
        assert!(catalog.lookup("investment property").is_none());
    }

    #[test]
    fn test_canonical_name_ignores_case() {
        let catalog = GuidanceCatalog::standard();

        assert_eq!(
            catalog.canonical_name("  INVESTMENT property "),
            Some("Investment Property")
        );
        assert_eq!(catalog.canonical_name("Marketing Spend"), None);
    }

    #[test]
    fn test_injected_catalog() {
        let catalog = GuidanceCatalog::from_entries([(
            "Crypto Assets",
            GuidanceEntry {
                standards: vec!["IAS 38".to_string()],
                note: "Check classification.".to_string(),
            },
        )]);

        assert_eq!(catalog.len(), 1);
        assert!(catalog.lookup("Crypto Assets").is_some());
        assert!(catalog.lookup(names::REVENUE).is_none());
    }

    #[test]
    fn test_standard_catalog_covers_core_items() {
        let catalog = GuidanceCatalog::standard();
        for name in [names::REVENUE, names::COGS, names::INVENTORY, names::CASH] {
            assert!(catalog.lookup(name).is_some(), "missing {}", name);
        }
    }
}
