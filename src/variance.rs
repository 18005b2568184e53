use crate::guidance::GuidanceCatalog;
use crate::schema::{Guidance, LineItemSet, Period, VarianceResult};
use crate::utils::percent_change;
use log::debug;

/// Absolute percent change above which a movement is significant.
/// Exactly 3% is not significant.
pub const SIGNIFICANCE_THRESHOLD_PCT: f64 = 3.0;

pub const INVESTIGATION_NOTE: &str = "Further investigation advised.";

pub const MANUAL_REVIEW_NOTE: &str =
    "Unmapped item: no catalogued standard applies, manual review required.";

pub fn is_significant(percent_change: f64) -> bool {
    percent_change.abs() > SIGNIFICANCE_THRESHOLD_PCT
}

pub struct VarianceAnalyzer<'a> {
    guidance: &'a GuidanceCatalog,
}

impl<'a> VarianceAnalyzer<'a> {
    pub fn new(guidance: &'a GuidanceCatalog) -> Self {
        Self { guidance }
    }

    /// One result per item holding both a prior and a current value, in the
    /// order the items were first extracted.
    pub fn analyze(&self, items: &LineItemSet) -> Vec<VarianceResult> {
        let mut results = Vec::new();

        for name in items.names() {
            let (Some(prior_item), Some(current_item)) = (
                items.get(name, Some(Period::Prior)),
                items.get(name, Some(Period::Current)),
            ) else {
                continue;
            };

            let (prior, current) = (prior_item.value, current_item.value);
            let change = percent_change(prior, current);
            let significant = is_significant(change);
            if prior == 0.0 {
                debug!("{}: prior value is zero, change reported as 0", name);
            }

            results.push(VarianceResult {
                item: name.to_string(),
                label: current_item.label.clone(),
                prior,
                current,
                percent_change: change,
                significant,
                guidance: self.guidance_for(name, significant),
                investigation_note: significant.then(|| INVESTIGATION_NOTE.to_string()),
            });
        }

        results
    }

    fn guidance_for(&self, name: &str, significant: bool) -> Option<Guidance> {
        let entry = self
            .guidance
            .canonical_name(name)
            .and_then(|canonical| self.guidance.lookup(canonical));

        match entry {
            Some(entry) => Some(Guidance::Mapped {
                standards: entry.standards.clone(),
                note: entry.note.clone(),
            }),
            None if significant => Some(Guidance::ManualReview {
                note: MANUAL_REVIEW_NOTE.to_string(),
            }),
            None => None,
        }
    }
}
