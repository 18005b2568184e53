use crate::anomaly::AnomalyScores;
use crate::narrative::NarrativeEntry;
use crate::schema::{
    AnomalyLabel, ExtractionMethod, LineItemSet, RatioUnit, RatioValue, VarianceResult,
};
use crate::transactions::SkippedRow;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionSummary {
    pub method: ExtractionMethod,

    #[schemars(
        description = "Set when values were assigned by position only; treat ratios with caution"
    )]
    pub low_confidence: bool,

    pub line_items: LineItemSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GuidanceNote {
    pub item: String,
    pub standards: Vec<String>,
    pub note: String,
    pub significant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnomalySection {
    pub columns: Vec<String>,
    pub scores: AnomalyScores,
    #[schemars(description = "Input rows left out of scoring because of missing or non-numeric features")]
    pub skipped: Vec<SkippedRow>,
}

/// Everything handed to the presentation layer, sections in fixed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisReport {
    pub extraction: ExtractionSummary,
    pub variances: Vec<VarianceResult>,
    pub ratios: Vec<RatioValue>,
    pub guidance: Vec<GuidanceNote>,
    pub anomalies: Option<AnomalySection>,
    pub narratives: Vec<NarrativeEntry>,
}

/// Assembles stage outputs without further computation.
pub fn build_report(
    line_items: LineItemSet,
    variances: Vec<VarianceResult>,
    ratios: Vec<RatioValue>,
    anomalies: Option<AnomalySection>,
    narratives: Vec<NarrativeEntry>,
) -> AnalysisReport {
    let guidance = variances
        .iter()
        .filter_map(|v| {
            v.guidance.as_ref().map(|g| GuidanceNote {
                item: v.item.clone(),
                standards: g.standards().to_vec(),
                note: g.note().to_string(),
                significant: v.significant,
            })
        })
        .collect();

    AnalysisReport {
        extraction: ExtractionSummary {
            method: line_items.method(),
            low_confidence: line_items.is_low_confidence(),
            line_items,
        },
        variances,
        ratios,
        guidance,
        anomalies,
        narratives,
    }
}

impl AnalysisReport {
    pub fn is_empty(&self) -> bool {
        self.variances.is_empty()
            && self.ratios.is_empty()
            && self.guidance.is_empty()
            && self.anomalies.is_none()
            && self.narratives.is_empty()
    }

    pub fn significant_variances(&self) -> impl Iterator<Item = &VarianceResult> {
        self.variances.iter().filter(|v| v.significant)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalysisReport)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str("# Financial Analysis Report\n\n");

        if self.extraction.low_confidence {
            output.push_str(
                "> **Low confidence:** values were assigned to line items by position only.\n\n",
            );
        }

        output.push_str("## Variance Findings\n\n");
        if self.variances.is_empty() {
            output.push_str("_No two-period items found._\n\n");
        } else {
            output.push_str("| Item | Prior | Current | Change | Significant |\n");
            output.push_str("|---|---:|---:|---:|:---:|\n");
            for v in &self.variances {
                output.push_str(&format!(
                    "| {} | {:.2} | {:.2} | {:+.2}% | {} |\n",
                    v.label,
                    v.prior,
                    v.current,
                    v.percent_change,
                    if v.significant { "⚠️" } else { "" }
                ));
            }
            output.push('\n');
        }

        output.push_str("## Ratios\n\n");
        if self.ratios.is_empty() {
            output.push_str("_Not enough line items to compute ratios._\n\n");
        } else {
            for r in &self.ratios {
                let unit = match r.unit {
                    RatioUnit::Percent => "%",
                    RatioUnit::Times => "x",
                };
                let marker = if r.denominator_substituted {
                    " (zero denominator, approximated)"
                } else {
                    ""
                };
                output.push_str(&format!("- {}: {:.2}{}{}\n", r.name, r.value, unit, marker));
            }
            output.push('\n');
        }

        output.push_str("## Guidance Notes\n\n");
        if self.guidance.is_empty() {
            output.push_str("_No guidance applies._\n\n");
        } else {
            for g in &self.guidance {
                if g.standards.is_empty() {
                    output.push_str(&format!("- **{}**: {}\n", g.item, g.note));
                } else {
                    output.push_str(&format!(
                        "- **{}** ({}): {}\n",
                        g.item,
                        g.standards.join(", "),
                        g.note
                    ));
                }
            }
            output.push('\n');
        }

        if let Some(section) = &self.anomalies {
            output.push_str("## Anomaly Flags\n\n");
            output.push_str(&format!(
                "{} of {} rows flagged (contamination {}, seed {}).\n\n",
                section.scores.anomalous_count,
                section.scores.rows.len(),
                section.scores.contamination,
                section.scores.seed
            ));
            for row in section
                .scores
                .rows
                .iter()
                .filter(|r| r.label == AnomalyLabel::Anomalous)
            {
                output.push_str(&format!(
                    "- Row {}: score {:.3} `{}`\n",
                    row.index, row.score, row.encoded
                ));
            }
            if !section.skipped.is_empty() {
                output.push_str(&format!(
                    "\n{} rows excluded from scoring.\n",
                    section.skipped.len()
                ));
            }
            output.push('\n');
        }

        if !self.narratives.is_empty() {
            output.push_str("## Commentary\n\n");
            for n in &self.narratives {
                output.push_str(&format!("- **{}**: {}\n", n.item, n.outcome.advisory_text()));
            }
            output.push('\n');
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Guidance, LineItem, Period};

    fn variance(item: &str, significant: bool, guidance: Option<Guidance>) -> VarianceResult {
        VarianceResult {
            item: item.to_string(),
            label: item.to_string(),
            prior: 100.0,
            current: if significant { 150.0 } else { 101.0 },
            percent_change: if significant { 50.0 } else { 1.0 },
            significant,
            guidance,
            investigation_note: None,
        }
    }

    #[test]
    fn test_empty_inputs_give_empty_report() {
        let report = build_report(LineItemSet::default(), vec![], vec![], None, vec![]);

        assert!(report.is_empty());
        assert_eq!(report.extraction.method, ExtractionMethod::None);
        assert!(report.to_markdown().contains("## Variance Findings"));
    }

    #[test]
    fn test_guidance_notes_follow_variances() {
        let variances = vec![
            variance(
                "Goodwill",
                false,
                Some(Guidance::Mapped {
                    standards: vec!["IFRS 3".to_string()],
                    note: "impairment".to_string(),
                }),
            ),
            variance("Other", false, None),
            variance(
                "Marketing Spend",
                true,
                Some(Guidance::ManualReview {
                    note: "manual".to_string(),
                }),
            ),
        ];

        let report = build_report(LineItemSet::default(), variances, vec![], None, vec![]);

        let items: Vec<&str> = report.guidance.iter().map(|g| g.item.as_str()).collect();
        assert_eq!(items, vec!["Goodwill", "Marketing Spend"]);
        assert!(report.guidance[1].standards.is_empty());
        assert_eq!(report.significant_variances().count(), 1);
    }

    #[test]
    fn test_low_confidence_is_surfaced() {
        let mut items = LineItemSet::new(ExtractionMethod::Positional);
        items.insert(LineItem::new("Revenue", 1.0, None));
        let report = build_report(items, vec![], vec![], None, vec![]);

        assert!(report.extraction.low_confidence);
        assert!(report.to_markdown().contains("Low confidence"));
    }

    #[test]
    fn test_json_and_schema() {
        let mut items = LineItemSet::new(ExtractionMethod::DualYear);
        items.insert(LineItem::new("Cash", 1.0, Some(Period::Prior)));
        let report = build_report(items, vec![], vec![], None, vec![]);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"method\": \"dual_year\""));

        let schema = AnalysisReport::schema_as_json().unwrap();
        assert!(schema.contains("variances"));
        assert!(schema.contains("narratives"));
    }
}
