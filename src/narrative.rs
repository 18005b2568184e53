//! Result types for the optional narrative-commentary collaborator.
//!
//! The numeric pipeline never depends on these: a failed or disabled
//! narrative call becomes an advisory entry in its own report section.

use crate::schema::VarianceResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NarrativeFailure {
    TimedOut { after_secs: u64 },
    Transport { message: String },
    Status { code: u16 },
    Malformed { message: String },
    Disabled,
}

impl fmt::Display for NarrativeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NarrativeFailure::TimedOut { after_secs } => {
                write!(f, "no response within {}s", after_secs)
            }
            NarrativeFailure::Transport { message } => write!(f, "transport error: {}", message),
            NarrativeFailure::Status { code } => write!(f, "service returned status {}", code),
            NarrativeFailure::Malformed { message } => {
                write!(f, "unreadable response: {}", message)
            }
            NarrativeFailure::Disabled => write!(f, "narrative generation is disabled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NarrativeOutcome {
    Generated { text: String },
    Unavailable { failure: NarrativeFailure },
}

impl NarrativeOutcome {
    pub fn unavailable(failure: NarrativeFailure) -> Self {
        NarrativeOutcome::Unavailable { failure }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, NarrativeOutcome::Generated { .. })
    }

    /// Prose to show the analyst; a "service unavailable" advisory on failure.
    pub fn advisory_text(&self) -> String {
        match self {
            NarrativeOutcome::Generated { text } => text.clone(),
            NarrativeOutcome::Unavailable { failure } => {
                format!("Narrative service unavailable ({}).", failure)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrativeEntry {
    pub item: String,
    pub outcome: NarrativeOutcome,
}

/// Free-text request describing one changed item.
pub fn narrative_prompt(variance: &VarianceResult) -> String {
    let direction = if variance.current >= variance.prior {
        "increased"
    } else {
        "decreased"
    };
    let mut prompt = format!(
        "As a financial reviewer, briefly explain possible reasons why '{}' {} from {:.2} to {:.2} ({:+.2}%) and what should be checked.",
        variance.label, direction, variance.prior, variance.current, variance.percent_change
    );
    if let Some(guidance) = &variance.guidance {
        if !guidance.standards().is_empty() {
            prompt.push_str(&format!(
                " Relevant standards: {}.",
                guidance.standards().join(", ")
            ));
        }
    }
    prompt
}

/// Placeholder entries for significant items when no narrative service is configured.
pub fn disabled_narratives(variances: &[VarianceResult]) -> Vec<NarrativeEntry> {
    variances
        .iter()
        .filter(|v| v.significant)
        .map(|v| NarrativeEntry {
            item: v.item.clone(),
            outcome: NarrativeOutcome::unavailable(NarrativeFailure::Disabled),
        })
        .collect()
}
