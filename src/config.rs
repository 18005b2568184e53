use crate::error::{FinDetectError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Expected outlier share when the caller has no better estimate.
pub const DEFAULT_CONTAMINATION: f64 = 0.1;

/// Conventional fixed seed for reproducible scoring runs.
pub const DEFAULT_SEED: u64 = 42;

pub const DEFAULT_ESTIMATORS: usize = 100;
pub const DEFAULT_MAX_SAMPLES: usize = 256;
pub const DEFAULT_KEYWORD_WINDOW: usize = 100;
pub const DEFAULT_NARRATIVE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionConfig {
    #[serde(default = "default_prior_year")]
    #[schemars(description = "Year marker that tags the prior-period value in dual-year text")]
    pub prior_year: u16,

    #[serde(default = "default_current_year")]
    #[schemars(description = "Year marker that tags the current-period value in dual-year text")]
    pub current_year: u16,

    #[serde(default = "default_keyword_window")]
    #[schemars(
        description = "How many characters after a keyword are searched for its value"
    )]
    pub keyword_window: usize,

    #[serde(default = "default_min_structured_matches")]
    #[schemars(
        description = "Keyword matches below this count trigger the positional fallback"
    )]
    pub min_structured_matches: usize,
}

fn default_prior_year() -> u16 {
    2024
}

fn default_current_year() -> u16 {
    2025
}

fn default_keyword_window() -> usize {
    DEFAULT_KEYWORD_WINDOW
}

fn default_min_structured_matches() -> usize {
    1
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            prior_year: default_prior_year(),
            current_year: default_current_year(),
            keyword_window: default_keyword_window(),
            min_structured_matches: default_min_structured_matches(),
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.prior_year == self.current_year {
            return Err(FinDetectError::InvalidConfig(format!(
                "prior_year and current_year must differ (both {})",
                self.prior_year
            )));
        }
        if self.keyword_window == 0 {
            return Err(FinDetectError::InvalidConfig(
                "keyword_window must be at least 1 character".to_string(),
            ));
        }
        Ok(())
    }
}

/// Isolation-forest settings. The seed has no default: every caller states it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScorerConfig {
    #[schemars(description = "Expected share of anomalous rows, in (0, 1]")]
    pub contamination: f64,

    #[schemars(description = "Seed for the random splits; identical seeds give identical labels")]
    pub seed: u64,

    #[serde(default = "default_estimators")]
    pub n_estimators: usize,

    #[serde(default = "default_max_samples")]
    #[schemars(description = "Rows sub-sampled per tree, capped at the table size")]
    pub max_samples: usize,
}

fn default_estimators() -> usize {
    DEFAULT_ESTIMATORS
}

fn default_max_samples() -> usize {
    DEFAULT_MAX_SAMPLES
}

impl ScorerConfig {
    pub fn new(contamination: f64, seed: u64) -> Self {
        Self {
            contamination,
            seed,
            n_estimators: DEFAULT_ESTIMATORS,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }

    pub fn with_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination <= 1.0) {
            return Err(FinDetectError::InvalidContamination(self.contamination));
        }
        if self.n_estimators == 0 {
            return Err(FinDetectError::InvalidScorerParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.max_samples == 0 {
            return Err(FinDetectError::InvalidScorerParameter(
                "max_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    #[schemars(description = "Present only when transaction tables are scored")]
    pub scorer: Option<ScorerConfig>,

    #[serde(default = "default_narrative_timeout_secs")]
    pub narrative_timeout_secs: u64,
}

fn default_narrative_timeout_secs() -> u64 {
    DEFAULT_NARRATIVE_TIMEOUT_SECS
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            scorer: None,
            narrative_timeout_secs: default_narrative_timeout_secs(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.extraction.validate()?;
        if let Some(scorer) = &self.scorer {
            scorer.validate()?;
        }
        if self.narrative_timeout_secs == 0 {
            return Err(FinDetectError::InvalidConfig(
                "narrative_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = AnalysisConfig::from_json_str("{}").unwrap();
        assert_eq!(config.extraction.prior_year, 2024);
        assert_eq!(config.extraction.current_year, 2025);
        assert_eq!(config.extraction.keyword_window, 100);
        assert!(config.scorer.is_none());
        assert_eq!(config.narrative_timeout_secs, 10);
    }

    #[test]
    fn test_scorer_seed_is_required() {
        let missing_seed = r#"{ "scorer": { "contamination": 0.1 } }"#;
        assert!(AnalysisConfig::from_json_str(missing_seed).is_err());

        let full = r#"{ "scorer": { "contamination": 0.05, "seed": 7 } }"#;
        let config = AnalysisConfig::from_json_str(full).unwrap();
        let scorer = config.scorer.unwrap();
        assert_eq!(scorer.seed, 7);
        assert_eq!(scorer.n_estimators, DEFAULT_ESTIMATORS);
    }

    #[test]
    fn test_contamination_bounds() {
        assert!(ScorerConfig::new(0.0, 1).validate().is_err());
        assert!(ScorerConfig::new(-0.2, 1).validate().is_err());
        assert!(ScorerConfig::new(1.5, 1).validate().is_err());
        assert!(ScorerConfig::new(f64::NAN, 1).validate().is_err());
        assert!(ScorerConfig::new(1.0, 1).validate().is_ok());
        assert!(ScorerConfig::new(DEFAULT_CONTAMINATION, DEFAULT_SEED)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_extraction_years_must_differ() {
        let config = ExtractionConfig {
            prior_year: 2025,
            ..ExtractionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
