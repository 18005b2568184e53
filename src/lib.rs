//! # FinDetect
//!
//! Heuristic analysis of financial statement text and transaction tables.
//!
//! ## Core Concepts
//!
//! - **Line items**: canonical names (Revenue, COGS, ...) with a value for the prior
//!   period, the current period, or an untagged single period
//! - **Variance**: percent change between prior and current, flagged significant above 3%
//! - **Ratios**: a fixed, ordered set of financial ratios computed on the current period
//! - **Guidance**: accounting standards attached to items found in the guidance catalog
//! - **Anomalies**: seeded isolation-forest labels for rows of a numeric transaction table
//!
//! Every stage except anomaly scoring is best-effort: text that yields nothing
//! produces an empty report rather than an error.
//!
//! ## Example
//!
//! ```rust,ignore
//! use findetect::*;
//!
//! let report = FinancialAnalyzer::standard()
//!     .analyze_text("Investment Property 2024: 5000, 2025: 6000");
//!
//! assert_eq!(report.variances[0].percent_change, 20.0);
//! println!("{}", report.to_markdown());
//! ```

pub mod anomaly;
pub mod config;
pub mod error;
pub mod export;
pub mod extraction;
pub mod guidance;
pub mod narrative;
pub mod ratios;
pub mod report;
pub mod schema;
pub mod transactions;
pub mod utils;
pub mod variance;

#[cfg(feature = "narrative")]
pub mod llm;

pub use anomaly::{AnomalyScorer, AnomalyScores};
pub use config::*;
pub use error::{FinDetectError, Result};
pub use export::{write_analysis_csv, write_transactions_csv};
pub use extraction::LineItemExtractor;
pub use guidance::{GuidanceCatalog, GuidanceEntry};
pub use narrative::{NarrativeEntry, NarrativeFailure, NarrativeOutcome};
pub use ratios::{RatioCatalog, RatioDefinition, RatioEngine, Term};
pub use report::{build_report, AnalysisReport, AnomalySection, ExtractionSummary, GuidanceNote};
pub use schema::*;
pub use transactions::{SkippedRow, TransactionTable};
pub use variance::VarianceAnalyzer;

use log::{debug, info};
use std::sync::LazyLock;

static STANDARD_GUIDANCE: LazyLock<GuidanceCatalog> = LazyLock::new(GuidanceCatalog::standard);
static STANDARD_RATIOS: LazyLock<RatioCatalog> = LazyLock::new(RatioCatalog::standard);

/// Runs the full pipeline with one set of catalogs and configuration.
///
/// The analyzer holds no per-request state; a single instance can serve any
/// number of concurrent analyses.
pub struct FinancialAnalyzer {
    extractor: LineItemExtractor,
    guidance: GuidanceCatalog,
    ratios: RatioCatalog,
    config: AnalysisConfig,
}

impl FinancialAnalyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_validated(config))
    }

    /// Default configuration with the standard catalogs. Anomaly scoring is
    /// unavailable until a scorer configuration is supplied.
    pub fn standard() -> Self {
        Self::with_validated(AnalysisConfig::default())
    }

    fn with_validated(config: AnalysisConfig) -> Self {
        Self {
            extractor: LineItemExtractor::new(config.extraction.clone()),
            guidance: GuidanceCatalog::standard(),
            ratios: RatioCatalog::standard(),
            config,
        }
    }

    pub fn with_guidance(mut self, guidance: GuidanceCatalog) -> Self {
        self.guidance = guidance;
        self
    }

    pub fn with_ratios(mut self, ratios: RatioCatalog) -> Self {
        self.ratios = ratios;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn guidance(&self) -> &GuidanceCatalog {
        &self.guidance
    }

    pub fn extract(&self, text: &str) -> LineItemSet {
        self.extractor.extract(text)
    }

    /// Extraction, variance, ratios (current period) and guidance. Never fails.
    pub fn analyze_text(&self, text: &str) -> AnalysisReport {
        let items = self.extract(text);
        let variances = VarianceAnalyzer::new(&self.guidance).analyze(&items);
        let ratios = RatioEngine::new(&self.ratios).compute(&items, Period::Current);

        info!(
            "Analyzed {} line items: {} variances, {} ratios",
            items.len(),
            variances.len(),
            ratios.len()
        );

        build_report(items, variances, ratios, None, Vec::new())
    }

    /// Like [`Self::analyze_text`], plus an anomaly section for `table`.
    ///
    /// Fails when no scorer configuration is set or the table cannot be scored.
    pub fn analyze_with_transactions(
        &self,
        text: &str,
        table: &TransactionTable,
    ) -> Result<AnalysisReport> {
        let scorer_config = self.config.scorer.clone().ok_or_else(|| {
            FinDetectError::InvalidConfig(
                "anomaly scoring requires a scorer configuration with an explicit seed".to_string(),
            )
        })?;
        let scores = AnomalyScorer::new(scorer_config)?.score_table(table)?;
        debug!(
            "{} of {} transactions flagged",
            scores.anomalous_count,
            scores.rows.len()
        );

        let mut report = self.analyze_text(text);
        report.anomalies = Some(AnomalySection {
            columns: table.columns.clone(),
            scores,
            skipped: table.skipped.clone(),
        });
        Ok(report)
    }

    /// Attaches narrative commentary. Numeric sections are left untouched.
    pub fn with_narratives(
        &self,
        mut report: AnalysisReport,
        narratives: Vec<NarrativeEntry>,
    ) -> AnalysisReport {
        report.narratives = narratives;
        report
    }

    /// Requests commentary for each significant variance. Without a client,
    /// every significant item gets a "disabled" advisory instead.
    #[cfg(feature = "narrative")]
    pub async fn describe_report(
        &self,
        report: AnalysisReport,
        client: Option<&llm::NarrativeClient>,
    ) -> AnalysisReport {
        let narratives = match client {
            Some(client) => client.describe_variances(&report.variances).await,
            None => narrative::disabled_narratives(&report.variances),
        };
        self.with_narratives(report, narratives)
    }

    /// Client for the service at `base_url`, bounded by the configured
    /// narrative timeout.
    #[cfg(feature = "narrative")]
    pub fn narrative_client(&self, base_url: &str) -> llm::NarrativeClient {
        llm::NarrativeClient::new(
            base_url,
            std::time::Duration::from_secs(self.config.narrative_timeout_secs),
        )
    }
}

/// Extracts line items with the default extraction settings.
pub fn extract_line_items(text: &str) -> LineItemSet {
    LineItemExtractor::default().extract(text)
}

/// Standard ratios for the current period, in declaration order.
pub fn compute_ratios(items: &LineItemSet) -> Vec<RatioValue> {
    RatioEngine::new(&STANDARD_RATIOS).compute(items, Period::Current)
}

pub fn analyze_variance(items: &LineItemSet) -> Vec<VarianceResult> {
    VarianceAnalyzer::new(&STANDARD_GUIDANCE).analyze(items)
}

/// One label per row, in input order. Identical rows, contamination and seed
/// always give identical labels.
pub fn score_anomalies(
    rows: &[Vec<f64>],
    contamination: f64,
    seed: u64,
) -> Result<Vec<AnomalyLabel>> {
    let scorer = AnomalyScorer::new(ScorerConfig::new(contamination, seed))?;
    Ok(scorer.score(rows)?.labels())
}
