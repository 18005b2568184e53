//! Seeded isolation-forest outlier scoring.
//!
//! Each tree recursively splits a random sub-sample on a random feature at a
//! random cut point. Rows that are isolated after few splits receive high
//! scores. The `contamination` share of highest-scoring rows is labelled
//! anomalous.

use crate::config::ScorerConfig;
use crate::error::{FinDetectError, Result};
use crate::schema::{AnomalyLabel, TransactionRow};
use crate::transactions::TransactionTable;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnomalyScores {
    pub rows: Vec<TransactionRow>,

    #[schemars(description = "Lowest score among anomalous rows. Absent when no row is anomalous.")]
    pub threshold: Option<f64>,

    pub anomalous_count: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl AnomalyScores {
    pub fn labels(&self) -> Vec<AnomalyLabel> {
        self.rows.iter().map(|row| row.label).collect()
    }
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        cut: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn grow(data: &[Vec<f64>], sample: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        Self {
            root: grow_node(data, sample, 0, height_limit, rng),
        }
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                Node::Leaf { size } => return depth as f64 + average_path_length(*size),
                Node::Split {
                    feature,
                    cut,
                    left,
                    right,
                } => {
                    node = if row[*feature] < *cut { left } else { right };
                    depth += 1;
                }
            }
        }
    }
}

fn grow_node(
    data: &[Vec<f64>],
    indices: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let width = data[indices[0]].len();
    let spread: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|feature| {
            let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, &i| {
                (acc.0.min(data[i][feature]), acc.1.max(data[i][feature]))
            });
            (max > min).then_some((feature, min, max))
        })
        .collect();

    // All remaining rows are identical on every feature.
    if spread.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, min, max) = spread[rng.gen_range(0..spread.len())];
    let cut = if (max - min).is_finite() {
        rng.gen_range(min..max)
    } else {
        // Spread exceeds f64::MAX; sample on halved bounds.
        2.0 * (min / 2.0 + rng.gen::<f64>() * (max / 2.0 - min / 2.0))
    };
    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&i| data[i][feature] < cut);

    Node::Split {
        feature,
        cut,
        left: Box::new(grow_node(data, left, depth + 1, height_limit, rng)),
        right: Box::new(grow_node(data, right, depth + 1, height_limit, rng)),
    }
}

/// Average path length of an unsuccessful search in a binary search tree of
/// `n` nodes; normalises depths across sample sizes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

pub struct AnomalyScorer {
    config: ScorerConfig,
}

impl AnomalyScorer {
    /// Fails on contamination outside (0, 1] or zero-sized ensembles.
    pub fn new(config: ScorerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Like [`Self::score`], with each fingerprint taken over the full input
    /// record so flagged rows can be traced back to their transaction.
    pub fn score_table(&self, table: &TransactionTable) -> Result<AnomalyScores> {
        if table.columns.is_empty() && !table.rows.is_empty() {
            return Err(FinDetectError::NoFeatureColumns);
        }
        let mut scores = self.score(&table.rows)?;
        for (row, record) in scores.rows.iter_mut().zip(&table.records) {
            row.encoded = fingerprint(record);
        }
        Ok(scores)
    }

    /// Scores `rows` in input order. Identical input and seed give identical output.
    pub fn score(&self, rows: &[Vec<f64>]) -> Result<AnomalyScores> {
        validate_rows(rows)?;

        let n = rows.len();
        let sample_size = self.config.max_samples.min(n);
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        info!(
            "Scoring {} rows with {} trees (sample size {}, seed {})",
            n, self.config.n_estimators, sample_size, self.config.seed
        );

        let forest: Vec<IsolationTree> = (0..self.config.n_estimators)
            .map(|_| {
                let sample = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::grow(rows, sample, height_limit, &mut rng)
            })
            .collect();

        let normaliser = average_path_length(sample_size);
        let scores: Vec<f64> = rows
            .iter()
            .map(|row| {
                let mean_depth = forest.iter().map(|t| t.path_length(row)).sum::<f64>()
                    / forest.len() as f64;
                if normaliser > 0.0 {
                    2f64.powf(-mean_depth / normaliser)
                } else {
                    0.5
                }
            })
            .collect();

        let flagged = self.flagged(&scores);

        let rows: Vec<TransactionRow> = rows
            .iter()
            .zip(scores)
            .enumerate()
            .map(|(index, (features, score))| TransactionRow {
                index,
                features: features.clone(),
                score,
                label: if flagged(score) {
                    AnomalyLabel::Anomalous
                } else {
                    AnomalyLabel::Normal
                },
                encoded: fingerprint(features),
            })
            .collect();

        let anomalous: Vec<f64> = rows
            .iter()
            .filter(|r| r.label == AnomalyLabel::Anomalous)
            .map(|r| r.score)
            .collect();
        let anomalous_count = anomalous.len();
        let threshold = anomalous.into_iter().reduce(f64::min);
        debug!(
            "{} rows anomalous, lowest anomalous score {:?}",
            anomalous_count, threshold
        );

        Ok(AnomalyScores {
            rows,
            threshold,
            anomalous_count,
            contamination: self.config.contamination,
            seed: self.config.seed,
        })
    }

    /// Anomalous rows are those scoring strictly above the (k+1)-th highest
    /// score, k = round(contamination * n). At most k rows are flagged and
    /// rows with equal scores always share a label.
    fn flagged(&self, scores: &[f64]) -> impl Fn(f64) -> bool {
        let n = scores.len();
        let k = ((self.config.contamination * n as f64).round() as usize).min(n);
        let cutoff = if k == 0 {
            Some(f64::INFINITY)
        } else if k == n {
            None
        } else {
            let mut sorted = scores.to_vec();
            sorted.sort_by(|a, b| b.total_cmp(a));
            Some(sorted[k])
        };
        move |score| cutoff.map_or(true, |c| score > c)
    }
}

fn validate_rows(rows: &[Vec<f64>]) -> Result<()> {
    let first = rows.first().ok_or(FinDetectError::EmptyTable)?;
    if first.is_empty() {
        return Err(FinDetectError::NoFeatureColumns);
    }
    for (row_idx, row) in rows.iter().enumerate() {
        if row.len() != first.len() {
            return Err(FinDetectError::InconsistentRowWidth {
                row: row_idx,
                expected: first.len(),
                found: row.len(),
            });
        }
        if let Some(column) = row.iter().position(|v| !v.is_finite()) {
            return Err(FinDetectError::NonFiniteValue {
                row: row_idx,
                column,
            });
        }
    }
    Ok(())
}

/// Base64 of the row's values rendered as `[v1, v2, ...]`.
pub fn fingerprint<T: Display>(values: &[T]) -> String {
    let rendered = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    STANDARD.encode(format!("[{}]", rendered))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_with_outlier() -> Vec<Vec<f64>> {
        let mut rows: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![100.0 + (i % 7) as f64, 10.0 + (i % 5) as f64, 30.0 + (i % 3) as f64])
            .collect();
        rows.push(vec![9_000.0, 400.0, 1.0]);
        rows
    }

    #[test]
    fn test_obvious_outlier_is_flagged() {
        let scorer = AnomalyScorer::new(ScorerConfig::new(0.02, 42)).unwrap();
        let result = scorer.score(&clustered_with_outlier()).unwrap();

        let outlier = result.rows.last().unwrap();
        assert_eq!(outlier.label, AnomalyLabel::Anomalous);
        let max_score = result
            .rows
            .iter()
            .map(|r| r.score)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(outlier.score, max_score);
    }

    #[test]
    fn test_small_subsample_still_flags_outlier() {
        let config = ScorerConfig::new(0.02, 42)
            .with_estimators(200)
            .with_max_samples(32);
        let result = AnomalyScorer::new(config)
            .unwrap()
            .score(&clustered_with_outlier())
            .unwrap();
        assert_eq!(result.rows.last().unwrap().label, AnomalyLabel::Anomalous);
    }

    #[test]
    fn test_same_seed_same_labels() {
        let rows = clustered_with_outlier();
        let first = AnomalyScorer::new(ScorerConfig::new(0.1, 7))
            .unwrap()
            .score(&rows)
            .unwrap();
        let second = AnomalyScorer::new(ScorerConfig::new(0.1, 7))
            .unwrap()
            .score(&rows)
            .unwrap();

        assert_eq!(first.labels(), second.labels());
        assert_eq!(first, second);
    }

    #[test]
    fn test_one_label_per_row_in_order() {
        let rows = clustered_with_outlier();
        let result = AnomalyScorer::new(ScorerConfig::new(0.1, 1))
            .unwrap()
            .score(&rows)
            .unwrap();

        assert_eq!(result.rows.len(), rows.len());
        for (i, row) in result.rows.iter().enumerate() {
            assert_eq!(row.index, i);
            assert_eq!(row.features, rows[i]);
            assert!(row.score > 0.0 && row.score <= 1.0);
        }
    }

    #[test]
    fn test_full_contamination_flags_everything() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0]];
        let result = AnomalyScorer::new(ScorerConfig::new(1.0, 3))
            .unwrap()
            .score(&rows)
            .unwrap();
        assert_eq!(result.anomalous_count, 3);
    }

    #[test]
    fn test_small_contamination_on_few_rows_flags_nothing() {
        let rows = vec![vec![1.0], vec![2.0], vec![50.0]];
        let result = AnomalyScorer::new(ScorerConfig::new(0.1, 3))
            .unwrap()
            .score(&rows)
            .unwrap();
        assert_eq!(result.threshold, None);
        assert_eq!(result.anomalous_count, 0);
    }

    #[test]
    fn test_tied_scores_never_exceed_contamination() {
        let rows = vec![vec![5.0, 5.0]; 20];
        let result = AnomalyScorer::new(ScorerConfig::new(0.1, 42))
            .unwrap()
            .score(&rows)
            .unwrap();
        assert!(result.anomalous_count <= 2);
        let labels = result.labels();
        assert!(labels.iter().all(|l| *l == labels[0]));

        let mut rows = vec![vec![5.0]; 18];
        rows.push(vec![6.0]);
        rows.push(vec![7.0]);
        let result = AnomalyScorer::new(ScorerConfig::new(0.5, 42))
            .unwrap()
            .score(&rows)
            .unwrap();
        assert!(result.anomalous_count <= 10);
        assert_eq!(result.rows[0].label, AnomalyLabel::Normal);
        assert_eq!(result.rows[19].label, AnomalyLabel::Anomalous);
    }

    #[test]
    fn test_extreme_spread_does_not_overflow() {
        let rows = vec![vec![-1e308], vec![1e308], vec![0.0]];
        let result = AnomalyScorer::new(ScorerConfig::new(0.3, 42))
            .unwrap()
            .score(&rows)
            .unwrap();
        assert_eq!(result.rows.len(), 3);
        assert!(result.rows.iter().all(|r| r.score.is_finite()));
    }

    #[test]
    fn test_threshold_is_lowest_anomalous_score() {
        let result = AnomalyScorer::new(ScorerConfig::new(0.05, 42))
            .unwrap()
            .score(&clustered_with_outlier())
            .unwrap();
        let lowest = result
            .rows
            .iter()
            .filter(|r| r.label == AnomalyLabel::Anomalous)
            .map(|r| r.score)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(result.threshold, Some(lowest));
    }

    #[test]
    fn test_misconfiguration_fails_fast() {
        assert!(matches!(
            AnomalyScorer::new(ScorerConfig::new(0.0, 1)),
            Err(FinDetectError::InvalidContamination(_))
        ));
        assert!(matches!(
            AnomalyScorer::new(ScorerConfig::new(1.01, 1)),
            Err(FinDetectError::InvalidContamination(_))
        ));

        assert!(matches!(
            AnomalyScorer::new(ScorerConfig::new(0.1, 1).with_estimators(0)),
            Err(FinDetectError::InvalidScorerParameter(_))
        ));

        let scorer = AnomalyScorer::new(ScorerConfig::new(0.1, 1)).unwrap();
        assert!(matches!(scorer.score(&[]), Err(FinDetectError::EmptyTable)));
        assert!(matches!(
            scorer.score(&[vec![1.0, 2.0], vec![1.0]]),
            Err(FinDetectError::InconsistentRowWidth { row: 1, .. })
        ));
        assert!(matches!(
            scorer.score(&[vec![]]),
            Err(FinDetectError::NoFeatureColumns)
        ));
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(16));
    }

    #[test]
    fn test_fingerprint() {
        assert_eq!(fingerprint(&[1.0, 2.5]), STANDARD.encode("[1, 2.5]"));
        assert_eq!(fingerprint(&["7", "Acme", "12.5"]), STANDARD.encode("[7, Acme, 12.5]"));
    }
}
