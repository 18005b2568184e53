//! Flat CSV exports for the presentation layer.

use crate::anomaly::AnomalyScores;
use crate::error::{FinDetectError, Result};
use crate::schema::{RatioValue, VarianceResult};
use crate::transactions::TransactionTable;
use csv::Writer;
use std::io::Write;

pub const ANALYSIS_COLUMNS: [&str; 5] = ["item", "prior", "current", "percent_change", "ratio_value"];

/// One row per analyzed item, then one row per ratio with only `item` and
/// `ratio_value` filled.
pub fn write_analysis_csv<W: Write>(
    writer: W,
    variances: &[VarianceResult],
    ratios: &[RatioValue],
) -> Result<()> {
    let mut csv = Writer::from_writer(writer);
    csv.write_record(ANALYSIS_COLUMNS)?;

    for v in variances {
        csv.write_record([
            v.label.clone(),
            v.prior.to_string(),
            v.current.to_string(),
            format!("{:.2}", v.percent_change),
            String::new(),
        ])?;
    }

    for r in ratios {
        csv.write_record([
            r.name.clone(),
            String::new(),
            String::new(),
            String::new(),
            format!("{:.4}", r.value),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// Every input column followed by `score`, `anomaly_label` and `encoded`,
/// one line per scored row.
pub fn write_transactions_csv<W: Write>(
    writer: W,
    table: &TransactionTable,
    scores: &AnomalyScores,
) -> Result<()> {
    if table.records.len() != scores.rows.len() {
        return Err(FinDetectError::RowCountMismatch {
            records: table.records.len(),
            scores: scores.rows.len(),
        });
    }

    let mut csv = Writer::from_writer(writer);

    let mut header: Vec<String> = table.headers.clone();
    header.extend(["score", "anomaly_label", "encoded"].map(String::from));
    csv.write_record(&header)?;

    for (record, row) in table.records.iter().zip(&scores.rows) {
        let mut line = record.clone();
        line.push(format!("{:.6}", row.score));
        line.push(row.label.to_string());
        line.push(row.encoded.clone());
        csv.write_record(&line)?;
    }

    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AnomalyLabel, RatioUnit, TransactionRow};

    #[test]
    fn test_analysis_csv_layout() {
        let variances = vec![VarianceResult {
            item: "Revenue".to_string(),
            label: "Revenue".to_string(),
            prior: 1000.0,
            current: 1100.0,
            percent_change: 10.0,
            significant: true,
            guidance: None,
            investigation_note: None,
        }];
        let ratios = vec![RatioValue {
            name: "Current Ratio".to_string(),
            value: 1.5,
            unit: RatioUnit::Times,
            denominator_substituted: false,
        }];

        let mut buffer = Vec::new();
        write_analysis_csv(&mut buffer, &variances, &ratios).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "item,prior,current,percent_change,ratio_value");
        assert_eq!(lines[1], "Revenue,1000,1100,10.00,");
        assert_eq!(lines[2], "Current Ratio,,,,1.5000");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_transactions_csv_keeps_every_input_column() {
        let input = "id,merchant,amount\n1,Acme,120.5\n2,Globex,80\n";
        let table = TransactionTable::from_csv_reader(input.as_bytes()).unwrap();
        let scores = AnomalyScores {
            rows: vec![
                TransactionRow {
                    index: 0,
                    features: vec![1.0, 120.5],
                    score: 0.75,
                    label: AnomalyLabel::Anomalous,
                    encoded: "a".to_string(),
                },
                TransactionRow {
                    index: 1,
                    features: vec![2.0, 80.0],
                    score: 0.4,
                    label: AnomalyLabel::Normal,
                    encoded: "b".to_string(),
                },
            ],
            threshold: Some(0.75),
            anomalous_count: 1,
            contamination: 0.5,
            seed: 42,
        };

        let mut buffer = Vec::new();
        write_transactions_csv(&mut buffer, &table, &scores).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(
            text,
            "id,merchant,amount,score,anomaly_label,encoded\n\
             1,Acme,120.5,0.750000,Anomalous,a\n\
             2,Globex,80,0.400000,Normal,b\n"
        );
    }

    #[test]
    fn test_transactions_csv_rejects_mismatched_scores() {
        let table = TransactionTable::from_rows(vec!["amount".to_string()], vec![vec![1.0]]).unwrap();
        let scores = AnomalyScores {
            rows: vec![],
            threshold: None,
            anomalous_count: 0,
            contamination: 0.1,
            seed: 42,
        };

        let result = write_transactions_csv(Vec::new(), &table, &scores);
        assert!(matches!(
            result,
            Err(FinDetectError::RowCountMismatch { records: 1, scores: 0 })
        ));
    }
}
