use crate::error::{FinDetectError, Result};
use crate::utils::parse_numeric_token;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SkippedRow {
    #[schemars(description = "One-based data line number, not counting the header")]
    pub line: usize,
    pub reason: String,
}

/// Numeric feature matrix ready for anomaly scoring.
///
/// Every row holds one finite value per column. Rows that could not provide
/// that are listed in `skipped` instead of being zero-filled. The full input
/// record of each kept row travels alongside in `records`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransactionTable {
    #[schemars(description = "Names of the numeric feature columns")]
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,

    #[schemars(description = "Every input column name, numeric or not")]
    pub headers: Vec<String>,

    #[schemars(description = "All input cells of each kept row, parallel to `rows`")]
    pub records: Vec<Vec<String>>,

    pub skipped: Vec<SkippedRow>,
}

impl TransactionTable {
    /// Builds a table from already-numeric rows, rejecting ragged or non-finite input.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(FinDetectError::InconsistentRowWidth {
                    row: row_idx,
                    expected: columns.len(),
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

        let records = rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect();

        Ok(Self {
            headers: columns.clone(),
            columns,
            rows,
            records,
            skipped: Vec::new(),
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Reads a headed CSV and keeps its numeric columns as features.
    ///
    /// A column counts as numeric when more than half of its cells parse as
    /// finite numbers. Rows with an empty or unparsable cell in a numeric
    /// column are skipped and recorded.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let records: Vec<StringRecord> = csv_reader.records().collect::<std::result::Result<_, _>>()?;

        let feature_columns: Vec<usize> = (0..headers.len())
            .filter(|&col| is_numeric_column(&records, col))
            .collect();

        debug!(
            "CSV has {} columns, {} numeric",
            headers.len(),
            feature_columns.len()
        );

        let mut table = TransactionTable {
            columns: feature_columns
                .iter()
                .map(|&col| headers.get(col).unwrap_or_default().to_string())
                .collect(),
            rows: Vec::with_capacity(records.len()),
            headers: headers.iter().map(str::to_string).collect(),
            records: Vec::with_capacity(records.len()),
            skipped: Vec::new(),
        };

        for (idx, record) in records.iter().enumerate() {
            let mut values = Vec::with_capacity(feature_columns.len());
            let mut failure = None;

            for &col in &feature_columns {
                let cell = record.get(col).unwrap_or_default();
                match parse_numeric_token(cell) {
                    Some(value) => values.push(value),
                    None => {
                        let column = headers.get(col).unwrap_or_default();
                        failure = Some(if cell.is_empty() {
                            format!("missing value in column '{}'", column)
                        } else {
                            format!("non-numeric value '{}' in column '{}'", cell, column)
                        });
                        break;
                    }
                }
            }

            match failure {
                Some(reason) => table.skipped.push(SkippedRow {
                    line: idx + 1,
                    reason,
                }),
                None => {
                    table.rows.push(values);
                    table.records.push(record.iter().map(str::to_string).collect());
                }
            }
        }

        if !table.skipped.is_empty() {
            info!(
                "Excluded {} of {} rows with missing or non-numeric features",
                table.skipped.len(),
                records.len()
            );
        }

        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn is_numeric_column(records: &[StringRecord], col: usize) -> bool {
    let numeric = records
        .iter()
        .filter(|r| r.get(col).and_then(parse_numeric_token).is_some())
        .count();
    numeric * 2 > records.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selects_numeric_columns() {
        let csv = "id,merchant,amount,hour\n\
                   1,Acme,120.5,9\n\
                   2,Globex,80,14\n\
                   3,Initech,\"1,500\",23\n";
        let table = TransactionTable::from_csv_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.columns, vec!["id", "amount", "hour"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[2], vec![3.0, 1500.0, 23.0]);
        assert!(table.skipped.is_empty());

        assert_eq!(table.headers, vec!["id", "merchant", "amount", "hour"]);
        assert_eq!(table.records[2], vec!["3", "Initech", "1,500", "23"]);
    }

    #[test]
    fn test_rows_with_missing_values_are_excluded() {
        let csv = "amount,age\n\
                   10,1\n\
                   ,2\n\
                   30,abc\n\
                   40,4\n";
        let table = TransactionTable::from_csv_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.rows, vec![vec![10.0, 1.0], vec![40.0, 4.0]]);
        assert_eq!(table.records.len(), table.rows.len());
        assert_eq!(table.records[1], vec!["40", "4"]);
        assert_eq!(table.skipped.len(), 2);
        assert_eq!(table.skipped[0].line, 2);
        assert!(table.skipped[0].reason.contains("missing"));
        assert!(table.skipped[1].reason.contains("non-numeric"));
    }

    #[test]
    fn test_no_numeric_columns() {
        let csv = "merchant,city\nAcme,Paris\n";
        let table = TransactionTable::from_csv_reader(csv.as_bytes()).unwrap();
        assert!(table.columns.is_empty());
        assert_eq!(table.rows, vec![Vec::<f64>::new()]);
    }

    #[test]
    fn test_from_rows_validation() {
        let columns = vec!["a".to_string(), "b".to_string()];

        let ragged = TransactionTable::from_rows(columns.clone(), vec![vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(
            ragged,
            Err(FinDetectError::InconsistentRowWidth { row: 1, .. })
        ));

        let nan = TransactionTable::from_rows(columns.clone(), vec![vec![1.0, f64::NAN]]);
        assert!(matches!(
            nan,
            Err(FinDetectError::NonFiniteValue { row: 0, column: 1 })
        ));

        assert!(TransactionTable::from_rows(columns, vec![vec![1.0, 2.0]]).is_ok());
    }
}
