use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinDetectError {
    #[error("Invalid contamination {0}: must be greater than 0.0 and at most 1.0")]
    InvalidContamination(f64),

    #[error("Cannot score an empty transaction table")]
    EmptyTable,

    #[error("Row {row} has {found} feature values, expected {expected}")]
    InconsistentRowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Transaction table has no numeric feature columns")]
    NoFeatureColumns,

    #[error("Invalid scorer parameter: {0}")]
    InvalidScorerParameter(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Row {row}, column {column}: feature value is not a finite number")]
    NonFiniteValue { row: usize, column: usize },

    #[error("Scores cover {scores} rows but the table has {records} records")]
    RowCountMismatch { records: usize, scores: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FinDetectError>;
