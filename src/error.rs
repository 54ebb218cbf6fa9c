// src/error.rs

use thiserror::Error;

/// Errors raised by the analysis core.
///
/// Everything here is a deterministic function of bad input. I/O, Arrow and
/// rendering failures travel separately through `anyhow`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("no date format matches the Date column of `{table}` (tried {tried})")]
    DateFormat { table: String, tried: String },

    #[error("cannot parse `{value}` as a number in `{table}`, column `{column}`, row {row}")]
    NumericParse {
        table: String,
        column: String,
        row: usize,
        value: String,
    },

    #[error("no overlapping data between {start} and {end}")]
    EmptyRange { start: String, end: String },

    #[error("correlation undefined: column `{column}` has zero variance")]
    DegenerateInput { column: String },

    #[error("insufficient data: {rows} row(s), at least 2 required")]
    InsufficientData { rows: usize },

    #[error("instrument `{0}` is not available")]
    MissingInstrument(String),

    #[error("column `{column}` not found in `{table}`")]
    MissingColumn { table: String, column: String },

    #[error("column `{0}` appears in more than one input")]
    DuplicateColumn(String),

    #[error("invalid date `{0}`, expected YYYY, YYYY-MM or YYYY-MM-DD")]
    InvalidDate(String),

    #[error("no feature set for `{0}`")]
    UnknownFeatureSet(String),
}

impl AnalysisError {
    /// Errors the caller can report and move past instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalysisError::EmptyRange { .. }
                | AnalysisError::DegenerateInput { .. }
                | AnalysisError::InsufficientData { .. }
        )
    }
}
