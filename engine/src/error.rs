//! Error types for the tabcraft transformation pipeline.
//!
//! Errors are grouped per concern:
//!
//! - [`DatasetError`] - a table that breaks the [`Dataset`](crate::models::Dataset) invariants
//! - [`StageError`] - a stage configuration that cannot run against its input
//! - [`PipelineError`] - pipeline mutations rejected by the chain rules
//! - [`ParseError`] - raw records that cannot be typed into a dataset
//! - [`CliError`] - top-level errors of the `tabcraft` binary
//!
//! All of them are recoverable and reported to the caller; `From` conversions
//! let `?` cross module boundaries.

use thiserror::Error;

use crate::models::ColumnType;

// =============================================================================
// Dataset Errors
// =============================================================================

/// A table violates the rectangular, typed layout every dataset must have.
///
/// Rows are reported with 0-based indexes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DatasetError {
    /// Two headers share a name.
    #[error("Duplicate header: '{0}'")]
    DuplicateHeader(String),

    /// A positional row has the wrong number of cells.
    #[error("Row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A keyed row lacks a header key.
    #[error("Row {row} is missing column '{column}'")]
    MissingCell { row: usize, column: String },

    /// A keyed row has a key no header declares.
    #[error("Row {row} has unknown column '{column}'")]
    UnexpectedCell { row: usize, column: String },

    /// A cell does not hold a value of its column's type.
    #[error("Row {row}, column '{column}': expected {expected} or null")]
    InvalidCell {
        row: usize,
        column: String,
        expected: ColumnType,
    },
}

// =============================================================================
// Stage Errors
// =============================================================================

/// Why a stage configuration cannot be evaluated against its input dataset.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StageError {
    /// The stage references a column the input does not have.
    #[error("Unknown column: '{column}'")]
    UnknownColumn { column: String },

    /// Operator or stage not legal for the column's type.
    #[error("Type mismatch on column '{column}': {message}")]
    TypeMismatch { column: String, message: String },

    /// An absolute filter value that does not parse as the column's type.
    #[error("Cannot read '{value}' as {expected} for column '{column}'")]
    UnparseableLiteral {
        column: String,
        expected: ColumnType,
        value: String,
    },

    /// A required field was left empty.
    #[error("Incomplete configuration: {0}")]
    IncompleteConfiguration(String),

    /// The same column was selected more than once.
    #[error("Columns should be unique: {}", .columns.join(", "))]
    DuplicateColumns { columns: Vec<String> },

    /// More sort keys or group columns than the engine allows.
    #[error("Too many {what}: {found} selected, at most {limit} allowed")]
    LimitExceeded {
        what: &'static str,
        limit: usize,
        found: usize,
    },
}

// =============================================================================
// Pipeline Errors
// =============================================================================

/// A pipeline operation was rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    /// An earlier stage has no output yet.
    #[error("Stage {index} is incomplete, complete the previous transformations first")]
    PipelineStageGap { index: usize },

    /// No stage at that position.
    #[error("Stage index {index} is out of range (pipeline has {len} stages)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Evaluation was requested for a stage with no configuration.
    #[error("Stage {index} has no configuration")]
    EmptyStage { index: usize },

    /// The stage configuration failed validation.
    #[error("Stage {index}: {source}")]
    Stage { index: usize, source: StageError },
}

impl PipelineError {
    /// Wrap a stage error with the index of the stage it came from.
    pub fn at(index: usize, source: StageError) -> Self {
        Self::Stage { index, source }
    }
}

// =============================================================================
// Parse Errors
// =============================================================================

/// Errors while typing raw string records into a dataset.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A type was assigned to a header the raw table does not have.
    #[error("Unknown header: '{0}'")]
    UnknownHeader(String),

    /// Lines (1-based) whose values do not fit their column type.
    #[error("Invalid values on lines: {}", format_lines(.rows))]
    InvalidRows { rows: Vec<usize> },

    /// The records are not a JSON array of objects.
    #[error("Invalid records: {0}")]
    InvalidRecords(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The typed table is not a valid dataset.
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

fn format_lines(rows: &[usize]) -> String {
    rows.iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// CLI Errors (top-level)
// =============================================================================

/// Top-level errors of the `tabcraft` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raw record typing failed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Pipeline operation failed.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Bad command-line arguments.
    #[error("Invalid argument: {0}")]
    BadArgument(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for dataset construction.
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Result type for stage validation and evaluation.
pub type StageResult<T> = Result<T, StageError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for raw record typing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_carries_index() {
        let err = PipelineError::at(
            2,
            StageError::UnknownColumn {
                column: "price".into(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("Stage 2"));
        assert!(msg.contains("price"));
    }

    #[test]
    fn test_duplicate_columns_format() {
        let err = StageError::DuplicateColumns {
            columns: vec!["region".into(), "year".into()],
        };
        assert_eq!(err.to_string(), "Columns should be unique: region, year");
    }

    #[test]
    fn test_error_conversion_chain() {
        let dataset_err = DatasetError::DuplicateHeader("id".into());
        let parse_err: ParseError = dataset_err.into();
        assert!(parse_err.to_string().contains("id"));

        let cli_err: CliError = parse_err.into();
        assert!(cli_err.to_string().starts_with("Parse error"));
    }

    #[test]
    fn test_invalid_rows_lists_lines() {
        let err = ParseError::InvalidRows {
            rows: vec![2, 5, 9],
        };
        assert_eq!(err.to_string(), "Invalid values on lines: 2, 5, 9");
    }
}
