//! # Tabcraft - typed tabular transformation pipeline
//!
//! Tabcraft applies a chain of filter, sort and group-by stages to an
//! in-memory typed table. Each stage reads the previous stage's output;
//! editing a stage discards everything after it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────────────────┐     ┌─────────────┐
//! │ Raw records │────▶│   Parser    │────▶│          Pipeline            │────▶│ Transformed │
//! │  (strings)  │     │  (typing)   │     │ filter ─▶ sort ─▶ group ─▶ … │     │   dataset   │
//! └─────────────┘     └─────────────┘     └──────────────────────────────┘     └─────────────┘
//!                                                    ▲
//!                                                    │ validation (per stage)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tabcraft::{Dataset, Header, Row, Session};
//! use tabcraft::transform::{AggregateFunction, GroupStage};
//!
//! let data = Dataset::new(
//!     vec![Header::string("region"), Header::number("sales")],
//!     vec![
//!         Row::new(vec!["E".into(), 10.0.into()]),
//!         Row::new(vec!["E".into(), 20.0.into()]),
//!         Row::new(vec!["W".into(), 5.0.into()]),
//!     ],
//! )
//! .unwrap();
//!
//! let mut session = Session::new(data);
//! let stage = GroupStage::new(["region"]).aggregate("sales", AggregateFunction::Sum);
//! session.edit(0, stage.into()).unwrap();
//! session.apply().unwrap();
//! assert_eq!(session.transformed().row_count(), 2);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Typed values and the dataset
//! - [`parser`] - Typing raw string records
//! - [`validation`] - Per-stage semantic checks
//! - [`transform`] - Stage types, evaluators and the pipeline
//! - [`session`] - Owner of source, pipeline and transformed dataset
//! - [`config`] - Engine limits
//! - [`logs`] - Broadcast log stream

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Transformation
pub mod transform;

// Session
pub mod session;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CliError,
    DatasetError,
    ParseError,
    PipelineError,
    StageError,
    DatasetResult,
    StageResult,
    PipelineResult,
    ParseResult,
    CliResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CellValue,
    ColumnType,
    Dataset,
    FilterOperator,
    Header,
    Row,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::EngineConfig;

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{invalid_rows, parse_type_assignments, type_table, RawTable};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{validate_stage, StagePlan};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    evaluate_filter,
    evaluate_group,
    evaluate_sort,
    evaluate_stage,
    Pipeline,
    Stage,
    Transformation,
    TransformationState,
};

// =============================================================================
// Re-exports - Session
// =============================================================================

pub use session::Session;

// =============================================================================
// Re-exports - Logs
// =============================================================================

pub use logs::{LogEntry, LogLevel, LOG_BROADCASTER};
