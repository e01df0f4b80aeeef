//! Domain models for the tabcraft pipeline.
//!
//! - [`ColumnType`] - the supported column types (String, Number, Date)
//! - [`CellValue`] - one typed cell, `Null` for missing values
//! - [`FilterOperator`] - per-type comparison operators
//! - [`Header`], [`Row`], [`Dataset`] - the typed table every stage consumes

pub mod dataset;
pub mod value;

pub use dataset::{Dataset, Header, Row};
pub use value::{format_date, parse_date, parse_number, CellValue, ColumnType, FilterOperator};
