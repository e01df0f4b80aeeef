//! Typing raw string records into a [`Dataset`].
//!
//! Records arrive with every cell as text, the way a CSV reader leaves them.
//! The caller assigns a [`ColumnType`] per header; cells are trimmed, null
//! tokens become `null`, and the rest must parse as their column's type.
//! Lines that do not fit are reported, never coerced.
//!
//! Accepted JSON shapes for [`RawTable::from_json`]:
//!
//! ```text
//! [ { "region": "E", "sales": "10" }, ... ]                  header order: key order
//! { "headers": ["region", "sales"], "rows": [["E", "10"]] }
//! { "headers": ["region", "sales"], "records": [{ ... }] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::error::{ParseError, ParseResult};
use crate::models::{CellValue, ColumnType, Dataset, Header, Row};

/// Untyped table: header names and text cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRepr {
    Records(Vec<Map<String, Value>>),
    Rows {
        headers: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    Keyed {
        headers: Vec<String>,
        records: Vec<Map<String, Value>>,
    },
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Read a raw table from JSON text in one of the accepted shapes.
    pub fn from_json(text: &str) -> ParseResult<Self> {
        match serde_json::from_str::<RawRepr>(text) {
            Ok(RawRepr::Records(records)) => Self::from_records(None, records),
            Ok(RawRepr::Keyed { headers, records }) => Self::from_records(Some(headers), records),
            Ok(RawRepr::Rows { headers, rows }) => {
                let rows = rows
                    .into_iter()
                    .map(|row| row.iter().map(cell_text).collect())
                    .collect();
                Ok(Self { headers, rows })
            }
            Err(_) => Err(ParseError::InvalidRecords(
                "expected an array of objects or an object with headers and rows".to_string(),
            )),
        }
    }

    /// Build from keyed records. Without explicit headers, the keys of all
    /// records in first-seen order become the headers. Missing keys read as
    /// empty text.
    pub fn from_records(
        headers: Option<Vec<String>>,
        records: Vec<Map<String, Value>>,
    ) -> ParseResult<Self> {
        let headers = match headers {
            Some(h) => h,
            None => {
                let mut names: Vec<String> = Vec::new();
                for key in records.iter().flat_map(|r| r.keys()) {
                    if !names.contains(key) {
                        names.push(key.clone());
                    }
                }
                names
            }
        };

        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if let Some(key) = record.keys().find(|k| !headers.contains(*k)) {
                return Err(ParseError::InvalidRecords(format!(
                    "record {} has key '{}' not in headers",
                    i + 1,
                    key
                )));
            }
            rows.push(
                headers
                    .iter()
                    .map(|h| record.get(h).map(cell_text).unwrap_or_default())
                    .collect(),
            );
        }
        Ok(Self { headers, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a `name=type,name=type` list, as given on the command line.
pub fn parse_type_assignments(text: &str) -> ParseResult<HashMap<String, ColumnType>> {
    let mut types = HashMap::new();
    for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, ty) = part.split_once('=').ok_or_else(|| {
            ParseError::InvalidRecords(format!("expected name=type, got '{}'", part))
        })?;
        let ty = ty
            .trim()
            .parse::<ColumnType>()
            .map_err(|e| ParseError::InvalidRecords(e.to_string()))?;
        types.insert(name.trim().to_string(), ty);
    }
    Ok(types)
}

// =============================================================================
// Typing
// =============================================================================

/// Line numbers (1-based) holding a cell that does not fit its column type.
///
/// Headers without an assigned type are strings. A row shorter than the
/// header list is invalid.
pub fn invalid_rows(
    raw: &RawTable,
    types: &HashMap<String, ColumnType>,
    config: &EngineConfig,
) -> ParseResult<Vec<usize>> {
    let column_types = resolve_types(raw, types)?;
    Ok(raw
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| type_row(row, &column_types, config).is_none())
        .map(|(i, _)| i + 1)
        .collect())
}

/// Convert `raw` into a typed dataset.
///
/// Fails with [`ParseError::InvalidRows`] listing every offending line when
/// any cell does not fit.
pub fn type_table(
    raw: &RawTable,
    types: &HashMap<String, ColumnType>,
    config: &EngineConfig,
) -> ParseResult<Dataset> {
    let column_types = resolve_types(raw, types)?;

    let mut rows = Vec::with_capacity(raw.rows.len());
    let mut invalid = Vec::new();
    for (i, raw_row) in raw.rows.iter().enumerate() {
        match type_row(raw_row, &column_types, config) {
            Some(row) => rows.push(row),
            None => invalid.push(i + 1),
        }
    }
    if !invalid.is_empty() {
        return Err(ParseError::InvalidRows { rows: invalid });
    }

    let headers = raw
        .headers
        .iter()
        .zip(&column_types)
        .map(|(name, ty)| Header::new(name.clone(), *ty))
        .collect();
    Ok(Dataset::new(headers, rows)?)
}

fn resolve_types(
    raw: &RawTable,
    types: &HashMap<String, ColumnType>,
) -> ParseResult<Vec<ColumnType>> {
    let mut unknown: Vec<&String> = types.keys().filter(|k| !raw.headers.contains(*k)).collect();
    unknown.sort();
    if let Some(name) = unknown.first() {
        return Err(ParseError::UnknownHeader((*name).clone()));
    }
    Ok(raw
        .headers
        .iter()
        .map(|h| types.get(h).copied().unwrap_or(ColumnType::String))
        .collect())
}

fn type_row(raw: &[String], types: &[ColumnType], config: &EngineConfig) -> Option<Row> {
    if raw.len() != types.len() {
        return None;
    }
    raw.iter()
        .zip(types)
        .map(|(text, ty)| type_cell(text, *ty, config))
        .collect::<Option<Vec<_>>>()
        .map(Row::new)
}

fn type_cell(text: &str, ty: ColumnType, config: &EngineConfig) -> Option<CellValue> {
    let text = text.trim();
    if config.is_null_token(text) {
        return Some(CellValue::Null);
    }
    ty.parse_literal(text)
}
