//! The rectangular typed table flowing through every stage.

use serde::de::Error as _;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use super::value::{CellValue, ColumnType};
use crate::error::{DatasetError, DatasetResult};

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl Header {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Number)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Date)
    }
}

/// One row, with cells in header order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row(Vec<CellValue>);

impl Row {
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self(cells)
    }

    pub fn cells(&self) -> &[CellValue] {
        &self.0
    }

    /// Cell at a column position.
    ///
    /// # Panics
    /// If `index` is not a column of the row's dataset; evaluators only use
    /// positions resolved against the same dataset.
    pub fn cell(&self, index: usize) -> &CellValue {
        &self.0[index]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<CellValue>> for Row {
    fn from(cells: Vec<CellValue>) -> Self {
        Self(cells)
    }
}

/// Headers plus typed rows.
///
/// Invariants, checked by every constructor:
/// - header names are unique;
/// - every row has exactly one cell per header;
/// - every cell is `Null` or a value of its column's type.
///
/// Rows are stored positionally, so a keyed view of a row always contains
/// every header name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    headers: Vec<Header>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset from positional rows.
    pub fn new(headers: Vec<Header>, rows: Vec<Row>) -> DatasetResult<Self> {
        check_headers(&headers)?;
        for (index, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(DatasetError::RowWidth {
                    row: index,
                    expected: headers.len(),
                    found: row.len(),
                });
            }
            for (cell, header) in row.cells().iter().zip(&headers) {
                if !cell.fits(header.column_type) {
                    return Err(DatasetError::InvalidCell {
                        row: index,
                        column: header.name.clone(),
                        expected: header.column_type,
                    });
                }
            }
        }
        Ok(Self { headers, rows })
    }

    /// Build a dataset from keyed rows.
    ///
    /// Every row must have exactly the header names as keys.
    pub fn from_records(
        headers: Vec<Header>,
        records: Vec<HashMap<String, CellValue>>,
    ) -> DatasetResult<Self> {
        check_headers(&headers)?;
        let mut rows = Vec::with_capacity(records.len());
        for (index, mut record) in records.into_iter().enumerate() {
            let mut cells = Vec::with_capacity(headers.len());
            for header in &headers {
                let cell = record
                    .remove(&header.name)
                    .ok_or_else(|| DatasetError::MissingCell {
                        row: index,
                        column: header.name.clone(),
                    })?;
                cells.push(cell);
            }
            if let Some(extra) = record.into_keys().next() {
                return Err(DatasetError::UnexpectedCell {
                    row: index,
                    column: extra,
                });
            }
            rows.push(Row(cells));
        }
        Self::new(headers, rows)
    }

    /// Build a dataset from JSON objects keyed by header name.
    ///
    /// Number columns take JSON numbers, string columns JSON strings and date
    /// columns ISO date strings; `null` fits every column.
    pub fn from_json_rows(headers: Vec<Header>, rows: Vec<Map<String, Value>>) -> DatasetResult<Self> {
        check_headers(&headers)?;
        let mut typed = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let mut cells = Vec::with_capacity(headers.len());
            for header in &headers {
                let raw = row.get(&header.name).ok_or_else(|| DatasetError::MissingCell {
                    row: index,
                    column: header.name.clone(),
                })?;
                let cell = header
                    .column_type
                    .cell_from_json(raw)
                    .ok_or_else(|| DatasetError::InvalidCell {
                        row: index,
                        column: header.name.clone(),
                        expected: header.column_type,
                    })?;
                cells.push(cell);
            }
            if row.len() != headers.len() {
                if let Some(extra) = row.keys().find(|k| !headers.iter().any(|h| h.name == **k)) {
                    return Err(DatasetError::UnexpectedCell {
                        row: index,
                        column: extra.clone(),
                    });
                }
            }
            typed.push(Row(cells));
        }
        Ok(Self {
            headers,
            rows: typed,
        })
    }

    /// Same headers, different rows drawn from this dataset.
    pub(crate) fn with_rows(&self, rows: Vec<Row>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == self.headers.len()));
        Self {
            headers: self.headers.clone(),
            rows,
        }
    }

    /// Assemble a dataset whose rows were built cell-by-cell against `headers`.
    pub(crate) fn assemble(headers: Vec<Header>, rows: Vec<Row>) -> Self {
        debug_assert!(check_headers(&headers).is_ok());
        debug_assert!(rows.iter().all(|r| r.len() == headers.len()));
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header_names(&self) -> Vec<&str> {
        self.headers.iter().map(|h| h.name.as_str()).collect()
    }

    /// Position of a column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.name == name)
    }

    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.header(name).map(|h| h.column_type)
    }

    /// Cell at (`row`, `column`).
    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| r.cell(index))
    }

    /// All cells of one column, top to bottom.
    pub fn column_values(&self, column: &str) -> Option<Vec<&CellValue>> {
        let index = self.column_index(column)?;
        Some(self.rows.iter().map(|r| r.cell(index)).collect())
    }

    /// Keyed view of one row.
    pub fn record(&self, row: usize) -> Option<HashMap<&str, &CellValue>> {
        let row = self.rows.get(row)?;
        Some(
            self.headers
                .iter()
                .map(|h| h.name.as_str())
                .zip(row.cells())
                .collect(),
        )
    }
}

fn check_headers(headers: &[Header]) -> DatasetResult<()> {
    let mut seen = HashSet::with_capacity(headers.len());
    for header in headers {
        if !seen.insert(header.name.as_str()) {
            return Err(DatasetError::DuplicateHeader(header.name.clone()));
        }
    }
    Ok(())
}

// =============================================================================
// Serialization
// =============================================================================

struct KeyedRow<'a> {
    headers: &'a [Header],
    row: &'a Row,
}

impl Serialize for KeyedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.headers.len()))?;
        for (header, cell) in self.headers.iter().zip(self.row.cells()) {
            map.serialize_entry(&header.name, cell)?;
        }
        map.end()
    }
}

struct KeyedRows<'a>(&'a Dataset);

impl Serialize for KeyedRows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.rows.iter().map(|row| KeyedRow {
            headers: &self.0.headers,
            row,
        }))
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Dataset", 2)?;
        state.serialize_field("headers", &self.headers)?;
        state.serialize_field("rows", &KeyedRows(self))?;
        state.end()
    }
}

#[derive(Deserialize)]
struct DatasetRepr {
    headers: Vec<Header>,
    #[serde(default)]
    rows: Vec<Map<String, Value>>,
}

impl<'de> Deserialize<'de> for Dataset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = DatasetRepr::deserialize(deserializer)?;
        Dataset::from_json_rows(repr.headers, repr.rows).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_date;
    use serde_json::json;

    fn sales() -> Dataset {
        Dataset::new(
            vec![Header::string("region"), Header::number("sales")],
            vec![
                Row::new(vec!["E".into(), 10.0.into()]),
                Row::new(vec!["W".into(), CellValue::Null]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let err = Dataset::new(vec![Header::string("a"), Header::number("a")], vec![]).unwrap_err();
        assert_eq!(err, DatasetError::DuplicateHeader("a".into()));
    }

    #[test]
    fn test_row_width_checked() {
        let err = Dataset::new(
            vec![Header::string("a"), Header::number("b")],
            vec![Row::new(vec!["x".into()])],
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::RowWidth { row: 0, expected: 2, found: 1 }));
    }

    #[test]
    fn test_cell_type_checked() {
        let err = Dataset::new(vec![Header::number("n")], vec![Row::new(vec!["x".into()])]).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidCell { expected: ColumnType::Number, .. }));
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let rows = vec![Row::new(vec![1.0.into()]), Row::new(vec![bad.into()])];
            let err = Dataset::new(vec![Header::number("n")], rows).unwrap_err();
            assert_eq!(
                err,
                DatasetError::InvalidCell {
                    row: 1,
                    column: "n".into(),
                    expected: ColumnType::Number
                }
            );
        }

        let mut record = HashMap::new();
        record.insert("n".to_string(), CellValue::Number(f64::NAN));
        assert!(matches!(
            Dataset::from_records(vec![Header::number("n")], vec![record]),
            Err(DatasetError::InvalidCell { .. })
        ));
    }

    #[test]
    fn test_from_records_requires_every_key() {
        let headers = vec![Header::string("region"), Header::number("sales")];
        let mut record = HashMap::new();
        record.insert("region".to_string(), CellValue::from("E"));
        let err = Dataset::from_records(headers.clone(), vec![record.clone()]).unwrap_err();
        assert_eq!(
            err,
            DatasetError::MissingCell {
                row: 0,
                column: "sales".into()
            }
        );

        record.insert("sales".to_string(), CellValue::Null);
        record.insert("extra".to_string(), CellValue::Null);
        let err = Dataset::from_records(headers, vec![record]).unwrap_err();
        assert!(matches!(err, DatasetError::UnexpectedCell { .. }));
    }

    #[test]
    fn test_lookup_helpers() {
        let data = sales();
        assert_eq!(data.column_index("sales"), Some(1));
        assert_eq!(data.column_type("region"), Some(ColumnType::String));
        assert_eq!(data.value(0, "sales"), Some(&CellValue::Number(10.0)));
        assert_eq!(data.value(1, "sales"), Some(&CellValue::Null));
        assert_eq!(data.value(0, "missing"), None);
        let record = data.record(1).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record["region"], &CellValue::from("W"));
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(sales()).unwrap();
        assert_eq!(
            value,
            json!({
                "headers": [
                    { "name": "region", "type": "string" },
                    { "name": "sales", "type": "number" }
                ],
                "rows": [
                    { "region": "E", "sales": 10.0 },
                    { "region": "W", "sales": null }
                ]
            })
        );
        let back: Dataset = serde_json::from_value(value).unwrap();
        assert_eq!(back, sales());
    }

    #[test]
    fn test_deserialize_types_dates() {
        let data: Dataset = serde_json::from_value(json!({
            "headers": [{ "name": "day", "type": "date" }],
            "rows": [{ "day": "2024-02-01" }, { "day": null }]
        }))
        .unwrap();
        assert_eq!(data.value(0, "day"), Some(&CellValue::Date(parse_date("2024-02-01").unwrap())));
        assert_eq!(data.value(1, "day"), Some(&CellValue::Null));
    }

    #[test]
    fn test_deserialize_rejects_missing_key() {
        let result: Result<Dataset, _> = serde_json::from_value(json!({
            "headers": [{ "name": "a", "type": "string" }, { "name": "b", "type": "number" }],
            "rows": [{ "a": "x" }]
        }));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("missing column 'b'"));
    }
}
