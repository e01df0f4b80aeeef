//! Typed cell values, column types and filter operators.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Date-time layouts accepted for date cells and literals, tried in order
/// after RFC 3339.
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Date-only layouts, read as midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Layout used when rendering dates back to text.
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// =============================================================================
// Column Type
// =============================================================================

/// Supported column types.
///
/// The type decides how cells parse, how they compare, and which filter
/// operators are legal on the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Date,
}

impl ColumnType {
    /// All column types.
    pub const ALL: [ColumnType; 3] = [Self::String, Self::Number, Self::Date];

    /// Lowercase name, as used in JSON.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Date => "date",
        }
    }

    /// Filter operators legal on a column of this type.
    pub fn operators(&self) -> &'static [FilterOperator] {
        use FilterOperator::*;
        match self {
            Self::String => &[Equal, NotEqual, Contains, NotContains, StartsWith, EndsWith],
            Self::Number => &[
                GreaterThan,
                GreaterThanOrEqual,
                LessThan,
                LessThanOrEqual,
                Equal,
                NotEqual,
            ],
            Self::Date => &[Before, After, On, NotOn],
        }
    }

    /// Parse literal text as a value of this type.
    ///
    /// String literals are taken verbatim. Returns `None` when the text is
    /// not a valid number or date.
    pub fn parse_literal(&self, text: &str) -> Option<CellValue> {
        match self {
            Self::String => Some(CellValue::String(text.to_string())),
            Self::Number => parse_number(text).map(CellValue::Number),
            Self::Date => parse_date(text).map(CellValue::Date),
        }
    }

    /// Read a JSON value as a cell of this type.
    ///
    /// Dates are read from their text form. Returns `None` when the JSON value
    /// does not fit the type; `null` always fits.
    pub fn cell_from_json(&self, value: &Value) -> Option<CellValue> {
        match (self, value) {
            (_, Value::Null) => Some(CellValue::Null),
            (Self::String, Value::String(s)) => Some(CellValue::String(s.clone())),
            (Self::Number, Value::Number(n)) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map(CellValue::Number),
            (Self::Date, Value::String(s)) => parse_date(s).map(CellValue::Date),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" | "text" => Ok(Self::String),
            "number" | "numeric" => Ok(Self::Number),
            "date" => Ok(Self::Date),
            other => Err(format!("unknown column type '{}'", other)),
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Locale-independent number parsing.
///
/// Surrounding whitespace is ignored; `NaN` and infinities are rejected so that
/// every number cell has a total order.
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a calendar date or date-time.
///
/// RFC 3339 timestamps are normalized to UTC; naive layouts are taken as-is
/// and date-only layouts resolve to midnight.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Render a date cell as ISO 8601 text.
pub fn format_date(value: &NaiveDateTime) -> String {
    value.format(ISO_FORMAT).to_string()
}

// =============================================================================
// Cell Value
// =============================================================================

/// One cell of a dataset.
///
/// Missing or unparseable values are `Null`, never absent.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    String(String),
    Number(f64),
    Date(NaiveDateTime),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Type of the value, `None` for null.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::String(_) => Some(ColumnType::String),
            Self::Number(_) => Some(ColumnType::Number),
            Self::Date(_) => Some(ColumnType::Date),
        }
    }

    /// Whether the value may sit in a column of type `ty`.
    ///
    /// Numbers must be finite, so number columns keep a total order.
    pub fn fits(&self, ty: ColumnType) -> bool {
        match self {
            Self::Number(v) if !v.is_finite() => false,
            _ => self.column_type().map_or(true, |own| own == ty),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// JSON form: dates become ISO strings.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::String(s) => Value::String(s.clone()),
            Self::Number(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Date(d) => Value::String(format_date(d)),
        }
    }

    /// Ordering used by the sort stage.
    ///
    /// Nulls come before every non-null value. Numbers compare numerically,
    /// strings lexicographically (byte order) and dates chronologically.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            // Mixed types only arise from hand-built rows; keep the order total.
            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Number(_) => 1,
            Self::String(_) => 2,
            Self::Date(_) => 3,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::String(s) => f.write_str(s),
            Self::Number(v) => write!(f, "{}", v),
            Self::Date(d) => f.write_str(&format_date(d)),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::String(s) => serializer.serialize_str(s),
            Self::Number(v) => serializer.serialize_f64(*v),
            Self::Date(d) => serializer.serialize_str(&format_date(d)),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// =============================================================================
// Filter Operators
// =============================================================================

/// Comparison operators of the filter stage.
///
/// Which operators a column accepts depends on its type, see
/// [`ColumnType::operators`]. Serde also accepts the human labels
/// ("greater than", "not on", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equal,
    #[serde(alias = "not equal", alias = "notEqual")]
    NotEqual,
    Contains,
    #[serde(alias = "not contains")]
    NotContains,
    #[serde(alias = "starts with")]
    StartsWith,
    #[serde(alias = "ends with")]
    EndsWith,
    #[serde(alias = "greater than")]
    GreaterThan,
    #[serde(alias = "greater than or equals")]
    GreaterThanOrEqual,
    #[serde(alias = "lesser than", alias = "less than")]
    LessThan,
    #[serde(alias = "lesser than or equals", alias = "less than or equals")]
    LessThanOrEqual,
    Before,
    After,
    On,
    #[serde(alias = "not on")]
    NotOn,
}

impl FilterOperator {
    /// Human label, as shown in stage descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "not equal",
            Self::Contains => "contains",
            Self::NotContains => "not contains",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
            Self::GreaterThan => "greater than",
            Self::GreaterThanOrEqual => "greater than or equals",
            Self::LessThan => "less than",
            Self::LessThanOrEqual => "less than or equals",
            Self::Before => "before",
            Self::After => "after",
            Self::On => "on",
            Self::NotOn => "not on",
        }
    }

    /// Whether the operator is legal on a column of type `ty`.
    pub fn applies_to(&self, ty: ColumnType) -> bool {
        ty.operators().contains(self)
    }

    /// Test a cell against the resolved comparison value.
    ///
    /// A null on either side never satisfies an operator, except the
    /// inequalities `NotEqual` and `NotOn`, which a null always satisfies.
    pub fn test(&self, cell: &CellValue, target: &CellValue) -> bool {
        use CellValue::*;
        match (cell, target) {
            (Null, _) | (_, Null) => matches!(self, Self::NotEqual | Self::NotOn),
            (String(a), String(b)) => match self {
                Self::Equal => a == b,
                Self::NotEqual => a != b,
                Self::Contains => a.contains(b.as_str()),
                Self::NotContains => !a.contains(b.as_str()),
                Self::StartsWith => a.starts_with(b.as_str()),
                Self::EndsWith => a.ends_with(b.as_str()),
                _ => false,
            },
            (Number(a), Number(b)) => match self {
                Self::GreaterThan => a > b,
                Self::GreaterThanOrEqual => a >= b,
                Self::LessThan => a < b,
                Self::LessThanOrEqual => a <= b,
                Self::Equal => a == b,
                Self::NotEqual => a != b,
                _ => false,
            },
            (Date(a), Date(b)) => match self {
                Self::Before => a < b,
                Self::After => a > b,
                Self::On => a.date() == b.date(),
                Self::NotOn => a.date() != b.date(),
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
