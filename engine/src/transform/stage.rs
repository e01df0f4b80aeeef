//! Stage configuration types.
//!
//! A [`Stage`] is what a UI form produces: the operation kind plus its
//! settings. Configurations may be incomplete (a blank column name, no
//! operator chosen); [`crate::validation`] decides whether a stage can run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{ColumnType, FilterOperator};

// =============================================================================
// Stage
// =============================================================================

/// One configured operation of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    /// Keep rows matching a predicate.
    Filter(FilterStage),
    /// Reorder rows by up to three keys.
    Sort(SortStage),
    /// Collapse rows into groups with aggregates.
    Group(GroupStage),
}

impl From<FilterStage> for Stage {
    fn from(stage: FilterStage) -> Self {
        Self::Filter(stage)
    }
}

impl From<SortStage> for Stage {
    fn from(stage: SortStage) -> Self {
        Self::Sort(stage)
    }
}

impl From<GroupStage> for Stage {
    fn from(stage: GroupStage) -> Self {
        Self::Group(stage)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter(s) => write!(f, "Filter: {}", s),
            Self::Sort(s) => write!(f, "Sort: {}", s),
            Self::Group(s) => write!(f, "Group by {}", s),
        }
    }
}

// =============================================================================
// Filter
// =============================================================================

/// Where a filter takes its right-hand side from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Compare against the literal `compare_value`.
    #[default]
    Absolute,
    /// Compare against the column named by `compare_value`, same row.
    Relative,
}

/// Filter settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterStage {
    /// Column to test.
    #[serde(default)]
    pub column: String,

    /// Operator, legal for the column's type.
    #[serde(default)]
    pub operator: Option<FilterOperator>,

    #[serde(default)]
    pub mode: ComparisonMode,

    /// Literal value (absolute mode) or column name (relative mode).
    #[serde(default, alias = "value")]
    pub compare_value: String,
}

impl FilterStage {
    /// Compare `column` against a literal.
    pub fn absolute(
        column: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            operator: Some(operator),
            mode: ComparisonMode::Absolute,
            compare_value: value.into(),
        }
    }

    /// Compare `column` against `other` in the same row.
    pub fn relative(
        column: impl Into<String>,
        operator: FilterOperator,
        other: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            operator: Some(operator),
            mode: ComparisonMode::Relative,
            compare_value: other.into(),
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operator = self.operator.map_or("?", |op| op.label());
        match self.mode {
            ComparisonMode::Absolute => {
                write!(f, "{} {} {}", self.column, operator, self.compare_value)
            }
            ComparisonMode::Relative => {
                write!(f, "{} {} column {}", self.column, operator, self.compare_value)
            }
        }
    }
}

// =============================================================================
// Sort
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

impl SortDirection {
    pub fn short(&self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

/// Sort settings: keys in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortStage {
    #[serde(default)]
    pub keys: Vec<SortKey>,
}

impl SortStage {
    /// Start with a single key.
    pub fn by(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            keys: vec![SortKey::new(column, direction)],
        }
    }

    /// Add a tie-breaking key.
    pub fn then(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push(SortKey::new(column, direction));
        self
    }
}

impl fmt::Display for SortStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self
            .keys
            .iter()
            .map(|k| format!("{} {}", k.column, k.direction.short()))
            .collect();
        f.write_str(&keys.join(", "))
    }
}

// =============================================================================
// Group
// =============================================================================

/// Aggregate functions of the group stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Sum,
    #[serde(alias = "avg", alias = "mean")]
    Average,
    Count,
    Min,
    Max,
}

impl AggregateFunction {
    pub const ALL: [Self; 5] = [Self::Sum, Self::Average, Self::Count, Self::Min, Self::Max];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "avg",
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// One aggregate: a function over a number column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSpec {
    #[serde(default)]
    pub column: String,

    #[serde(default, alias = "aggregateOption")]
    pub function: Option<AggregateFunction>,

    /// Output column name; defaults to `column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl AggregateSpec {
    pub fn new(column: impl Into<String>, function: AggregateFunction) -> Self {
        Self {
            column: column.into(),
            function: Some(function),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name of the column this aggregate writes. A blank alias is ignored.
    pub fn output_name(&self) -> &str {
        self.alias
            .as_deref()
            .filter(|alias| !alias.trim().is_empty())
            .unwrap_or(&self.column)
    }
}

/// Group settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupStage {
    /// One to three key columns, any type.
    #[serde(default, alias = "columns")]
    pub group_columns: Vec<String>,

    #[serde(default, alias = "aggregateData")]
    pub aggregates: Vec<AggregateSpec>,
}

impl GroupStage {
    pub fn new<I, S>(group_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_columns: group_columns.into_iter().map(Into::into).collect(),
            aggregates: Vec::new(),
        }
    }

    pub fn aggregate(mut self, column: impl Into<String>, function: AggregateFunction) -> Self {
        self.aggregates.push(AggregateSpec::new(column, function));
        self
    }

    pub fn aggregate_as(
        mut self,
        column: impl Into<String>,
        function: AggregateFunction,
        alias: impl Into<String>,
    ) -> Self {
        self.aggregates
            .push(AggregateSpec::new(column, function).with_alias(alias));
        self
    }
}

impl fmt::Display for GroupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let aggregates: Vec<String> = self
            .aggregates
            .iter()
            .map(|a| {
                let function = a.function.map_or("?", |func| func.name());
                match &a.alias {
                    Some(alias) => format!("{} - {} as {}", a.column, function, alias),
                    None => format!("{} - {}", a.column, function),
                }
            })
            .collect();
        write!(f, "{}: {}", self.group_columns.join(", "), aggregates.join(", "))
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A small pipeline over a sales table, as a starting point for stage files.
pub fn example_stages() -> Vec<Stage> {
    vec![
        FilterStage::absolute("sales", FilterOperator::GreaterThan, "0").into(),
        SortStage::by("region", SortDirection::Ascending)
            .then("sales", SortDirection::Descending)
            .into(),
        GroupStage::new(["region"])
            .aggregate("sales", AggregateFunction::Sum)
            .aggregate_as("sales", AggregateFunction::Count, "count")
            .into(),
    ]
}

/// Human-readable list of the filter operators per column type and the
/// aggregate functions.
pub fn operators_description() -> String {
    let mut out = String::from("Filter operators:\n");
    for ty in ColumnType::ALL {
        let labels: Vec<&str> = ty.operators().iter().map(|op| op.label()).collect();
        out.push_str(&format!("  {:<8} {}\n", ty.name(), labels.join(", ")));
    }
    out.push_str("\nAggregate functions (number columns):\n");
    let functions: Vec<&str> = AggregateFunction::ALL.iter().map(|f| f.name()).collect();
    out.push_str(&format!("  {}\n", functions.join(", ")));
    out
}
