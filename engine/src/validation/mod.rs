//! Semantic validation of stage configurations.
//!
//! Every stage is checked against the dataset it will run on before it is
//! allowed to run. A successful check yields a *plan*: the configuration with
//! column names resolved to positions and literals parsed, which the
//! evaluators in [`crate::transform`] execute without further checks.
//!
//! # Checks per stage
//!
//! | Stage  | Checks                                                              |
//! |--------|---------------------------------------------------------------------|
//! | Filter | column and operator chosen, column exists, operator legal for type, |
//! |        | literal parses (absolute) or other column exists with same type     |
//! | Sort   | 1..=max keys, no repeats, columns exist                              |
//! | Group  | 1..=max group columns, no repeats, columns exist, >= 1 aggregate,    |
//! |        | aggregates complete, on number columns, not on a group column        |
//!
//! # Example
//!
//! ```rust
//! use tabcraft::models::{Dataset, Header};
//! use tabcraft::transform::{SortDirection, SortStage};
//! use tabcraft::validation::validate_sort;
//! use tabcraft::{EngineConfig, StageError};
//!
//! let data = Dataset::new(vec![Header::number("a")], vec![]).unwrap();
//! let stage = SortStage::by("b", SortDirection::Ascending);
//! let err = validate_sort(&data, &stage, &EngineConfig::default()).unwrap_err();
//! assert_eq!(err, StageError::UnknownColumn { column: "b".into() });
//! ```

use std::collections::HashSet;

use crate::config::EngineConfig;
use crate::error::{StageError, StageResult};
use crate::models::{CellValue, ColumnType, Dataset, FilterOperator, Header};
use crate::transform::stage::{
    AggregateFunction, ComparisonMode, FilterStage, GroupStage, SortDirection, SortStage, Stage,
};

// =============================================================================
// Plans
// =============================================================================

/// A validated filter, ready to run against the dataset it was checked on.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPlan {
    pub(crate) column: usize,
    pub(crate) operator: FilterOperator,
    pub(crate) target: FilterTarget,
}

/// Right-hand side of a filter comparison.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FilterTarget {
    Literal(CellValue),
    Column(usize),
}

/// A validated sort: key positions with their directions.
#[derive(Debug, Clone, PartialEq)]
pub struct SortPlan {
    pub(crate) keys: Vec<(usize, SortDirection)>,
}

/// A validated group-by.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan {
    /// Positions of the group columns in the input.
    pub(crate) group_columns: Vec<usize>,
    /// Output headers: group columns, then distinct aggregate outputs.
    pub(crate) headers: Vec<Header>,
    pub(crate) aggregates: Vec<AggregatePlan>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AggregatePlan {
    /// Input column position.
    pub(crate) column: usize,
    pub(crate) function: AggregateFunction,
    /// Output column position.
    pub(crate) output: usize,
}

/// A validated stage of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum StagePlan {
    Filter(FilterPlan),
    Sort(SortPlan),
    Group(GroupPlan),
}

// =============================================================================
// Entry points
// =============================================================================

/// Check any stage against its input.
pub fn validate_stage(dataset: &Dataset, stage: &Stage, config: &EngineConfig) -> StageResult<StagePlan> {
    match stage {
        Stage::Filter(s) => validate_filter(dataset, s).map(StagePlan::Filter),
        Stage::Sort(s) => validate_sort(dataset, s, config).map(StagePlan::Sort),
        Stage::Group(s) => validate_group(dataset, s, config).map(StagePlan::Group),
    }
}

/// Check a filter stage.
///
/// # Returns
/// * `Ok(plan)` with the comparison value resolved
/// * `Err(StageError)` naming the first problem found
pub fn validate_filter(dataset: &Dataset, stage: &FilterStage) -> StageResult<FilterPlan> {
    if is_blank(&stage.column) {
        return Err(incomplete("no filter column selected"));
    }
    let operator = stage
        .operator
        .ok_or_else(|| incomplete("no filter operator chosen"))?;
    if is_blank(&stage.compare_value) {
        return Err(incomplete(match stage.mode {
            ComparisonMode::Absolute => "no comparison value entered",
            ComparisonMode::Relative => "no comparison column selected",
        }));
    }

    let column = resolve(dataset, &stage.column)?;
    let column_type = dataset.headers()[column].column_type;
    if !operator.applies_to(column_type) {
        return Err(StageError::TypeMismatch {
            column: stage.column.clone(),
            message: format!("operator '{}' is not available for {} columns", operator, column_type),
        });
    }

    let target = match stage.mode {
        ComparisonMode::Absolute => {
            let literal = column_type.parse_literal(&stage.compare_value).ok_or_else(|| {
                StageError::UnparseableLiteral {
                    column: stage.column.clone(),
                    expected: column_type,
                    value: stage.compare_value.clone(),
                }
            })?;
            FilterTarget::Literal(literal)
        }
        ComparisonMode::Relative => {
            let other = resolve(dataset, &stage.compare_value)?;
            let other_type = dataset.headers()[other].column_type;
            if other_type != column_type {
                return Err(StageError::TypeMismatch {
                    column: stage.compare_value.clone(),
                    message: format!(
                        "cannot compare {} column '{}' with {} column '{}'",
                        column_type, stage.column, other_type, stage.compare_value
                    ),
                });
            }
            FilterTarget::Column(other)
        }
    };

    Ok(FilterPlan {
        column,
        operator,
        target,
    })
}

/// Check a sort stage.
pub fn validate_sort(dataset: &Dataset, stage: &SortStage, config: &EngineConfig) -> StageResult<SortPlan> {
    if stage.keys.is_empty() || stage.keys.iter().any(|k| is_blank(&k.column)) {
        return Err(incomplete("select a column for every sort key"));
    }
    if stage.keys.len() > config.max_sort_keys {
        return Err(StageError::LimitExceeded {
            what: "sort keys",
            limit: config.max_sort_keys,
            found: stage.keys.len(),
        });
    }
    reject_duplicates(stage.keys.iter().map(|k| k.column.as_str()))?;

    let keys = stage
        .keys
        .iter()
        .map(|k| resolve(dataset, &k.column).map(|index| (index, k.direction)))
        .collect::<StageResult<Vec<_>>>()?;
    Ok(SortPlan { keys })
}

/// Check a group stage.
///
/// Blank group column slots are ignored, as an unselected dropdown would be.
pub fn validate_group(dataset: &Dataset, stage: &GroupStage, config: &EngineConfig) -> StageResult<GroupPlan> {
    let names: Vec<&str> = stage
        .group_columns
        .iter()
        .map(String::as_str)
        .filter(|c| !is_blank(c))
        .collect();
    if names.is_empty() {
        return Err(incomplete("select at least one column to group by"));
    }
    if names.len() > config.max_group_columns {
        return Err(StageError::LimitExceeded {
            what: "group columns",
            limit: config.max_group_columns,
            found: names.len(),
        });
    }
    reject_duplicates(names.iter().copied())?;
    let group_columns = names
        .iter()
        .map(|name| resolve(dataset, name))
        .collect::<StageResult<Vec<_>>>()?;

    if stage.aggregates.is_empty() {
        return Err(incomplete("add at least one aggregate"));
    }

    let mut headers: Vec<Header> = group_columns
        .iter()
        .map(|&i| dataset.headers()[i].clone())
        .collect();
    let mut aggregates = Vec::with_capacity(stage.aggregates.len());

    for spec in &stage.aggregates {
        let function = match spec.function {
            Some(f) if !is_blank(&spec.column) => f,
            _ => return Err(incomplete("fill all aggregates")),
        };
        let column = resolve(dataset, &spec.column)?;
        if dataset.headers()[column].column_type != ColumnType::Number {
            return Err(StageError::TypeMismatch {
                column: spec.column.clone(),
                message: format!(
                    "{} needs a number column, '{}' is {}",
                    function.name(),
                    spec.column,
                    dataset.headers()[column].column_type
                ),
            });
        }
        if names.contains(&spec.column.as_str()) {
            return Err(StageError::DuplicateColumns {
                columns: vec![spec.column.clone()],
            });
        }

        let output_name = spec.output_name();
        if names.contains(&output_name) {
            return Err(StageError::DuplicateColumns {
                columns: vec![output_name.to_string()],
            });
        }
        // Repeated output names share one column; the later aggregate wins.
        let output = match headers.iter().position(|h| h.name == output_name) {
            Some(existing) => existing,
            None => {
                headers.push(Header::number(output_name));
                headers.len() - 1
            }
        };
        aggregates.push(AggregatePlan {
            column,
            function,
            output,
        });
    }

    Ok(GroupPlan {
        group_columns,
        headers,
        aggregates,
    })
}

// =============================================================================
// Helpers
// =============================================================================

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn incomplete(message: &str) -> StageError {
    StageError::IncompleteConfiguration(message.to_string())
}

fn resolve(dataset: &Dataset, column: &str) -> StageResult<usize> {
    dataset
        .column_index(column)
        .ok_or_else(|| StageError::UnknownColumn {
            column: column.to_string(),
        })
}

fn reject_duplicates<'a>(names: impl Iterator<Item = &'a str>) -> StageResult<()> {
    let mut seen = HashSet::new();
    let mut repeated: Vec<String> = Vec::new();
    for name in names {
        if !seen.insert(name) && !repeated.iter().any(|r| r == name) {
            repeated.push(name.to_string());
        }
    }
    if repeated.is_empty() {
        Ok(())
    } else {
        Err(StageError::DuplicateColumns { columns: repeated })
    }
}
