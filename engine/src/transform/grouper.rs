//! Group rows by key columns and aggregate number columns.
//!
//! # Architecture
//!
//! ```text
//! Input rows                         Output rows (first-seen order)
//! ┌──────────────────────────┐       ┌───────────────────────────────┐
//! │ region: E, sales: 10     │       │ region: E, sales: 30, count: 2│
//! │ region: E, sales: 20     │  →    ├───────────────────────────────┤
//! │ region: W, sales: 5      │       │ region: W, sales: 5,  count: 1│
//! └──────────────────────────┘       └───────────────────────────────┘
//! ```
//!
//! A single pass builds one [`GroupBuilder`] per distinct key, found through a
//! hash map from the key tuple to the builder's position. Builders keep their
//! first-seen order, so the output needs no sort.
//!
//! # Aggregates
//!
//! - `sum`: sum of non-null values, `0` for a group with none
//! - `avg`: sum divided by the count of non-null values, `null` if there are none
//! - `count`: number of rows in the group, whatever the column holds
//! - `min` / `max`: over non-null values, `null` if there are none
//!
//! A `sum` or `avg` that overflows the number range is `null`.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::error::StageResult;
use crate::models::{CellValue, Dataset, Row};
use crate::validation::{validate_group, AggregatePlan, GroupPlan};

use super::stage::{AggregateFunction, GroupStage};

/// Group `dataset` as configured by `stage`, with default limits.
pub fn evaluate_group(dataset: &Dataset, stage: &GroupStage) -> StageResult<Dataset> {
    evaluate_group_with(dataset, stage, &EngineConfig::default())
}

/// Group `dataset` as configured by `stage`.
///
/// Output headers are the group columns followed by the aggregate outputs;
/// output rows are one per distinct key, in the order keys first appear.
pub fn evaluate_group_with(
    dataset: &Dataset,
    stage: &GroupStage,
    config: &EngineConfig,
) -> StageResult<Dataset> {
    let plan = validate_group(dataset, stage, config)?;
    Ok(run_group(dataset, &plan))
}

pub(crate) fn run_group(dataset: &Dataset, plan: &GroupPlan) -> Dataset {
    let mut positions: HashMap<GroupKey<'_>, usize> = HashMap::new();
    let mut groups: Vec<GroupBuilder<'_>> = Vec::new();

    for row in dataset.rows() {
        let key = GroupKey::of(row, &plan.group_columns);
        let index = *positions.entry(key).or_insert_with(|| {
            groups.push(GroupBuilder::new(row, plan));
            groups.len() - 1
        });
        groups[index].add_row(row, plan);
    }

    let rows = groups.into_iter().map(|g| g.build(plan)).collect();
    Dataset::assemble(plan.headers.clone(), rows)
}

// =============================================================================
// Group key
// =============================================================================

/// Hashable view of one key cell. Numbers compare by value (`-0.0 == 0.0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart<'a> {
    Null,
    Text(&'a str),
    Number(u64),
    Date(NaiveDateTime),
}

impl<'a> KeyPart<'a> {
    fn of(cell: &'a CellValue) -> Self {
        match cell {
            CellValue::Null => Self::Null,
            CellValue::String(s) => Self::Text(s),
            CellValue::Number(v) => {
                let v = if *v == 0.0 { 0.0 } else { *v };
                Self::Number(v.to_bits())
            }
            CellValue::Date(d) => Self::Date(*d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey<'a>(Vec<KeyPart<'a>>);

impl<'a> GroupKey<'a> {
    fn of(row: &'a Row, columns: &[usize]) -> Self {
        Self(columns.iter().map(|&i| KeyPart::of(row.cell(i))).collect())
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Running state of one aggregate within one group.
#[derive(Debug, Clone, Default)]
struct Accumulator {
    sum: f64,
    values: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.values += 1;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    fn finish(&self, function: AggregateFunction, rows: usize) -> CellValue {
        match function {
            AggregateFunction::Sum => finite(self.sum),
            AggregateFunction::Average => {
                if self.values == 0 {
                    CellValue::Null
                } else {
                    finite(self.sum / self.values as f64)
                }
            }
            AggregateFunction::Count => CellValue::Number(rows as f64),
            AggregateFunction::Min => self.min.into(),
            AggregateFunction::Max => self.max.into(),
        }
    }
}

/// A sum that overflowed has no number to show.
fn finite(value: f64) -> CellValue {
    if value.is_finite() {
        CellValue::Number(value)
    } else {
        CellValue::Null
    }
}

/// Builder for accumulating one group's aggregates.
struct GroupBuilder<'a> {
    /// The first row seen for this key; supplies the key cells.
    first: &'a Row,
    rows: usize,
    accumulators: Vec<Accumulator>,
}

impl<'a> GroupBuilder<'a> {
    fn new(first: &'a Row, plan: &GroupPlan) -> Self {
        Self {
            first,
            rows: 0,
            accumulators: vec![Accumulator::default(); plan.aggregates.len()],
        }
    }

    fn add_row(&mut self, row: &Row, plan: &GroupPlan) {
        self.rows += 1;
        for (acc, aggregate) in self.accumulators.iter_mut().zip(&plan.aggregates) {
            if let Some(value) = row.cell(aggregate.column).as_number() {
                acc.add(value);
            }
        }
    }

    fn build(self, plan: &GroupPlan) -> Row {
        let mut cells = vec![CellValue::Null; plan.headers.len()];
        for (slot, &column) in cells.iter_mut().zip(&plan.group_columns) {
            *slot = self.first.cell(column).clone();
        }
        // Later aggregates overwrite earlier ones writing the same output.
        for (acc, AggregatePlan { function, output, .. }) in
            self.accumulators.iter().zip(&plan.aggregates)
        {
            cells[*output] = acc.finish(*function, self.rows);
        }
        Row::new(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::models::{ColumnType, Header};

    fn regions() -> Dataset {
        Dataset::new(
            vec![Header::string("region"), Header::number("sales")],
            vec![
                Row::new(vec!["E".into(), 10.0.into()]),
                Row::new(vec!["E".into(), 20.0.into()]),
                Row::new(vec!["W".into(), 5.0.into()]),
            ],
        )
        .unwrap()
    }

    fn json(data: &Dataset) -> serde_json::Value {
        serde_json::to_value(data).unwrap()["rows"].clone()
    }

    #[test]
    fn test_sum_and_count_in_first_seen_order() {
        let stage = GroupStage::new(["region"])
            .aggregate("sales", AggregateFunction::Sum)
            .aggregate_as("sales", AggregateFunction::Count, "count");
        let out = evaluate_group(&regions(), &stage).unwrap();
        assert_eq!(out.header_names(), vec!["region", "sales", "count"]);
        assert_eq!(
            json(&out),
            serde_json::json!([
                { "region": "E", "sales": 30.0, "count": 2.0 },
                { "region": "W", "sales": 5.0, "count": 1.0 }
            ])
        );
    }

    #[test]
    fn test_first_seen_order_is_not_sorted() {
        let data = Dataset::new(
            vec![Header::string("k"), Header::number("v")],
            vec![
                Row::new(vec!["z".into(), 1.0.into()]),
                Row::new(vec!["a".into(), 1.0.into()]),
                Row::new(vec!["z".into(), 1.0.into()]),
                Row::new(vec!["m".into(), 1.0.into()]),
            ],
        )
        .unwrap();
        let out = evaluate_group(&data, &GroupStage::new(["k"]).aggregate("v", AggregateFunction::Sum)).unwrap();
        let keys: Vec<String> = out.column_values("k").unwrap().iter().map(|v| v.to_string()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_average_skips_nulls() {
        let data = Dataset::new(
            vec![Header::string("g"), Header::number("v")],
            vec![
                Row::new(vec!["x".into(), 5.0.into()]),
                Row::new(vec!["x".into(), CellValue::Null]),
                Row::new(vec!["x".into(), 15.0.into()]),
            ],
        )
        .unwrap();
        let out = evaluate_group(&data, &GroupStage::new(["g"]).aggregate("v", AggregateFunction::Average)).unwrap();
        assert_eq!(out.value(0, "v"), Some(&CellValue::Number(10.0)));

        let count = evaluate_group(&data, &GroupStage::new(["g"]).aggregate("v", AggregateFunction::Count)).unwrap();
        assert_eq!(count.value(0, "v"), Some(&CellValue::Number(3.0)));
    }

    #[test]
    fn test_all_null_group() {
        let data = Dataset::new(
            vec![Header::string("g"), Header::number("v")],
            vec![Row::new(vec!["x".into(), CellValue::Null])],
        )
        .unwrap();
        for (function, expected) in [
            (AggregateFunction::Min, CellValue::Null),
            (AggregateFunction::Max, CellValue::Null),
            (AggregateFunction::Average, CellValue::Null),
            (AggregateFunction::Sum, CellValue::Number(0.0)),
            (AggregateFunction::Count, CellValue::Number(1.0)),
        ] {
            let out = evaluate_group(&data, &GroupStage::new(["g"]).aggregate("v", function)).unwrap();
            assert_eq!(out.value(0, "v"), Some(&expected), "{:?}", function);
        }
    }

    #[test]
    fn test_min_max_and_multiple_keys() {
        let data = Dataset::new(
            vec![Header::string("a"), Header::number("b"), Header::number("v"), Header::number("w")],
            vec![
                Row::new(vec!["x".into(), 1.0.into(), 3.0.into(), 1.0.into()]),
                Row::new(vec!["x".into(), 2.0.into(), 4.0.into(), 1.0.into()]),
                Row::new(vec!["x".into(), 1.0.into(), (-2.0).into(), 1.0.into()]),
                Row::new(vec![CellValue::Null, 1.0.into(), 7.0.into(), 1.0.into()]),
            ],
        )
        .unwrap();
        let stage = GroupStage::new(["a", "b"])
            .aggregate("v", AggregateFunction::Min)
            .aggregate_as("v", AggregateFunction::Max, "v_max")
            .aggregate("w", AggregateFunction::Sum);
        let out = evaluate_group(&data, &stage).unwrap();
        assert_eq!(out.row_count(), 3);
        assert_eq!(
            json(&out),
            serde_json::json!([
                { "a": "x", "b": 1.0, "v": -2.0, "v_max": 3.0, "w": 2.0 },
                { "a": "x", "b": 2.0, "v": 4.0, "v_max": 4.0, "w": 1.0 },
                { "a": null, "b": 1.0, "v": 7.0, "v_max": 7.0, "w": 1.0 }
            ])
        );
        assert_eq!(out.column_type("b"), Some(ColumnType::Number));
    }

    #[test]
    fn test_overflowing_sum_is_null() {
        let data = Dataset::new(
            vec![Header::string("g"), Header::number("v")],
            vec![
                Row::new(vec!["x".into(), f64::MAX.into()]),
                Row::new(vec!["x".into(), f64::MAX.into()]),
            ],
        )
        .unwrap();
        let stage = GroupStage::new(["g"])
            .aggregate("v", AggregateFunction::Sum)
            .aggregate_as("v", AggregateFunction::Average, "avg")
            .aggregate_as("v", AggregateFunction::Max, "max");
        let out = evaluate_group(&data, &stage).unwrap();
        assert_eq!(out.value(0, "v"), Some(&CellValue::Null));
        assert_eq!(out.value(0, "avg"), Some(&CellValue::Null));
        assert_eq!(out.value(0, "max"), Some(&CellValue::Number(f64::MAX)));
    }

    #[test]
    fn test_duplicate_output_overwrites() {
        let stage = GroupStage::new(["region"])
            .aggregate("sales", AggregateFunction::Sum)
            .aggregate("sales", AggregateFunction::Max);
        let out = evaluate_group(&regions(), &stage).unwrap();
        assert_eq!(out.header_names(), vec!["region", "sales"]);
        assert_eq!(out.value(0, "sales"), Some(&CellValue::Number(20.0)));
    }

    #[test]
    fn test_counts_partition_input() {
        let stage = GroupStage::new(["region"]).aggregate("sales", AggregateFunction::Count);
        let out = evaluate_group(&regions(), &stage).unwrap();
        let total: f64 = out
            .column_values("sales")
            .unwrap()
            .iter()
            .filter_map(|v| v.as_number())
            .sum();
        assert_eq!(total as usize, regions().row_count());
    }

    #[test]
    fn test_zero_keys_are_equal() {
        let data = Dataset::new(
            vec![Header::number("k"), Header::number("v")],
            vec![
                Row::new(vec![0.0.into(), 1.0.into()]),
                Row::new(vec![(-0.0).into(), 1.0.into()]),
            ],
        )
        .unwrap();
        let out = evaluate_group(&data, &GroupStage::new(["k"]).aggregate("v", AggregateFunction::Count)).unwrap();
        assert_eq!(out.row_count(), 1);
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        let data = Dataset::new(vec![Header::string("region"), Header::number("sales")], vec![]).unwrap();
        let out = evaluate_group(&data, &GroupStage::new(["region"]).aggregate("sales", AggregateFunction::Sum)).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.header_names(), vec!["region", "sales"]);
    }

    #[test]
    fn test_aggregate_must_be_number() {
        let stage = GroupStage::new(["sales"]).aggregate("region", AggregateFunction::Count);
        assert!(matches!(
            evaluate_group(&regions(), &stage),
            Err(StageError::TypeMismatch { .. })
        ));
    }
}
