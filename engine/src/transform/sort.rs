//! Sort stage evaluator.

use std::cmp::Ordering;

use crate::config::EngineConfig;
use crate::error::StageResult;
use crate::models::{Dataset, Row};
use crate::validation::{validate_sort, SortPlan};

use super::stage::{SortDirection, SortStage};

/// Reorder the rows of `dataset` by the keys of `stage`, with default limits.
pub fn evaluate_sort(dataset: &Dataset, stage: &SortStage) -> StageResult<Dataset> {
    evaluate_sort_with(dataset, stage, &EngineConfig::default())
}

/// Reorder the rows of `dataset` by the keys of `stage`.
///
/// The sort is stable: rows equal on every key keep their input order. Each
/// key compares with its column's native ordering, nulls first; a descending
/// key reverses only its own comparison.
pub fn evaluate_sort_with(
    dataset: &Dataset,
    stage: &SortStage,
    config: &EngineConfig,
) -> StageResult<Dataset> {
    let plan = validate_sort(dataset, stage, config)?;
    Ok(run_sort(dataset, &plan))
}

pub(crate) fn run_sort(dataset: &Dataset, plan: &SortPlan) -> Dataset {
    let mut rows: Vec<Row> = dataset.rows().to_vec();
    // `sort_by` is stable.
    rows.sort_by(|a, b| compare_rows(a, b, &plan.keys));
    dataset.with_rows(rows)
}

fn compare_rows(a: &Row, b: &Row, keys: &[(usize, SortDirection)]) -> Ordering {
    for &(index, direction) in keys {
        let ord = a.cell(index).sort_cmp(b.cell(index));
        if ord != Ordering::Equal {
            return match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            };
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::models::{parse_date, CellValue, Header};

    fn rows(data: &Dataset) -> Vec<Vec<String>> {
        data.rows()
            .iter()
            .map(|r| r.cells().iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn pairs(values: &[(f64, f64)]) -> Dataset {
        Dataset::new(
            vec![Header::number("a"), Header::number("b")],
            values
                .iter()
                .map(|&(a, b)| Row::new(vec![a.into(), b.into()]))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_ties_broken_by_second_key() {
        let data = pairs(&[(2.0, 1.0), (1.0, 2.0), (1.0, 1.0)]);
        let stage = SortStage::by("a", SortDirection::Ascending).then("b", SortDirection::Ascending);
        let out = evaluate_sort(&data, &stage).unwrap();
        assert_eq!(out, pairs(&[(1.0, 1.0), (1.0, 2.0), (2.0, 1.0)]));
    }

    #[test]
    fn test_stable_for_equal_keys() {
        let data = Dataset::new(
            vec![Header::number("a"), Header::string("b")],
            vec![
                Row::new(vec![1.0.into(), "x".into()]),
                Row::new(vec![1.0.into(), "y".into()]),
                Row::new(vec![0.0.into(), "z".into()]),
            ],
        )
        .unwrap();
        let out = evaluate_sort(&data, &SortStage::by("a", SortDirection::Ascending)).unwrap();
        assert_eq!(
            rows(&out),
            vec![vec!["0", "z"], vec!["1", "x"], vec!["1", "y"]]
        );

        let out = evaluate_sort(&data, &SortStage::by("a", SortDirection::Descending)).unwrap();
        assert_eq!(
            rows(&out),
            vec![vec!["1", "x"], vec!["1", "y"], vec!["0", "z"]]
        );
    }

    #[test]
    fn test_descending_applies_per_key() {
        let data = pairs(&[(1.0, 1.0), (2.0, 5.0), (1.0, 3.0)]);
        let stage = SortStage::by("a", SortDirection::Descending).then("b", SortDirection::Ascending);
        let out = evaluate_sort(&data, &stage).unwrap();
        assert_eq!(out, pairs(&[(2.0, 5.0), (1.0, 1.0), (1.0, 3.0)]));
    }

    #[test]
    fn test_nulls_first_ascending_last_descending() {
        let data = Dataset::new(
            vec![Header::number("n")],
            vec![
                Row::new(vec![5.0.into()]),
                Row::new(vec![CellValue::Null]),
                Row::new(vec![(-1.0).into()]),
            ],
        )
        .unwrap();
        let asc = evaluate_sort(&data, &SortStage::by("n", SortDirection::Ascending)).unwrap();
        assert_eq!(rows(&asc), vec![vec!["null"], vec!["-1"], vec!["5"]]);
        let desc = evaluate_sort(&data, &SortStage::by("n", SortDirection::Descending)).unwrap();
        assert_eq!(rows(&desc), vec![vec!["5"], vec!["-1"], vec!["null"]]);
    }

    #[test]
    fn test_native_ordering_per_type() {
        let data = Dataset::new(
            vec![Header::string("s"), Header::date("d")],
            vec![
                Row::new(vec!["b".into(), CellValue::Date(parse_date("2024-01-02").unwrap())]),
                Row::new(vec!["B".into(), CellValue::Date(parse_date("2023-12-31").unwrap())]),
                Row::new(vec!["a".into(), CellValue::Date(parse_date("2024-01-01").unwrap())]),
            ],
        )
        .unwrap();
        let by_text = evaluate_sort(&data, &SortStage::by("s", SortDirection::Ascending)).unwrap();
        let first: Vec<String> = rows(&by_text).into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(first, vec!["B", "a", "b"]);

        let by_date = evaluate_sort(&data, &SortStage::by("d", SortDirection::Ascending)).unwrap();
        let first: Vec<String> = rows(&by_date).into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(first, vec!["B", "a", "b"]);
    }

    #[test]
    fn test_input_untouched() {
        let data = pairs(&[(3.0, 0.0), (1.0, 0.0)]);
        let before = data.clone();
        let _ = evaluate_sort(&data, &SortStage::by("a", SortDirection::Ascending)).unwrap();
        assert_eq!(data, before);
    }

    #[test]
    fn test_rejects_duplicate_keys() {
        let data = pairs(&[(1.0, 1.0)]);
        let stage = SortStage::by("a", SortDirection::Ascending).then("a", SortDirection::Descending);
        assert!(matches!(
            evaluate_sort(&data, &stage),
            Err(StageError::DuplicateColumns { .. })
        ));
    }
}
