//! Filter stage evaluator.

use crate::error::StageResult;
use crate::models::{CellValue, Dataset, Row};
use crate::validation::{validate_filter, FilterPlan, FilterTarget};

use super::stage::FilterStage;

/// Keep the rows of `dataset` that satisfy `stage`.
///
/// Headers are unchanged and the input is not modified. Fails without
/// evaluating anything if the stage does not validate against `dataset`.
pub fn evaluate_filter(dataset: &Dataset, stage: &FilterStage) -> StageResult<Dataset> {
    let plan = validate_filter(dataset, stage)?;
    Ok(run_filter(dataset, &plan))
}

pub(crate) fn run_filter(dataset: &Dataset, plan: &FilterPlan) -> Dataset {
    let rows: Vec<Row> = dataset
        .rows()
        .iter()
        .filter(|row| plan.matches(row))
        .cloned()
        .collect();
    dataset.with_rows(rows)
}

impl FilterPlan {
    /// Test one row of the dataset this plan was validated against.
    pub(crate) fn matches(&self, row: &Row) -> bool {
        let target: &CellValue = match &self.target {
            FilterTarget::Literal(value) => value,
            FilterTarget::Column(index) => row.cell(*index),
        };
        self.operator.test(row.cell(self.column), target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::models::{parse_date, FilterOperator, Header};

    fn products() -> Dataset {
        Dataset::new(
            vec![
                Header::string("name"),
                Header::number("price"),
                Header::number("cost"),
                Header::date("launched"),
            ],
            vec![
                Row::new(vec!["apple".into(), 3.0.into(), 1.0.into(), date("2023-05-01 09:00:00")]),
                Row::new(vec!["banana".into(), 1.0.into(), 2.0.into(), date("2023-06-15")]),
                Row::new(vec!["cherry".into(), CellValue::Null, 4.0.into(), CellValue::Null]),
                Row::new(vec![CellValue::Null, 10.0.into(), 10.0.into(), date("2024-01-01")]),
            ],
        )
        .unwrap()
    }

    fn date(text: &str) -> CellValue {
        CellValue::Date(parse_date(text).unwrap())
    }

    fn names(data: &Dataset) -> Vec<String> {
        data.column_values("name")
            .unwrap()
            .into_iter()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn test_number_greater_than() {
        let stage = FilterStage::absolute("price", FilterOperator::GreaterThan, "2");
        let out = evaluate_filter(&products(), &stage).unwrap();
        assert_eq!(names(&out), vec!["apple", "null"]);
        assert_eq!(out.headers(), products().headers());
    }

    #[test]
    fn test_null_cells_for_equal_and_not_equal() {
        let equal = FilterStage::absolute("price", FilterOperator::Equal, "3");
        assert_eq!(names(&evaluate_filter(&products(), &equal).unwrap()), vec!["apple"]);

        let not_equal = FilterStage::absolute("price", FilterOperator::NotEqual, "3");
        assert_eq!(
            names(&evaluate_filter(&products(), &not_equal).unwrap()),
            vec!["banana", "cherry", "null"]
        );
    }

    #[test]
    fn test_string_contains() {
        let stage = FilterStage::absolute("name", FilterOperator::Contains, "an");
        assert_eq!(names(&evaluate_filter(&products(), &stage).unwrap()), vec!["banana"]);

        let stage = FilterStage::absolute("name", FilterOperator::NotContains, "an");
        assert_eq!(names(&evaluate_filter(&products(), &stage).unwrap()), vec!["apple", "cherry"]);
    }

    #[test]
    fn test_relative_compares_within_row() {
        let stage = FilterStage::relative("price", FilterOperator::GreaterThanOrEqual, "cost");
        assert_eq!(names(&evaluate_filter(&products(), &stage).unwrap()), vec!["apple", "null"]);
    }

    #[test]
    fn test_dates() {
        let on = FilterStage::absolute("launched", FilterOperator::On, "2023-05-01");
        assert_eq!(names(&evaluate_filter(&products(), &on).unwrap()), vec!["apple"]);

        let before = FilterStage::absolute("launched", FilterOperator::Before, "2023-05-01 10:00:00");
        assert_eq!(names(&evaluate_filter(&products(), &before).unwrap()), vec!["apple"]);

        let after = FilterStage::absolute("launched", FilterOperator::After, "2023-05-01");
        assert_eq!(names(&evaluate_filter(&products(), &after).unwrap()), vec!["apple", "banana", "null"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let stage = FilterStage::absolute("cost", FilterOperator::LessThan, "5");
        let once = evaluate_filter(&products(), &stage).unwrap();
        let twice = evaluate_filter(&once, &stage).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_bad_literal_does_not_coerce() {
        let stage = FilterStage::absolute("price", FilterOperator::LessThan, "cheap");
        assert!(matches!(
            evaluate_filter(&products(), &stage),
            Err(StageError::UnparseableLiteral { .. })
        ));
    }
}
