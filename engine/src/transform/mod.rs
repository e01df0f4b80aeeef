//! Transformation module.
//!
//! - Stage: configuration types for filter, sort and group stages
//! - Filter, Sort, Grouper: pure evaluators, one dataset in, one dataset out
//! - Pipeline: the chain of stages, each fed by the previous one's output

pub mod filter;
pub mod grouper;
pub mod pipeline;
pub mod sort;
pub mod stage;

pub use filter::evaluate_filter;
pub use grouper::{evaluate_group, evaluate_group_with};
pub use pipeline::{Pipeline, Transformation, TransformationState};
pub use sort::{evaluate_sort, evaluate_sort_with};
pub use stage::*;

use crate::config::EngineConfig;
use crate::error::StageResult;
use crate::models::Dataset;
use crate::validation::{validate_stage, StagePlan};

/// Validate `stage` against `dataset` and evaluate it.
///
/// Either the whole stage evaluates or nothing does: validation runs first
/// and no evaluator sees a stage that failed it.
pub fn evaluate_stage(dataset: &Dataset, stage: &Stage, config: &EngineConfig) -> StageResult<Dataset> {
    let plan = validate_stage(dataset, stage, config)?;
    Ok(run_plan(dataset, &plan))
}

pub(crate) fn run_plan(dataset: &Dataset, plan: &StagePlan) -> Dataset {
    match plan {
        StagePlan::Filter(p) => filter::run_filter(dataset, p),
        StagePlan::Sort(p) => sort::run_sort(dataset, p),
        StagePlan::Group(p) => grouper::run_group(dataset, p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::models::{FilterOperator, Header, Row};

    fn sales() -> Dataset {
        Dataset::new(
            vec![Header::string("region"), Header::number("sales")],
            vec![
                Row::new(vec!["E".into(), 10.0.into()]),
                Row::new(vec!["W".into(), 5.0.into()]),
                Row::new(vec!["E".into(), 20.0.into()]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_dispatch_matches_direct_evaluators() {
        let config = EngineConfig::default();
        let filter = FilterStage::absolute("sales", FilterOperator::GreaterThan, "7");
        assert_eq!(
            evaluate_stage(&sales(), &filter.clone().into(), &config).unwrap(),
            evaluate_filter(&sales(), &filter).unwrap()
        );

        let sort = SortStage::by("sales", SortDirection::Descending);
        assert_eq!(
            evaluate_stage(&sales(), &sort.clone().into(), &config).unwrap(),
            evaluate_sort(&sales(), &sort).unwrap()
        );

        let group = GroupStage::new(["region"]).aggregate("sales", AggregateFunction::Sum);
        assert_eq!(
            evaluate_stage(&sales(), &group.clone().into(), &config).unwrap(),
            evaluate_group(&sales(), &group).unwrap()
        );
    }

    #[test]
    fn test_limits_come_from_config() {
        let config = EngineConfig {
            max_sort_keys: 1,
            ..EngineConfig::default()
        };
        let stage = Stage::from(
            SortStage::by("region", SortDirection::Ascending).then("sales", SortDirection::Ascending),
        );
        assert!(evaluate_stage(&sales(), &stage, &EngineConfig::default()).is_ok());
        assert_eq!(
            evaluate_stage(&sales(), &stage, &config),
            Err(StageError::LimitExceeded {
                what: "sort keys",
                limit: 1,
                found: 2
            })
        );
    }
}
