//! Session: the single owner of a source dataset, its pipeline, and the
//! transformed dataset shown to consumers.
//!
//! All mutations go through `&mut Session`, so they are serialized by
//! construction.

use std::sync::Arc;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::PipelineResult;
use crate::logs::log_info;
use crate::models::Dataset;
use crate::transform::{Pipeline, Stage};

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    source: Arc<Dataset>,
    pipeline: Pipeline,
    transformed: Arc<Dataset>,
}

impl Session {
    pub fn new(source: Dataset) -> Self {
        Self::with_config(source, EngineConfig::default())
    }

    pub fn with_config(source: Dataset, config: EngineConfig) -> Self {
        let source = Arc::new(source);
        let id = Uuid::new_v4();
        log_info(format!(
            "Session {} opened: {} rows, {} columns",
            id,
            source.row_count(),
            source.column_count()
        ));
        Self {
            id,
            pipeline: Pipeline::with_config(Arc::clone(&source), config),
            transformed: Arc::clone(&source),
            source,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &Arc<Dataset> {
        &self.source
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The dataset consumers see: the source until a pipeline is applied.
    pub fn transformed(&self) -> &Arc<Dataset> {
        &self.transformed
    }

    /// Replace the source. The pipeline is discarded.
    pub fn set_source(&mut self, source: Dataset) {
        let config = self.pipeline.config().clone();
        self.source = Arc::new(source);
        self.pipeline = Pipeline::with_config(Arc::clone(&self.source), config);
        self.transformed = Arc::clone(&self.source);
        log_info(format!(
            "Session {}: new source with {} rows, pipeline discarded",
            self.id,
            self.source.row_count()
        ));
    }

    /// Add an empty stage after stage `after`.
    pub fn append(&mut self, after: usize) -> PipelineResult<usize> {
        self.pipeline.append_after(after)
    }

    /// Configure and evaluate stage `index`.
    pub fn edit(&mut self, index: usize, stage: Stage) -> PipelineResult<Arc<Dataset>> {
        self.pipeline.edit(index, stage)
    }

    pub fn delete(&mut self, index: usize) -> PipelineResult<bool> {
        self.pipeline.delete(index)
    }

    /// Apply the pipeline and publish its output as the transformed dataset.
    pub fn apply(&mut self) -> PipelineResult<Arc<Dataset>> {
        let output = self.pipeline.apply_pipeline()?;
        self.transformed = Arc::clone(&output);
        Ok(output)
    }

    /// Reset the pipeline; the transformed dataset reverts to the source.
    pub fn reset(&mut self) {
        self.pipeline.reset();
        self.transformed = Arc::clone(&self.source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::models::{FilterOperator, Header, Row};
    use crate::transform::FilterStage;

    fn numbers(values: &[f64]) -> Dataset {
        Dataset::new(
            vec![Header::number("n")],
            values.iter().map(|&v| Row::new(vec![v.into()])).collect(),
        )
        .unwrap()
    }

    fn positive() -> Stage {
        FilterStage::absolute("n", FilterOperator::GreaterThan, "0").into()
    }

    #[test]
    fn test_transformed_starts_as_source() {
        let session = Session::new(numbers(&[1.0, -1.0]));
        assert!(Arc::ptr_eq(session.transformed(), session.source()));
    }

    #[test]
    fn test_apply_publishes_output() {
        let mut session = Session::new(numbers(&[1.0, -1.0, 2.0]));
        session.edit(0, positive()).unwrap();
        // Not published until applied.
        assert_eq!(session.transformed().row_count(), 3);

        session.apply().unwrap();
        assert_eq!(session.transformed().row_count(), 2);
    }

    #[test]
    fn test_failed_apply_keeps_transformed() {
        let mut session = Session::new(numbers(&[1.0, -1.0]));
        session.edit(0, positive()).unwrap();
        session.append(0).unwrap();
        assert_eq!(
            session.apply(),
            Err(PipelineError::PipelineStageGap { index: 1 })
        );
        assert!(Arc::ptr_eq(session.transformed(), session.source()));
    }

    #[test]
    fn test_reset_reverts_to_source() {
        let mut session = Session::new(numbers(&[1.0, -1.0]));
        session.edit(0, positive()).unwrap();
        session.apply().unwrap();
        session.reset();
        assert_eq!(session.pipeline().len(), 1);
        assert!(Arc::ptr_eq(session.transformed(), session.source()));
    }

    #[test]
    fn test_new_source_discards_pipeline() {
        let mut session = Session::new(numbers(&[1.0]));
        session.edit(0, positive()).unwrap();
        session.apply().unwrap();

        session.set_source(numbers(&[5.0, 6.0]));
        assert_eq!(session.pipeline().len(), 1);
        assert!(session.pipeline().output().is_none());
        assert_eq!(session.transformed().row_count(), 2);
        assert!(session.pipeline().is_chained());
    }

    #[test]
    fn test_ids_differ() {
        assert_ne!(Session::new(numbers(&[])).id(), Session::new(numbers(&[])).id());
    }
}
