//! The transformation chain.
//!
//! A [`Pipeline`] is an ordered list of [`Transformation`]s. Stage 0 reads the
//! source dataset; every later stage reads the output of the stage before it,
//! by identity (the same `Arc`). Each transformation moves through
//!
//! ```text
//!   Empty ──configure──▶ Configured ──evaluate──▶ Evaluated
//!                           ▲                         │
//!                           └──────── configure ──────┘
//! ```
//!
//! Changing a stage's configuration truncates every stage after it, so no
//! stage ever holds an input that its predecessor no longer produces.
//!
//! # Example
//!
//! ```
//! use tabcraft::models::{Dataset, Header, Row};
//! use tabcraft::transform::{Pipeline, SortDirection, SortStage};
//!
//! let data = Dataset::new(
//!     vec![Header::number("n")],
//!     vec![Row::new(vec![2.0.into()]), Row::new(vec![1.0.into()])],
//! )
//! .unwrap();
//!
//! let mut pipeline = Pipeline::new(data);
//! pipeline.edit(0, SortStage::by("n", SortDirection::Ascending).into()).unwrap();
//! let out = pipeline.apply_pipeline().unwrap();
//! assert_eq!(out.value(0, "n").and_then(|v| v.as_number()), Some(1.0));
//! ```

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logs::{log_error_indent, log_info, log_success, log_success_indent, log_warning};
use crate::models::Dataset;
use crate::validation::validate_stage;

use super::run_plan;
use super::stage::Stage;

// =============================================================================
// Transformation
// =============================================================================

/// Lifecycle state of one transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformationState {
    /// No stage configured.
    Empty,
    /// Stage configured, no output yet.
    Configured,
    /// Output computed from the current input and configuration.
    Evaluated,
}

/// One element of the pipeline.
///
/// `output` is present only when it was computed from exactly the current
/// `stage` and `input`.
#[derive(Debug, Clone)]
pub struct Transformation {
    stage: Option<Stage>,
    input: Arc<Dataset>,
    output: Option<Arc<Dataset>>,
    applied: bool,
}

impl Transformation {
    fn empty(input: Arc<Dataset>) -> Self {
        Self {
            stage: None,
            input,
            output: None,
            applied: false,
        }
    }

    pub fn stage(&self) -> Option<&Stage> {
        self.stage.as_ref()
    }

    pub fn input(&self) -> &Arc<Dataset> {
        &self.input
    }

    pub fn output(&self) -> Option<&Arc<Dataset>> {
        self.output.as_ref()
    }

    /// Whether this stage is part of the applied pipeline.
    pub fn is_applied(&self) -> bool {
        self.applied
    }

    pub fn state(&self) -> TransformationState {
        match (&self.stage, &self.output) {
            (None, _) => TransformationState::Empty,
            (Some(_), None) => TransformationState::Configured,
            (Some(_), Some(_)) => TransformationState::Evaluated,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.state() == TransformationState::Evaluated
    }

    /// One-line description, with the output row count once evaluated.
    pub fn summary(&self) -> String {
        match (&self.stage, &self.output) {
            (None, _) => "Empty stage".to_string(),
            (Some(stage), None) => format!("{} (not evaluated)", stage),
            (Some(stage), Some(out)) => format!("{} ({} rows)", stage, out.row_count()),
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Ordered chain of transformations over one source dataset.
///
/// Never empty: it starts, and after `reset` returns to, a single empty
/// transformation seeded with the source.
#[derive(Debug, Clone)]
pub struct Pipeline {
    source: Arc<Dataset>,
    transformations: Vec<Transformation>,
    config: EngineConfig,
}

impl Pipeline {
    pub fn new(source: impl Into<Arc<Dataset>>) -> Self {
        Self::with_config(source, EngineConfig::default())
    }

    pub fn with_config(source: impl Into<Arc<Dataset>>, config: EngineConfig) -> Self {
        let source = source.into();
        Self {
            transformations: vec![Transformation::empty(Arc::clone(&source))],
            source,
            config,
        }
    }

    /// Build a pipeline by configuring and evaluating `stages` in order.
    ///
    /// Stops at the first stage that fails.
    pub fn from_stages(
        source: impl Into<Arc<Dataset>>,
        stages: impl IntoIterator<Item = Stage>,
        config: EngineConfig,
    ) -> PipelineResult<Self> {
        let mut pipeline = Self::with_config(source, config);
        for (index, stage) in stages.into_iter().enumerate() {
            if index > 0 {
                pipeline.append()?;
            }
            pipeline.edit(index, stage)?;
        }
        Ok(pipeline)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn source(&self) -> &Arc<Dataset> {
        &self.source
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transformations(&self) -> &[Transformation] {
        &self.transformations
    }

    pub fn get(&self, index: usize) -> Option<&Transformation> {
        self.transformations.get(index)
    }

    pub fn len(&self) -> usize {
        self.transformations.len()
    }

    /// Never true, see the type's docs.
    pub fn is_empty(&self) -> bool {
        self.transformations.is_empty()
    }

    pub fn last(&self) -> &Transformation {
        // Never empty, see the type's docs.
        &self.transformations[self.transformations.len() - 1]
    }

    /// Configured stages, in order.
    pub fn stages(&self) -> Vec<&Stage> {
        self.transformations.iter().filter_map(|t| t.stage()).collect()
    }

    /// Output of the last stage, if it has been evaluated.
    pub fn output(&self) -> Option<&Arc<Dataset>> {
        self.last().output()
    }

    /// True when stage 0 reads the source and every later stage reads the
    /// very dataset its predecessor produced.
    pub fn is_chained(&self) -> bool {
        let mut expected = Some(&self.source);
        for t in &self.transformations {
            match expected {
                Some(input) if Arc::ptr_eq(input, &t.input) => expected = t.output.as_ref(),
                _ => return false,
            }
        }
        true
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add an empty stage reading the output of stage `after`.
    ///
    /// Stages after `after` are discarded first. Rejected unless stage
    /// `after` is evaluated. Returns the index of the new stage.
    pub fn append_after(&mut self, after: usize) -> PipelineResult<usize> {
        let input = {
            let prior = self.checked(after)?;
            match prior.output() {
                Some(output) => Arc::clone(output),
                None => {
                    log_error_indent(format!("Cannot add a stage after incomplete stage {}", after), 1);
                    return Err(PipelineError::PipelineStageGap { index: after });
                }
            }
        };
        self.truncate_after(after);
        self.transformations.push(Transformation::empty(input));
        let index = self.transformations.len() - 1;
        log_info(format!("Added stage {}", index));
        Ok(index)
    }

    /// Add an empty stage after the last one.
    pub fn append(&mut self) -> PipelineResult<usize> {
        self.append_after(self.transformations.len() - 1)
    }

    /// Set the configuration of stage `index` without evaluating it.
    ///
    /// The stage's output is cleared and every later stage is removed.
    pub fn configure(&mut self, index: usize, stage: Stage) -> PipelineResult<()> {
        self.checked(index)?;
        self.truncate_after(index);
        let t = &mut self.transformations[index];
        t.stage = Some(stage);
        t.output = None;
        t.applied = false;
        log_info(format!("Configured stage {}: {}", index, t.summary()));
        Ok(())
    }

    /// Evaluate the configured stage `index` against its input.
    ///
    /// An already evaluated stage returns its output unchanged.
    pub fn evaluate(&mut self, index: usize) -> PipelineResult<Arc<Dataset>> {
        let t = self.checked(index)?;
        if let Some(output) = t.output() {
            return Ok(Arc::clone(output));
        }
        let stage = t.stage().ok_or(PipelineError::EmptyStage { index })?;
        let output = Arc::new(self.run(index, stage, t.input())?);
        self.transformations[index].output = Some(Arc::clone(&output));
        Ok(output)
    }

    /// Replace the configuration of stage `index` and evaluate it.
    ///
    /// On success, every later stage is removed. On failure the pipeline is
    /// left exactly as it was.
    pub fn edit(&mut self, index: usize, stage: Stage) -> PipelineResult<Arc<Dataset>> {
        let t = self.checked(index)?;
        let output = Arc::new(self.run(index, &stage, t.input())?);

        self.truncate_after(index);
        let t = &mut self.transformations[index];
        t.stage = Some(stage);
        t.output = Some(Arc::clone(&output));
        t.applied = false;
        Ok(output)
    }

    /// Remove stage `index` and everything after it.
    ///
    /// A single-stage pipeline is left alone (returns `Ok(false)`). Deleting
    /// stage 0 leaves one empty stage seeded with the source.
    pub fn delete(&mut self, index: usize) -> PipelineResult<bool> {
        if self.transformations.len() == 1 {
            log_warning("Pipeline has a single stage, nothing deleted");
            return Ok(false);
        }
        self.checked(index)?;
        if index == 0 {
            self.reset_chain();
        } else {
            self.transformations.truncate(index);
        }
        log_info(format!("Deleted stages from {}, {} left", index, self.transformations.len()));
        Ok(true)
    }

    /// Mark every stage applied and return the last stage's output.
    ///
    /// Rejected, with nothing marked, unless the last stage is evaluated.
    pub fn apply_pipeline(&mut self) -> PipelineResult<Arc<Dataset>> {
        let output = match self.last().output() {
            Some(output) => Arc::clone(output),
            None => {
                let index = self
                    .transformations
                    .iter()
                    .position(|t| !t.is_evaluated())
                    .unwrap_or(self.transformations.len() - 1);
                log_error_indent(format!("Cannot apply: stage {} is incomplete", index), 1);
                return Err(PipelineError::PipelineStageGap { index });
            }
        };
        for t in &mut self.transformations {
            t.applied = true;
        }
        log_success(format!(
            "Applied {} stage(s): {} → {} rows",
            self.transformations.len(),
            self.source.row_count(),
            output.row_count()
        ));
        Ok(output)
    }

    /// Collapse to a single empty stage seeded with the source.
    pub fn reset(&mut self) {
        self.reset_chain();
        log_info("Pipeline reset");
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn checked(&self, index: usize) -> PipelineResult<&Transformation> {
        self.transformations
            .get(index)
            .ok_or(PipelineError::IndexOutOfRange {
                index,
                len: self.transformations.len(),
            })
    }

    fn truncate_after(&mut self, index: usize) {
        let removed = self.transformations.len().saturating_sub(index + 1);
        if removed > 0 {
            self.transformations.truncate(index + 1);
            log_info(format!("Removed {} stage(s) after stage {}", removed, index));
        }
    }

    fn reset_chain(&mut self) {
        self.transformations = vec![Transformation::empty(Arc::clone(&self.source))];
    }

    fn run(&self, index: usize, stage: &Stage, input: &Dataset) -> PipelineResult<Dataset> {
        match validate_stage(input, stage, &self.config) {
            Ok(plan) => {
                let output = run_plan(input, &plan);
                log_success_indent(
                    format!(
                        "Stage {} {}: {} → {} rows",
                        index,
                        stage,
                        input.row_count(),
                        output.row_count()
                    ),
                    1,
                );
                Ok(output)
            }
            Err(err) => {
                log_error_indent(format!("Stage {} rejected: {}", index, err), 1);
                Err(PipelineError::at(index, err))
            }
        }
    }
}
