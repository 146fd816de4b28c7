//! Ordered chains of transformations.
//!
//! A [`TransformPipeline`] is itself a [`Transformation`]: its input frame
//! is passed through every step in order and the last result becomes its
//! `df` output. The names of the steps that ran are recorded under `steps`.
//!
//! # Example
//!
//! ```ignore
//! use sluice_transform::{TransformPipeline, library};
//!
//! let pipeline = TransformPipeline::new("clean")
//!     .add_step(Box::new(library::trim()?))
//!     .add_step(Box::new(library::lowercase()?));
//! let df = pipeline.transform(df)?;
//! ```

use polars::prelude::DataFrame;
use serde_json::json;
use sluice_core::{Result, Step, StepCore};
use sluice_model::{FieldSpec, FieldType};

use crate::transformation::{DF_FIELD, FrameSlot, Transformation, df_field};

pub const STEPS_FIELD: &str = "steps";

/// An ordered pipeline of transformations.
pub struct TransformPipeline {
    core: StepCore,
    input: FrameSlot,
    steps: Vec<Box<dyn Transformation>>,
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new("TransformPipeline")
    }
}

impl TransformPipeline {
    /// Create an empty pipeline.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: StepCore::new(
                name,
                [
                    df_field(),
                    FieldSpec::new(STEPS_FIELD, FieldType::list_of(FieldType::Str))
                        .with_description("Names of the steps that ran, in order"),
                ],
            ),
            input: FrameSlot::default(),
            steps: Vec::new(),
        }
    }

    /// Add a step to the end of the pipeline.
    #[must_use]
    pub fn add_step(mut self, step: Box<dyn Transformation>) -> Self {
        self.steps.push(step);
        self
    }

    /// Insert a step at a specific position, clamped to the end.
    #[must_use]
    pub fn insert_step(mut self, index: usize, step: Box<dyn Transformation>) -> Self {
        let index = index.min(self.steps.len());
        self.steps.insert(index, step);
        self
    }

    /// Remove every step with the given name.
    #[must_use]
    pub fn remove_step(mut self, step_name: &str) -> Self {
        self.steps.retain(|s| s.name() != step_name);
        self
    }

    #[must_use]
    pub fn with_df(self, df: DataFrame) -> Self {
        self.input.set(df);
        self
    }

    /// List step names in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Step for TransformPipeline {
    fn core(&self) -> &StepCore {
        &self.core
    }

    fn execute(&self) -> Result<()> {
        let mut df = self.input.get(self.name())?;
        let mut executed = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            df = step.transform(df)?;
            executed.push(step.name().to_string());
        }
        self.output().set(DF_FIELD, df);
        self.output().set(STEPS_FIELD, executed);
        Ok(())
    }

    fn inputs(&self) -> serde_json::Value {
        json!({ "steps": self.step_names() })
    }
}

impl Transformation for TransformPipeline {
    fn input(&self) -> &FrameSlot {
        &self.input
    }
}
