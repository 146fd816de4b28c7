//! Steps that turn one DataFrame into another.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use polars::prelude::*;
use serde_json::json;
use sluice_core::{Result, Step, StepCore, StepError, StepExt};
use sluice_model::{FieldSpec, FieldType, Params};

/// Output field holding the transformed frame.
pub const DF_FIELD: &str = "df";

pub(crate) fn df_field() -> FieldSpec {
    FieldSpec::new(DF_FIELD, FieldType::Frame).with_description("The transformed DataFrame")
}

/// Input frame of a transformation, settable through `&self`.
#[derive(Debug, Default)]
pub struct FrameSlot(RefCell<Option<DataFrame>>);

impl FrameSlot {
    pub fn new(df: Option<DataFrame>) -> Self {
        Self(RefCell::new(df))
    }

    pub fn set(&self, df: DataFrame) {
        *self.0.borrow_mut() = Some(df);
    }

    /// The frame, or `MissingInput` when none was given.
    pub fn get(&self, step: &str) -> Result<DataFrame> {
        self.0.borrow().clone().ok_or_else(|| StepError::MissingInput {
            step: step.to_string(),
        })
    }

    pub fn is_set(&self) -> bool {
        self.0.borrow().is_some()
    }
}

impl Clone for FrameSlot {
    fn clone(&self) -> Self {
        Self::new(self.0.borrow().clone())
    }
}

/// A [`Step`] with a DataFrame in and a DataFrame out.
///
/// Implementors read the input from [`Transformation::input`] and write
/// the result to the `df` output field.
pub trait Transformation: Step {
    fn input(&self) -> &FrameSlot;

    /// Runs the step on `df` and returns the transformed frame.
    fn transform(&self, df: DataFrame) -> Result<DataFrame> {
        self.input().set(df);
        self.run()?.frame(DF_FIELD)
    }
}

type FrameFn = dyn Fn(DataFrame, &Params) -> Result<DataFrame> + Send + Sync;

/// Transformation over a whole frame from a plain function.
pub struct FrameTransform {
    core: StepCore,
    input: FrameSlot,
    func: Arc<FrameFn>,
    params: Params,
}

impl FrameTransform {
    pub fn from_func<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(DataFrame, &Params) -> Result<DataFrame> + Send + Sync + 'static,
    {
        Self {
            core: StepCore::new(name, [df_field()]),
            input: FrameSlot::default(),
            func: Arc::new(func),
            params: Params::new(),
        }
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<sluice_model::Value>) -> Self {
        self.params.insert(key, value);
        self
    }

    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.params = self.params.merged(&params);
        self
    }

    #[must_use]
    pub fn with_df(self, df: DataFrame) -> Self {
        self.input.set(df);
        self
    }

    /// Copy with `params` bound on top of the current ones.
    #[must_use]
    pub fn partial(&self, params: Params) -> Self {
        self.clone().params(params)
    }

    pub fn bound_params(&self) -> &Params {
        &self.params
    }
}

impl Clone for FrameTransform {
    /// The copy gets a fresh output.
    fn clone(&self) -> Self {
        Self {
            core: StepCore::new(self.core.name(), [df_field()]).lazy_output(self.core.is_lazy()),
            input: self.input.clone(),
            func: Arc::clone(&self.func),
            params: self.params.clone(),
        }
    }
}

impl fmt::Debug for FrameTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameTransform")
            .field("name", &self.core.name())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Step for FrameTransform {
    fn core(&self) -> &StepCore {
        &self.core
    }

    fn execute(&self) -> Result<()> {
        let df = self.input.get(self.name())?;
        let out = (self.func)(df, &self.params)?;
        self.output().set(DF_FIELD, out);
        Ok(())
    }

    fn inputs(&self) -> serde_json::Value {
        json!({ "params": self.params.summary_json() })
    }
}

impl Transformation for FrameTransform {
    fn input(&self) -> &FrameSlot {
        &self.input
    }
}
