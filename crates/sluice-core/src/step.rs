//! The `Step` unit of work.
//!
//! A step owns a [`StepCore`] (identity, output record, reentrancy depth)
//! and implements [`Step::execute`] with its logic. Callers trigger it
//! with [`StepExt::run`], which applies the lifecycle and returns the
//! populated output.
//!
//! Composition stands in for inheritance: a step built on another one
//! embeds it and returns the embedded step's core from [`Step::core`].
//! Both then share one output and one depth counter, so delegating to the
//! embedded step, even through its own `run`, is recognized as a nested
//! call and lifecycle side effects fire once.
//!
//! # Example
//!
//! ```ignore
//! struct Greet {
//!     core: StepCore,
//!     name: String,
//! }
//!
//! impl Step for Greet {
//!     fn core(&self) -> &StepCore {
//!         &self.core
//!     }
//!
//!     fn execute(&self) -> Result<()> {
//!         self.output().set("greeting", format!("hello {}", self.name));
//!         Ok(())
//!     }
//! }
//!
//! let step = Greet {
//!     core: StepCore::of::<Greet>([FieldSpec::new("greeting", FieldType::Str)]),
//!     name: "world".into(),
//! };
//! let greeting: String = step.run()?.get_as("greeting")?;
//! ```

use std::cell::Cell;

use sluice_model::{FieldSpec, ModelSpec, short_type_name};

use crate::error::Result;
use crate::lifecycle::{self, LifecyclePolicy, TracingPolicy};
use crate::output::StepOutput;

/// State every step carries.
#[derive(Debug)]
pub struct StepCore {
    name: String,
    description: String,
    output: StepOutput,
    depth: Cell<usize>,
    lazy: bool,
}

impl StepCore {
    /// Core for a step called `name` whose output declares `fields`.
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        let name = name.into();
        let spec = fields
            .into_iter()
            .fold(ModelSpec::new(format!("{name}.Output")), ModelSpec::field)
            .with_description(format!("Output for {name}"));
        Self {
            output: StepOutput::new(name.clone(), spec.into_shared()),
            name,
            description: String::new(),
            depth: Cell::new(0),
            lazy: false,
        }
    }

    /// Core named after the step type `T`.
    pub fn of<T: ?Sized>(fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        Self::new(short_type_name(std::any::type_name::<T>()), fields)
    }

    /// Defers output validation until the first field read.
    #[must_use]
    pub fn lazy_output(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn output(&self) -> &StepOutput {
        &self.output
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Number of `run` calls currently active on this core.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    pub(crate) fn enter(&self) -> ExecutionFrame<'_> {
        let outer = self.depth.get();
        self.depth.set(outer + 1);
        ExecutionFrame {
            depth: &self.depth,
            outermost: outer == 0,
        }
    }
}

/// One active `run` call; restores the depth when dropped.
pub(crate) struct ExecutionFrame<'a> {
    depth: &'a Cell<usize>,
    outermost: bool,
}

impl ExecutionFrame<'_> {
    pub(crate) fn is_outermost(&self) -> bool {
        self.outermost
    }
}

impl Drop for ExecutionFrame<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

pub trait Step {
    fn core(&self) -> &StepCore;

    /// Step logic. Writes results into [`Step::output`].
    fn execute(&self) -> Result<()>;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn output(&self) -> &StepOutput {
        self.core().output()
    }

    /// Input field values for the start log.
    fn inputs(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Well-formedness check, run once before the outermost `execute`.
    fn check(&self) -> Result<()> {
        Ok(())
    }

    /// Lifecycle side effects applied by [`StepExt::run`].
    fn policy(&self) -> &dyn LifecyclePolicy {
        &TracingPolicy
    }
}

pub trait StepExt: Step {
    /// Executes under the step's own lifecycle policy.
    fn run(&self) -> Result<&StepOutput> {
        lifecycle::run(self, self.policy())
    }

    /// Executes under an explicit lifecycle policy.
    fn run_with(&self, policy: &dyn LifecyclePolicy) -> Result<&StepOutput> {
        lifecycle::run(self, policy)
    }
}

impl<S: Step + ?Sized> StepExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_model::FieldType;

    struct Loader;

    #[test]
    fn test_core_names_output_after_step() {
        let core = StepCore::of::<Loader>([FieldSpec::new("b", FieldType::Str)]);
        assert_eq!(core.name(), "Loader");
        assert_eq!(core.output().name(), "Loader.Output");
        assert_eq!(core.output().spec().description, "Output for Loader");
    }

    #[test]
    fn test_frames_track_depth() {
        let core = StepCore::new("Loader", []);
        {
            let outer = core.enter();
            assert!(outer.is_outermost());
            let inner = core.enter();
            assert!(!inner.is_outermost());
            assert_eq!(core.depth(), 2);
        }
        assert_eq!(core.depth(), 0);
    }
}
