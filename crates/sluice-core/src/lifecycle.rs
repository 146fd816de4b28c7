//! Exactly-once lifecycle around step execution.
//!
//! [`run`] is the only place a step's `execute` is wrapped. The outermost
//! call on a [`StepCore`] emits the start log, runs the well-formedness
//! check, calls `execute`, then validates the output and emits the end
//! log, or emits the error log and hands the error back untouched. Calls
//! made while another `run` on the same core is active skip all of that
//! and only execute.
//!
//! The side effects live in a [`LifecyclePolicy`], so each of them can be
//! replaced without touching the reentrancy handling.

use serde_json::Value as JsonValue;

use crate::error::{Result, StepError};
use crate::logging::redact_json;
use crate::output::StepOutput;
use crate::step::{Step, StepCore};

/// Side effects applied around the outermost execution.
pub trait LifecyclePolicy {
    fn on_start(&self, core: &StepCore, inputs: &JsonValue) {
        log_start(core, inputs);
    }

    /// Runs after `execute` succeeded; an error here fails the run.
    ///
    /// That error is returned to the caller as is. [`Self::on_error`] is not
    /// called for it, so a failed output validation emits neither the end
    /// log nor the error log.
    fn on_success(&self, core: &StepCore) -> Result<()> {
        validate_output(core)?;
        log_end(core);
        Ok(())
    }

    fn on_error(&self, core: &StepCore, error: &StepError) {
        log_error(core, error);
    }
}

/// Default policy: `tracing` logs plus output validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPolicy;

impl LifecyclePolicy for TracingPolicy {}

pub fn log_start(core: &StepCore, inputs: &JsonValue) {
    tracing::info!(step = %core.name(), "Start running step");
    if !inputs.is_null() {
        tracing::debug!(step = %core.name(), input = %redact_json(inputs), "Step input");
    }
}

pub fn log_end(core: &StepCore) {
    tracing::debug!(step = %core.name(), output = %core.output().summary_json(), "Step output");
    tracing::info!(step = %core.name(), "Finished running step");
}

pub fn log_error(core: &StepCore, error: &StepError) {
    tracing::error!(step = %core.name(), error = %error, "Error while running step");
}

/// Validates now, or marks the output for validation on first read.
pub fn validate_output(core: &StepCore) -> Result<()> {
    if core.is_lazy() {
        core.output().defer_validation();
        Ok(())
    } else {
        core.output().validate()
    }
}

/// Executes `step` under `policy`, returning its output.
pub fn run<'s, S: Step + ?Sized>(step: &'s S, policy: &dyn LifecyclePolicy) -> Result<&'s StepOutput> {
    let core = step.core();
    let frame = core.enter();
    if !frame.is_outermost() {
        tracing::trace!(step = %core.name(), depth = core.depth(), "Nested execute");
        step.execute()?;
        return Ok(core.output());
    }

    policy.on_start(core, &step.inputs());
    match step.check().and_then(|()| step.execute()) {
        Ok(()) => {
            policy.on_success(core)?;
            Ok(core.output())
        }
        Err(error) => {
            policy.on_error(core, &error);
            Err(error)
        }
    }
}

/// Step adapter that runs `inner` through the lifecycle with its own policy.
///
/// Wrapping is idempotent in effect: `Wrapped<Wrapped<S>>` shares `S`'s
/// core, so the inner layers run as nested calls and log nothing.
pub struct Wrapped<S> {
    inner: S,
    policy: Box<dyn LifecyclePolicy>,
}

impl<S: Step> Wrapped<S> {
    pub fn new(inner: S) -> Self {
        Self::with_policy(inner, TracingPolicy)
    }

    pub fn with_policy(inner: S, policy: impl LifecyclePolicy + 'static) -> Self {
        Self {
            inner,
            policy: Box::new(policy),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Step> Step for Wrapped<S> {
    fn core(&self) -> &StepCore {
        self.inner.core()
    }

    fn execute(&self) -> Result<()> {
        run(&self.inner, self.policy.as_ref()).map(|_| ())
    }

    fn inputs(&self) -> JsonValue {
        self.inner.inputs()
    }

    fn check(&self) -> Result<()> {
        self.inner.check()
    }

    fn policy(&self) -> &dyn LifecyclePolicy {
        self.policy.as_ref()
    }
}
