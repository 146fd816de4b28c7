//! Steps and their execution lifecycle.
//!
//! A [`Step`] is a unit of work with typed inputs and a validated
//! [`StepOutput`]. Running it through [`StepExt::run`] applies the
//! lifecycle (start log, execution, output validation, end or error log)
//! exactly once per external call, however the step delegates internally.

pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod output;
pub mod step;

pub use error::{Result, StepError};
pub use lifecycle::{LifecyclePolicy, TracingPolicy, Wrapped};
pub use output::StepOutput;
pub use step::{Step, StepCore, StepExt};
