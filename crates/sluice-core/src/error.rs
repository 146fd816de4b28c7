use polars::prelude::PolarsError;
use sluice_model::ConfigError;
use thiserror::Error;

/// Every failure a step or transformation can report.
///
/// The lifecycle passes these through untouched: whatever `execute`
/// returned is what the caller of `run` receives.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{step}: {reason}")]
    Ambiguous { step: String, reason: String },
    #[error(
        "parameter '{param}' has {supplied} values but {expected} columns were selected; \
         list parameters must match the column count exactly"
    )]
    ArityMismatch {
        param: String,
        supplied: usize,
        expected: usize,
    },
    #[error("parameter '{param}' is required but was not supplied and has no default")]
    MissingParameter { param: String },
    #[error("column '{column}' not found; available columns: [{}]", .available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
    #[error(
        "column '{column}' is of type {actual}, expected one of [{}] (strict type mode)",
        .expected.join(", ")
    )]
    ColumnType {
        column: String,
        actual: String,
        expected: Vec<String>,
    },
    #[error("{step} binds {expected} column parameter(s) but {found} columns were selected")]
    ColumnCount {
        step: String,
        expected: usize,
        found: usize,
    },
    #[error("output of {step} is invalid: {source}")]
    Output {
        step: String,
        #[source]
        source: ConfigError,
    },
    #[error("{step} has no input DataFrame")]
    MissingInput { step: String },
    #[error(transparent)]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StepError {
    pub fn ambiguous(step: impl Into<String>, reason: impl Into<String>) -> Self {
        StepError::Ambiguous {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Failure from user logic, carried as-is.
    pub fn other(message: impl std::fmt::Display) -> Self {
        StepError::Other(anyhow::anyhow!("{message}"))
    }
}

pub type Result<T> = std::result::Result<T, StepError>;
