//! Step output container.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use polars::prelude::DataFrame;
use sluice_model::{ConfigError, FieldIssue, FromValue, ModelSpec, Record, Value};

use crate::error::{Result, StepError};

/// Results of one step, populated while it executes.
///
/// Writes go through `&self` so `execute(&self)` can fill the output
/// without a mutable borrow of the step. Values are not checked on write;
/// the lifecycle validates the whole record once after execution, or on
/// the first read when the step runs with lazy output.
#[derive(Debug)]
pub struct StepOutput {
    step: String,
    record: RefCell<Record>,
    pending: Cell<bool>,
}

impl StepOutput {
    pub fn new(step: impl Into<String>, spec: Arc<ModelSpec>) -> Self {
        Self {
            step: step.into(),
            record: RefCell::new(Record::lazy(spec)),
            pending: Cell::new(false),
        }
    }

    pub fn name(&self) -> String {
        self.record.borrow().name().to_string()
    }

    pub fn spec(&self) -> ModelSpec {
        self.record.borrow().spec().clone()
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.record.borrow_mut().set(key, value);
    }

    /// True when the field holds a non-null value. Never validates.
    pub fn contains(&self, key: &str) -> bool {
        self.record.borrow().contains(key)
    }

    /// Reads a field, validating first if validation was deferred.
    ///
    /// Unset optional fields read as `Value::Null`.
    pub fn get(&self, key: &str) -> Result<Value> {
        self.ensure_valid()?;
        let record = self.record.borrow();
        if let Some(value) = record.get(key) {
            return Ok(value.clone());
        }
        match record.spec().find(key) {
            Some(field) if !field.required => Ok(Value::Null),
            Some(field) => Err(self.invalid(vec![FieldIssue::missing(&field.name)])),
            None => Err(self.invalid(vec![FieldIssue::unknown(key)])),
        }
    }

    /// Typed read; a value of another kind is reported as a type issue.
    pub fn get_as<T: FromValue>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        T::from_value(&value)
            .ok_or_else(|| self.invalid(vec![FieldIssue::wrong_type(key, T::EXPECTED, value.kind())]))
    }

    pub fn frame(&self, key: &str) -> Result<DataFrame> {
        self.get_as(key)
    }

    /// Checks every declared field and clears a pending deferral on success.
    pub fn validate(&self) -> Result<()> {
        self.record.borrow().validate().map_err(|source| StepError::Output {
            step: self.step.clone(),
            source,
        })?;
        self.pending.set(false);
        Ok(())
    }

    pub fn defer_validation(&self) {
        self.pending.set(true);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.pending.get() {
            tracing::debug!(step = %self.step, "Validating deferred output");
            self.validate()?;
        }
        Ok(())
    }

    fn invalid(&self, issues: Vec<FieldIssue>) -> StepError {
        StepError::Output {
            step: self.step.clone(),
            source: ConfigError::Validation {
                model: self.name(),
                issues,
            },
        }
    }

    /// Copy of the current values.
    pub fn to_record(&self) -> Record {
        self.record.borrow().clone()
    }

    /// JSON view for logging.
    pub fn summary_json(&self) -> serde_json::Value {
        self.record.borrow().summary_json()
    }
}
