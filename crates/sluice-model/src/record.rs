//! Dynamic records validated against a [`ModelSpec`].

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::error::{ConfigError, FieldIssue, Result};
use crate::field::{ExtraFields, FieldSpec, ModelSpec};
use crate::value::{FromValue, Value};

/// Field values keyed by canonical field name.
///
/// A record built with [`Record::build`] is valid on return; one created
/// with [`Record::lazy`] is only checked when [`Record::validate`] runs.
/// [`Record::set`] never validates.
#[derive(Debug, Clone)]
pub struct Record {
    spec: Arc<ModelSpec>,
    values: IndexMap<String, Value>,
}

impl Record {
    /// Builds a record from keyword values, applying aliases and defaults.
    ///
    /// Every field is checked before returning, so the error lists all
    /// problems at once.
    pub fn build<K, V>(spec: Arc<ModelSpec>, values: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = Self::lazy(spec);
        let mut issues = Vec::new();
        for (key, value) in values {
            let key = key.into();
            match record.spec.find(&key) {
                Some(field) => {
                    let value = field.ty.coerce(value.into());
                    let name = field.name.clone();
                    record.values.insert(name, value);
                }
                None if record.spec.extra == ExtraFields::Allow => {
                    record.values.insert(key, value.into());
                }
                None => issues.push(FieldIssue::unknown(key)),
            }
        }
        for field in &record.spec.fields {
            if !record.values.contains_key(&field.name) {
                if let Some(default) = &field.default {
                    record.values.insert(field.name.clone(), default.clone());
                }
            }
        }
        issues.extend(record.field_issues());
        if issues.is_empty() {
            Ok(record)
        } else {
            Err(record.validation_error(issues))
        }
    }

    /// An empty record whose defaults are applied but nothing is validated.
    pub fn lazy(spec: Arc<ModelSpec>) -> Self {
        let values = spec
            .fields
            .iter()
            .filter_map(|f| f.default.clone().map(|d| (f.name.clone(), d)))
            .collect();
        Self { spec, values }
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Checks presence and type of every declared field.
    pub fn validate(&self) -> Result<()> {
        let issues = self.field_issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(self.validation_error(issues))
        }
    }

    fn field_issues(&self) -> Vec<FieldIssue> {
        let mut issues = Vec::new();
        for field in &self.spec.fields {
            match self.values.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    issues.push(FieldIssue::missing(&field.name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !field.ty.accepts(value) => {
                    issues.push(FieldIssue::wrong_type(
                        &field.name,
                        field.ty.to_string(),
                        value.kind(),
                    ));
                }
                Some(_) => {}
            }
        }
        if self.spec.extra == ExtraFields::Forbid {
            for key in self.values.keys() {
                if self.spec.find(key).is_none() {
                    issues.push(FieldIssue::unknown(key));
                }
            }
        }
        issues
    }

    fn validation_error(&self, issues: Vec<FieldIssue>) -> ConfigError {
        ConfigError::Validation {
            model: self.spec.name.clone(),
            issues,
        }
    }

    fn canonical<'a>(&'a self, key: &'a str) -> &'a str {
        self.spec.find(key).map_or(key, |f| f.name.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(self.canonical(key))
    }

    /// Typed read; `None` when unset or of another type.
    pub fn get_as<T: FromValue>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(T::from_value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_null())
    }

    /// Stores a value without validating it.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let name = self.canonical(key).to_string();
        self.values.insert(name, value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let name = self.canonical(key).to_string();
        self.values.shift_remove(&name)
    }

    /// Copies every value set on `other` into this record.
    pub fn merge(&mut self, other: &Record) {
        for (key, value) in &other.values {
            self.set(key, value.clone());
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.spec.fields.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// JSON view for logging.
    pub fn summary_json(&self) -> JsonValue {
        JsonValue::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.summary_json()))
                .collect(),
        )
    }
}
