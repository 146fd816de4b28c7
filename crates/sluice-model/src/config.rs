//! Typed configuration records.
//!
//! A `ConfigModel` is a plain serde struct: field types are checked by
//! deserialization, defaults and aliases come from serde attributes, and
//! [`ConfigModel::validate`] adds the rules types cannot express. Every
//! constructor goes through [`ConfigModel::build`], so an instance that
//! exists has passed both.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Source {
//!     table: String,
//!     #[serde(default, alias = "batch")]
//!     batch_size: usize,
//! }
//!
//! impl ConfigModel for Source {
//!     fn validate(&self) -> Vec<FieldIssue> {
//!         if self.table.is_empty() {
//!             vec![FieldIssue::invalid("table", "must not be empty")]
//!         } else {
//!             Vec::new()
//!         }
//!     }
//! }
//!
//! let source = Source::from_context_at(&ctx, "jobs.orders.source")?;
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::context::Context;
use crate::error::{ConfigError, FieldIssue, Result};

pub trait ConfigModel: Serialize + DeserializeOwned {
    /// Name used in error messages; defaults to the type name.
    fn model_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Rules beyond what the field types enforce.
    fn validate(&self) -> Vec<FieldIssue> {
        Vec::new()
    }

    /// Deserializes and validates in one step.
    fn build(value: JsonValue) -> Result<Self> {
        let model: Self =
            serde_json::from_value(value).map_err(|e| ConfigError::Deserialize {
                model: Self::model_name().to_string(),
                message: e.to_string(),
            })?;
        let issues = model.validate();
        if issues.is_empty() {
            Ok(model)
        } else {
            Err(ConfigError::Validation {
                model: Self::model_name().to_string(),
                issues,
            })
        }
    }

    fn from_json(text: &str) -> Result<Self> {
        Self::build(serde_json::from_str(text)?)
    }

    fn from_toml(text: &str) -> Result<Self> {
        Self::from_context(&Context::from_toml(text)?)
    }

    fn from_context(ctx: &Context) -> Result<Self> {
        Self::build(ctx.clone().into_value())
    }

    /// Builds from the sub-tree at a dotted key.
    fn from_context_at(ctx: &Context, key: &str) -> Result<Self> {
        Self::build(ctx.require(key)?.clone())
    }

    fn to_json_value(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }

    fn to_context(&self) -> Result<Context> {
        Context::from_serializable(self)
    }

    fn to_toml(&self) -> Result<String> {
        self.to_context()?.to_toml()
    }

    /// A new instance from this one's fields with `overrides` merged on top.
    fn with_overrides(&self, overrides: &Context) -> Result<Self> {
        let merged = self.to_context()?.merge_recursive(overrides);
        Self::from_context(&merged)
    }
}

/// Last path segment of a type name, without generic arguments.
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
