//! Key/value configuration store.
//!
//! A `Context` is a JSON object with explicit, path-aware accessors. Keys
//! may address nested maps with dots (`"db.connection.host"`); a literal
//! key containing dots takes precedence over the nested path.
//!
//! # Example
//!
//! ```ignore
//! use sluice_model::Context;
//!
//! let base = Context::from_toml("[db]\nhost = \"localhost\"\nport = 5432\n")?;
//! let local = Context::from_json(r#"{"db": {"host": "db.internal"}}"#)?;
//! let ctx = base.merge_recursive(&local);
//! assert_eq!(ctx.get_as::<u16>("db.port")?, 5432);
//! ```

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: Map<String, JsonValue>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON object; any other JSON value is rejected.
    pub fn from_json_value(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(values) => Ok(Self { values }),
            other => Err(ConfigError::Unrepresentable {
                kind: json_kind(&other).to_string(),
                target: "context".to_string(),
            }),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_json_value(serde_json::from_str(text)?)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let values: Map<String, JsonValue> = toml::from_str(text)?;
        Ok(Self { values })
    }

    /// Loads a `.json` or `.toml` file, chosen by extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let ctx = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text)?,
            Some("toml") => Self::from_toml(&text)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ));
            }
        };
        tracing::debug!(path = %path.display(), keys = ctx.len(), "Loaded context");
        Ok(ctx)
    }

    /// Builds a context from any serializable value that encodes as a map.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        Self::from_json_value(serde_json::to_value(value)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.values)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(&self.values)?)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.values
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.values)
    }

    /// Looks up a key, falling back to dotted-path resolution.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        if let Some(value) = self.values.get(key) {
            return Some(value);
        }
        let mut parts = key.split('.');
        let first = parts.next()?;
        let mut current = self.values.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn require(&self, key: &str) -> Result<&JsonValue> {
        self.get(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))
    }

    /// Typed lookup of a required key.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.require(key)?;
        T::deserialize(value).map_err(|e| ConfigError::Deserialize {
            model: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Typed lookup returning `default` when the key is absent.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        if self.contains(key) {
            self.get_as(key)
        } else {
            Ok(default)
        }
    }

    /// Sub-tree at `key` as its own context.
    pub fn section(&self, key: &str) -> Result<Context> {
        Self::from_json_value(self.require(key)?.clone())
    }

    /// Stores a value at a dotted path, creating intermediate maps.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let mut parts: Vec<&str> = key.split('.').collect();
        let last = parts.pop().unwrap_or(key);
        let mut current = &mut self.values;
        for part in parts {
            let entry = current
                .entry(part.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if !entry.is_object() {
                *entry = JsonValue::Object(Map::new());
            }
            let Some(map) = entry.as_object_mut() else {
                return Err(ConfigError::KeyNotFound(key.to_string()));
            };
            current = map;
        }
        current.insert(last.to_string(), value);
        Ok(())
    }

    /// Builder form of [`Context::set`].
    pub fn with<T: Serialize>(mut self, key: &str, value: T) -> Result<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        if let Some(value) = self.values.remove(key) {
            return Some(value);
        }
        let (parent, last) = key.rsplit_once('.')?;
        let mut current = &mut self.values;
        for part in parent.split('.') {
            current = current.get_mut(part)?.as_object_mut()?;
        }
        current.remove(last)
    }

    /// Shallow merge; top-level keys of `other` replace ours.
    #[must_use]
    pub fn merge(&self, other: &Context) -> Context {
        let mut values = self.values.clone();
        for (key, value) in &other.values {
            values.insert(key.clone(), value.clone());
        }
        Context { values }
    }

    /// Deep merge; nested maps merge key by key, anything else takes `other`'s value.
    #[must_use]
    pub fn merge_recursive(&self, other: &Context) -> Context {
        let mut values = self.values.clone();
        merge_maps(&mut values, &other.values);
        Context { values }
    }
}

fn merge_maps(left: &mut Map<String, JsonValue>, right: &Map<String, JsonValue>) {
    for (key, value) in right {
        match (left.get_mut(key), value) {
            (Some(JsonValue::Object(l)), JsonValue::Object(r)) => merge_maps(l, r),
            _ => {
                left.insert(key.clone(), value.clone());
            }
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
