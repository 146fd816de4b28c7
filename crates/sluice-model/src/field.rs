//! Declarative field specifications for dynamic records.

use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Declared type of a record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Any,
    Bool,
    Int,
    /// Accepts ints as well; they are widened on construction.
    Float,
    Str,
    List(Box<FieldType>),
    Map,
    Frame,
}

impl FieldType {
    pub fn list_of(inner: FieldType) -> Self {
        FieldType::List(Box::new(inner))
    }

    /// Whether `value` conforms to this type. `Null` never conforms.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => false,
            (FieldType::Any, _) => true,
            (FieldType::Bool, Value::Bool(_))
            | (FieldType::Int, Value::Int(_))
            | (FieldType::Float, Value::Float(_) | Value::Int(_))
            | (FieldType::Str, Value::Str(_))
            | (FieldType::Map, Value::Map(_))
            | (FieldType::Frame, Value::Frame(_)) => true,
            (FieldType::List(inner), Value::List(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            _ => false,
        }
    }

    /// Widens ints for float fields, recursing into lists.
    pub(crate) fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            #[allow(clippy::cast_precision_loss)]
            (FieldType::Float, Value::Int(i)) => Value::Float(i as f64),
            (FieldType::List(inner), Value::List(items)) => {
                Value::List(items.into_iter().map(|item| inner.coerce(item)).collect())
            }
            (_, other) => other,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Any => f.write_str("any"),
            FieldType::Bool => f.write_str("bool"),
            FieldType::Int => f.write_str("int"),
            FieldType::Float => f.write_str("float"),
            FieldType::Str => f.write_str("str"),
            FieldType::List(inner) => write!(f, "list[{inner}]"),
            FieldType::Map => f.write_str("map"),
            FieldType::Frame => f.write_str("dataframe"),
        }
    }
}

/// One declared field: name, type, presence rule, default, alias, description.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
    pub default: Option<Value>,
    pub alias: Option<String>,
    pub description: String,
}

impl FieldSpec {
    /// A required field of the given type.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
            alias: None,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets a default; a defaulted field is never reported missing.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.required = false;
        self
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn matches(&self, key: &str) -> bool {
        self.name == key || self.alias.as_deref() == Some(key)
    }
}

/// Whether a record may hold keys it does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtraFields {
    #[default]
    Forbid,
    Allow,
}

/// Named collection of field specifications.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldSpec>,
    pub extra: ExtraFields,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            fields: Vec::new(),
            extra: ExtraFields::default(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a field, replacing an earlier one with the same name.
    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == field.name) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
        self
    }

    #[must_use]
    pub fn allow_extra(mut self) -> Self {
        self.extra = ExtraFields::Allow;
        self
    }

    /// Appends the fields of `other` that this spec does not redeclare.
    #[must_use]
    pub fn extend(mut self, other: &ModelSpec) -> Self {
        for field in &other.fields {
            if self.find(&field.name).is_none() {
                self.fields.push(field.clone());
            }
        }
        self
    }

    /// Looks a field up by name or alias.
    pub fn find(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.matches(key))
    }

    pub fn into_shared(self) -> Arc<ModelSpec> {
        Arc::new(self)
    }
}
