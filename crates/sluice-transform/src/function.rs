//! Column functions: a callable plus its declared signature.

use std::fmt;
use std::sync::Arc;

use polars::prelude::*;
use sluice_core::Result;
use sluice_model::{ConfigError, Value};

use crate::broadcast::Arguments;
use crate::signature::Signature;

type ExprFn = dyn Fn(&Arguments) -> Result<Expr> + Send + Sync;

/// A named expression builder with its parameter list.
///
/// The function receives one [`Arguments`] bundle and returns the
/// expression the engine evaluates; it is called once per column in map
/// mode and once in total in reduce mode.
#[derive(Clone)]
pub struct ColumnFunction {
    name: String,
    signature: Signature,
    func: Arc<ExprFn>,
}

impl ColumnFunction {
    pub fn new<F>(name: impl Into<String>, signature: Signature, func: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Expr> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn call(&self, args: &Arguments) -> Result<Expr> {
        (self.func)(args)
    }
}

impl fmt::Debug for ColumnFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnFunction")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Literal expression for a scalar option value.
pub fn lit_value(value: &Value) -> Result<Expr> {
    Ok(match value {
        Value::Null => lit(NULL),
        Value::Bool(b) => lit(*b),
        Value::Int(i) => lit(*i),
        Value::Float(f) => lit(*f),
        Value::Str(s) => lit(s.as_str()),
        other => {
            return Err(ConfigError::Unrepresentable {
                kind: other.kind().to_string(),
                target: "literal".to_string(),
            }
            .into());
        }
    })
}
