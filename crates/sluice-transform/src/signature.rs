//! Declared parameter lists and call-shape classification.
//!
//! A column function declares its parameters once, when it is wrapped.
//! [`classify`] decides whether the function maps over columns one at a
//! time or reduces several columns into one, and splits the parameters
//! into data parameters (bound to columns) and options (bound to caller
//! values by name).

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sluice_core::{Result, StepError};
use sluice_model::Value;

/// How a declared parameter is annotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A single column.
    Column,
    /// Any number of columns.
    Columns,
    /// No annotation; may be a column or an option depending on the call shape.
    Untyped,
    /// A plain value.
    Option,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn is_data(&self) -> bool {
        matches!(self.kind, ParamKind::Column | ParamKind::Columns)
    }
}

/// Ordered parameter list of a column function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<Parameter>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn column(self, name: impl Into<String>) -> Self {
        self.param(Parameter::new(name, ParamKind::Column))
    }

    #[must_use]
    pub fn columns(self, name: impl Into<String>) -> Self {
        self.param(Parameter::new(name, ParamKind::Columns))
    }

    #[must_use]
    pub fn untyped(self, name: impl Into<String>) -> Self {
        self.param(Parameter::new(name, ParamKind::Untyped))
    }

    #[must_use]
    pub fn option(self, name: impl Into<String>) -> Self {
        self.param(Parameter::new(name, ParamKind::Option))
    }

    #[must_use]
    pub fn option_with_default(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.param(Parameter::new(name, ParamKind::Option).with_default(default))
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallMode {
    /// One call per selected column.
    Map,
    /// One call over all selected columns.
    Reduce,
}

impl CallMode {
    /// Mode requested by a `for_each` flag.
    pub fn from_for_each(for_each: bool) -> Self {
        if for_each { CallMode::Map } else { CallMode::Reduce }
    }
}

impl fmt::Display for CallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallMode::Map => f.write_str("map"),
            CallMode::Reduce => f.write_str("reduce"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionParam {
    pub name: String,
    pub default: Option<Value>,
}

/// Classification result, computed once per wrapped function.
#[derive(Debug, Clone, PartialEq)]
pub struct CallShape {
    pub mode: CallMode,
    /// Data parameters bound to one column each, in declaration order.
    pub fixed: Vec<String>,
    /// Data parameter receiving the remaining columns.
    pub variadic: Option<String>,
    pub options: Vec<OptionParam>,
}

impl CallShape {
    pub fn option_names(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|o| o.name.as_str())
    }

    pub fn is_data_param(&self, name: &str) -> bool {
        self.fixed.iter().any(|p| p == name) || self.variadic.as_deref() == Some(name)
    }
}

/// Classifies `signature` into a call shape.
///
/// An explicit `mode_override` always wins. Otherwise a variadic data
/// parameter or two or more fixed data parameters mean reduce, and a
/// single data parameter means map. A signature without annotated data
/// parameters falls back to `default_mode`: in map mode its first
/// untyped parameter is the column, in reduce mode every untyped
/// parameter without a default is. Everything else is an option.
pub fn classify(
    function: &str,
    signature: &Signature,
    mode_override: Option<CallMode>,
    default_mode: CallMode,
) -> Result<CallShape> {
    let mut seen = HashSet::new();
    for param in signature.params() {
        if param.name.trim().is_empty() {
            return Err(StepError::ambiguous(function, "parameter without a name"));
        }
        if !seen.insert(param.name.as_str()) {
            return Err(StepError::ambiguous(
                function,
                format!("parameter '{}' is declared twice", param.name),
            ));
        }
    }
    let variadics = signature
        .params()
        .iter()
        .filter(|p| p.kind == ParamKind::Columns)
        .count();
    if variadics > 1 {
        return Err(StepError::ambiguous(
            function,
            "only one variadic column parameter is allowed",
        ));
    }

    let has_data = signature.params().iter().any(Parameter::is_data);
    let shape = if has_data {
        classify_annotated(signature, mode_override)
    } else {
        classify_untyped(function, signature, mode_override.unwrap_or(default_mode))?
    };

    if shape.mode == CallMode::Map && (shape.fixed.len() != 1 || shape.variadic.is_some()) {
        return Err(StepError::ambiguous(
            function,
            format!(
                "map mode needs exactly one column parameter, found {}",
                shape.fixed.len() + usize::from(shape.variadic.is_some())
            ),
        ));
    }

    tracing::debug!(
        function = %function,
        mode = %shape.mode,
        fixed = ?shape.fixed,
        variadic = ?shape.variadic,
        options = ?shape.option_names().collect::<Vec<_>>(),
        "Classified column function"
    );
    Ok(shape)
}

fn classify_annotated(signature: &Signature, mode_override: Option<CallMode>) -> CallShape {
    let mut fixed = Vec::new();
    let mut variadic = None;
    let mut options = Vec::new();
    for param in signature.params() {
        match param.kind {
            ParamKind::Column => fixed.push(param.name.clone()),
            ParamKind::Columns => variadic = Some(param.name.clone()),
            ParamKind::Untyped | ParamKind::Option => options.push(option_of(param)),
        }
    }
    let inferred = if variadic.is_some() || fixed.len() >= 2 {
        CallMode::Reduce
    } else {
        CallMode::Map
    };
    CallShape {
        mode: mode_override.unwrap_or(inferred),
        fixed,
        variadic,
        options,
    }
}

fn classify_untyped(function: &str, signature: &Signature, mode: CallMode) -> Result<CallShape> {
    let untyped: Vec<&Parameter> = signature
        .params()
        .iter()
        .filter(|p| p.kind == ParamKind::Untyped)
        .collect();
    let Some(first) = untyped.first() else {
        return Err(StepError::ambiguous(function, "declares no column parameter"));
    };

    let data: Vec<&str> = match mode {
        CallMode::Map => vec![first.name.as_str()],
        CallMode::Reduce => {
            let without_default: Vec<&str> = untyped
                .iter()
                .filter(|p| p.default.is_none())
                .map(|p| p.name.as_str())
                .collect();
            if without_default.is_empty() {
                vec![first.name.as_str()]
            } else {
                without_default
            }
        }
    };

    let options = signature
        .params()
        .iter()
        .filter(|p| !data.contains(&p.name.as_str()))
        .map(option_of)
        .collect();
    Ok(CallShape {
        mode,
        fixed: data.into_iter().map(str::to_string).collect(),
        variadic: None,
        options,
    })
}

fn option_of(param: &Parameter) -> OptionParam {
    OptionParam {
        name: param.name.clone(),
        default: param.default.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(sig: &Signature, over: Option<CallMode>, default: CallMode) -> CallShape {
        classify("f", sig, over, default).unwrap()
    }

    #[test]
    fn test_single_column_is_map() {
        let sig = Signature::new().column("col").option("rate");
        let s = shape(&sig, None, CallMode::Reduce);
        assert_eq!(s.mode, CallMode::Map);
        assert_eq!(s.fixed, ["col"]);
        assert_eq!(s.option_names().collect::<Vec<_>>(), ["rate"]);
    }

    #[test]
    fn test_two_columns_or_variadic_is_reduce() {
        let two = Signature::new().column("a").column("b");
        assert_eq!(shape(&two, None, CallMode::Map).mode, CallMode::Reduce);
        let var = Signature::new().columns("cols");
        let s = shape(&var, None, CallMode::Map);
        assert_eq!(s.mode, CallMode::Reduce);
        assert_eq!(s.variadic.as_deref(), Some("cols"));
    }

    #[test]
    fn test_override_wins() {
        let sig = Signature::new().column("col");
        assert_eq!(
            shape(&sig, Some(CallMode::Reduce), CallMode::Map).mode,
            CallMode::Reduce
        );
    }

    #[test]
    fn test_untyped_single_follows_default() {
        let sig = Signature::new().untyped("x");
        assert_eq!(shape(&sig, None, CallMode::Map).mode, CallMode::Map);
        assert_eq!(shape(&sig, None, CallMode::Reduce).mode, CallMode::Reduce);
    }

    #[test]
    fn test_untyped_map_keeps_rest_as_options() {
        let sig = Signature::new().untyped("amount").untyped("rate");
        let s = shape(&sig, None, CallMode::Map);
        assert_eq!(s.fixed, ["amount"]);
        assert_eq!(s.option_names().collect::<Vec<_>>(), ["rate"]);
    }

    #[test]
    fn test_untyped_reduce_binds_params_without_default() {
        let sig = Signature::new()
            .untyped("q1")
            .untyped("q2")
            .param(Parameter::new("scale", ParamKind::Untyped).with_default(1));
        let s = shape(&sig, None, CallMode::Reduce);
        assert_eq!(s.fixed, ["q1", "q2"]);
        assert_eq!(s.options[0].default, Some(Value::Int(1)));
    }

    #[test]
    fn test_no_data_param_fails() {
        let sig = Signature::new().option("rate");
        let err = classify("rates", &sig, None, CallMode::Map).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"rates: declares no column parameter");
    }

    #[test]
    fn test_forced_map_with_two_columns_fails() {
        let sig = Signature::new().column("a").column("b");
        let err = classify("pair", &sig, Some(CallMode::Map), CallMode::Map).unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"pair: map mode needs exactly one column parameter, found 2"
        );
    }

    #[test]
    fn test_duplicate_names_fail() {
        let sig = Signature::new().column("a").option("a");
        assert!(classify("dup", &sig, None, CallMode::Map).is_err());
    }
}
