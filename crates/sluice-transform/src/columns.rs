//! Column transformations derived from column functions.
//!
//! [`ColumnTransform`] wires column selection, call-shape classification
//! and option broadcasting into a [`Transformation`]. The wrapped function
//! only builds a polars expression; evaluating it is left to the engine.
//!
//! ```ignore
//! let add_one = ColumnTransform::from_func("add_one", Signature::new().untyped("col"), |args| {
//!     Ok(args.col()? + lit(1))
//! })?
//! .columns(["x", "y"]);
//! let out = add_one.transform(df)?;
//! ```

use std::fmt;

use indexmap::IndexMap;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use sluice_core::{Result, Step, StepCore, StepError};
use sluice_model::{ConfigModel, Context, FieldIssue, FieldSpec, FieldType, Params, Value};

use crate::broadcast::{Arguments, map_arguments, reduce_arguments};
use crate::function::ColumnFunction;
use crate::schema::{ColumnType, FrameSchema};
use crate::selector::{ColumnSpec, PolicyOverrides, TypePolicy, select_columns};
use crate::signature::{CallMode, CallShape, Signature, classify};
use crate::transformation::{DF_FIELD, FrameSlot, Transformation, df_field};

pub const APPLIED_COLUMNS_FIELD: &str = "applied_columns";
pub const SKIPPED_COLUMNS_FIELD: &str = "skipped_columns";

fn output_fields() -> [FieldSpec; 3] {
    [
        df_field(),
        FieldSpec::new(APPLIED_COLUMNS_FIELD, FieldType::list_of(FieldType::Str))
            .with_description("Columns the function was applied to"),
        FieldSpec::new(SKIPPED_COLUMNS_FIELD, FieldType::list_of(FieldType::Str))
            .with_default(Vec::<String>::new())
            .with_description("Columns left out by the type restriction"),
    ]
}

/// A transformation applying a [`ColumnFunction`] to selected columns.
pub struct ColumnTransform {
    core: StepCore,
    input: FrameSlot,
    function: ColumnFunction,
    default_mode: CallMode,
    mode_override: Option<CallMode>,
    shape: CallShape,
    columns: ColumnSpec,
    target_column: Option<String>,
    policy: TypePolicy,
    params: Params,
}

impl ColumnTransform {
    /// Wraps `func`, treating an unannotated single parameter as map.
    pub fn from_func<F>(name: impl Into<String>, signature: Signature, func: F) -> Result<Self>
    where
        F: Fn(&Arguments) -> Result<Expr> + Send + Sync + 'static,
    {
        Self::from_function(ColumnFunction::new(name, signature, func), CallMode::Map)
    }

    /// Wraps `func`, treating an unannotated single parameter as reduce.
    pub fn from_multi_column_func<F>(
        name: impl Into<String>,
        signature: Signature,
        func: F,
    ) -> Result<Self>
    where
        F: Fn(&Arguments) -> Result<Expr> + Send + Sync + 'static,
    {
        Self::from_function(ColumnFunction::new(name, signature, func), CallMode::Reduce)
    }

    /// Wraps `function`, classifying it once under `default_mode`.
    pub fn from_function(function: ColumnFunction, default_mode: CallMode) -> Result<Self> {
        let shape = classify(function.name(), function.signature(), None, default_mode)?;
        Ok(Self {
            core: StepCore::new(function.name(), output_fields()),
            input: FrameSlot::default(),
            function,
            default_mode,
            mode_override: None,
            shape,
            columns: ColumnSpec::Auto,
            target_column: None,
            policy: TypePolicy::default(),
            params: Params::new(),
        })
    }

    /// Forces map (`true`) or reduce (`false`) regardless of the signature.
    pub fn for_each(mut self, for_each: bool) -> Result<Self> {
        let mode = CallMode::from_for_each(for_each);
        self.shape = classify(
            self.function.name(),
            self.function.signature(),
            Some(mode),
            self.default_mode,
        )?;
        self.mode_override = Some(mode);
        Ok(self)
    }

    #[must_use]
    pub fn columns(mut self, columns: impl Into<ColumnSpec>) -> Self {
        self.columns = columns.into();
        self
    }

    #[must_use]
    pub fn target_column(mut self, target: impl Into<String>) -> Self {
        self.target_column = Some(target.into());
        self
    }

    #[must_use]
    pub fn type_policy(mut self, policy: TypePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn auto_select(mut self, types: impl IntoIterator<Item = ColumnType>) -> Self {
        self.policy = self.policy.auto_select(types);
        self
    }

    #[must_use]
    pub fn restrict_to(mut self, types: impl IntoIterator<Item = ColumnType>) -> Self {
        self.policy = self.policy.restrict_to(types);
        self
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.policy = self.policy.strict(strict);
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key, value);
        self
    }

    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.params = self.params.merged(&params);
        self
    }

    #[must_use]
    pub fn with_df(self, df: DataFrame) -> Self {
        self.input.set(df);
        self
    }

    #[must_use]
    pub fn lazy_output(mut self, lazy: bool) -> Self {
        let name = self.core.name().to_string();
        self.core = StepCore::new(name, output_fields()).lazy_output(lazy);
        self
    }

    /// Copy with `params` bound on top of the current ones. The copy has
    /// its own output; `self` is left as it was.
    #[must_use]
    pub fn partial(&self, params: Params) -> Self {
        self.clone().params(params)
    }

    /// Applies every setting present in `settings`, type policy keys
    /// included. Keys that are absent keep their current values.
    pub fn configure(mut self, settings: ColumnSettings) -> Result<Self> {
        let issues = settings.validate();
        if !issues.is_empty() {
            return Err(sluice_model::ConfigError::Validation {
                model: ColumnSettings::model_name().to_string(),
                issues,
            }
            .into());
        }
        let params = settings.params();
        if let Some(columns) = settings.columns {
            self.columns = columns;
        }
        if let Some(target) = settings.target_column {
            self.target_column = Some(target);
        }
        if !settings.type_policy.is_empty() {
            self.policy = self.policy.overlay(&settings.type_policy);
        }
        self.params = self.params.merged(&params);
        match settings.for_each {
            Some(for_each) => self.for_each(for_each),
            None => Ok(self),
        }
    }

    /// Applies the settings stored under `key` in `ctx`.
    pub fn configure_from(self, ctx: &Context, key: &str) -> Result<Self> {
        let settings = ColumnSettings::from_context_at(ctx, key)?;
        self.configure(settings)
    }

    pub fn function(&self) -> &ColumnFunction {
        &self.function
    }

    pub fn shape(&self) -> &CallShape {
        &self.shape
    }

    pub fn mode(&self) -> CallMode {
        self.shape.mode
    }

    pub fn column_spec(&self) -> &ColumnSpec {
        &self.columns
    }

    pub fn target(&self) -> Option<&str> {
        self.target_column.as_deref()
    }

    pub fn policy_settings(&self) -> &TypePolicy {
        &self.policy
    }

    pub fn bound_params(&self) -> &Params {
        &self.params
    }

    /// Output column for `column` when `count` columns are mapped.
    ///
    /// Without a target the source column is replaced. A target names the
    /// result of a single column and is a suffix when there are several,
    /// unless it equals the column name.
    fn map_target(&self, column: &str, count: usize) -> String {
        match &self.target_column {
            None => column.to_string(),
            Some(target) if count == 1 || target == column => target.clone(),
            Some(target) => format!("{column}_{target}"),
        }
    }

    fn map_exprs(&self, columns: &[String]) -> Result<Vec<Expr>> {
        let bundles = map_arguments(&self.shape, columns, &self.params)?;
        bundles
            .iter()
            .zip(columns)
            .map(|(args, column)| {
                let target = self.map_target(column, columns.len());
                tracing::trace!(step = %self.name(), column = %column, target = %target, "Applying to column");
                Ok(self.function.call(args)?.alias(target))
            })
            .collect()
    }

    fn reduce_expr(&self, columns: &[String]) -> Result<Expr> {
        let target = self.reduce_target()?;
        let args = reduce_arguments(&self.shape, columns, &self.params, self.name())?;
        tracing::trace!(step = %self.name(), columns = ?columns, target = %target, "Reducing columns");
        Ok(self.function.call(&args)?.alias(target))
    }

    fn reduce_target(&self) -> Result<&str> {
        self.target_column
            .as_deref()
            .ok_or_else(|| StepError::ambiguous(self.name(), "reduce mode needs a target column"))
    }

    fn record_columns(&self, applied: &[String], skipped: Vec<String>) {
        self.output().set(APPLIED_COLUMNS_FIELD, applied.to_vec());
        self.output().set(SKIPPED_COLUMNS_FIELD, skipped);
    }
}

impl Clone for ColumnTransform {
    fn clone(&self) -> Self {
        Self {
            core: StepCore::new(self.core.name(), output_fields())
                .lazy_output(self.core.is_lazy()),
            input: self.input.clone(),
            function: self.function.clone(),
            default_mode: self.default_mode,
            mode_override: self.mode_override,
            shape: self.shape.clone(),
            columns: self.columns.clone(),
            target_column: self.target_column.clone(),
            policy: self.policy.clone(),
            params: self.params.clone(),
        }
    }
}

impl fmt::Debug for ColumnTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnTransform")
            .field("function", &self.function.name())
            .field("mode", &self.shape.mode)
            .field("columns", &self.columns)
            .field("target_column", &self.target_column)
            .field("policy", &self.policy)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Step for ColumnTransform {
    fn core(&self) -> &StepCore {
        &self.core
    }

    fn check(&self) -> Result<()> {
        if self.shape.mode == CallMode::Reduce {
            self.reduce_target()?;
        }
        Ok(())
    }

    fn execute(&self) -> Result<()> {
        let df = self.input.get(self.name())?;
        let schema = FrameSchema::of(&df);
        let selection = select_columns(&self.columns, &schema, &self.policy, self.name())?;
        let skipped = selection.skipped_names();

        if selection.is_empty() {
            tracing::warn!(
                step = %self.name(),
                skipped = ?skipped,
                "No columns selected, input returned unchanged"
            );
            self.record_columns(&[], skipped);
            self.output().set(DF_FIELD, df);
            return Ok(());
        }

        let exprs = match self.shape.mode {
            CallMode::Map => self.map_exprs(&selection.columns)?,
            CallMode::Reduce => vec![self.reduce_expr(&selection.columns)?],
        };
        let out = df.lazy().with_columns(exprs).collect()?;

        self.record_columns(&selection.columns, skipped);
        self.output().set(DF_FIELD, out);
        Ok(())
    }

    fn inputs(&self) -> JsonValue {
        json!({
            "function": self.function.name(),
            "mode": self.shape.mode,
            "columns": self.columns,
            "target_column": self.target_column,
            "type_policy": self.policy,
            "params": self.params.summary_json(),
        })
    }
}

impl Transformation for ColumnTransform {
    fn input(&self) -> &FrameSlot {
        &self.input
    }
}

/// Serializable settings of a [`ColumnTransform`].
///
/// Keys follow the builder names; `column` and `target_suffix` are
/// accepted as well, and the type policy keys sit at the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnSettings {
    #[serde(default, alias = "column", skip_serializing_if = "Option::is_none")]
    pub columns: Option<ColumnSpec>,
    #[serde(default, alias = "target_suffix", skip_serializing_if = "Option::is_none")]
    pub target_column: Option<String>,
    #[serde(flatten)]
    pub type_policy: PolicyOverrides,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub params: IndexMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_each: Option<bool>,
}

impl ColumnSettings {
    pub fn params(&self) -> Params {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect()
    }
}

impl ConfigModel for ColumnSettings {
    fn validate(&self) -> Vec<FieldIssue> {
        let mut issues = Vec::new();
        if self
            .target_column
            .as_deref()
            .is_some_and(|t| t.trim().is_empty())
        {
            issues.push(FieldIssue::invalid("target_column", "must not be empty"));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::StepExt;

    fn add_one() -> ColumnTransform {
        ColumnTransform::from_func("add_one", Signature::new().untyped("col"), |args| {
            Ok(args.col()? + lit(1))
        })
        .unwrap()
    }

    fn ints(df: &DataFrame, name: &str) -> Vec<Option<i64>> {
        df.column(name)
            .unwrap()
            .cast(&DataType::Int64)
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_entry_points_pick_default_mode() {
        assert_eq!(add_one().mode(), CallMode::Map);
        let one = ColumnTransform::from_multi_column_func(
            "ident",
            Signature::new().untyped("col"),
            |args| args.col(),
        )
        .unwrap();
        assert_eq!(one.mode(), CallMode::Reduce);
    }

    #[test]
    fn test_map_target_naming() {
        let t = add_one().target_column("next");
        assert_eq!(t.map_target("x", 1), "next");
        assert_eq!(t.map_target("x", 2), "x_next");
        assert_eq!(add_one().map_target("x", 2), "x");
    }

    #[test]
    fn test_reduce_without_target_fails_before_execute() {
        let sum = ColumnTransform::from_multi_column_func(
            "total",
            Signature::new().columns("cols"),
            |args| Ok(args.columns().into_iter().fold(lit(0), |acc, c| acc + c)),
        )
        .unwrap()
        .columns(["a"])
        .with_df(df! { "a" => [1i64] }.unwrap());
        let err = sum.run().unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"total: reduce mode needs a target column");
    }

    #[test]
    fn test_output_records_applied_columns() {
        let t = add_one()
            .columns(["y", "x"])
            .with_df(df! { "x" => [1i64], "y" => [2i64] }.unwrap());
        let out = t.run().unwrap();
        let applied: Vec<String> = out.get_as(APPLIED_COLUMNS_FIELD).unwrap();
        assert_eq!(applied, ["y", "x"]);
        let df = out.frame(DF_FIELD).unwrap();
        assert_eq!(ints(&df, "x"), [Some(2)]);
        assert_eq!(ints(&df, "y"), [Some(3)]);
    }

    #[test]
    fn test_for_each_override_reclassifies() {
        let t = add_one().for_each(false).unwrap();
        assert_eq!(t.mode(), CallMode::Reduce);
        let two = ColumnTransform::from_func(
            "pair",
            Signature::new().column("a").column("b"),
            |args| Ok(args.column("a")? - args.column("b")?),
        )
        .unwrap();
        assert!(two.for_each(true).is_err());
    }

    #[test]
    fn test_settings_accept_legacy_keys() {
        let settings = ColumnSettings::build(json!({
            "column": "a",
            "target_suffix": "out",
            "run_for_all_data_type": ["string"],
            "params": {"n": 1}
        }))
        .unwrap();
        assert_eq!(settings.columns, Some(ColumnSpec::from("a")));
        assert_eq!(settings.target_column.as_deref(), Some("out"));
        assert_eq!(settings.type_policy.auto_select, Some(vec![ColumnType::String]));
        assert_eq!(settings.type_policy.strict, None);
        assert_eq!(settings.params().get("n"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_settings_reject_blank_target() {
        let err = ColumnSettings::build(json!({"target_column": " "})).unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"invalid ColumnSettings: field 'target_column' must not be empty"
        );
    }
}
