//! Binding selected columns and caller options to a call shape.
//!
//! Map mode yields one [`Arguments`] bundle per column. A scalar option
//! is repeated into every bundle; a list option must have exactly one
//! entry per column and is paired positionally. Reduce mode yields a
//! single bundle holding every column, with options passed as given.

use indexmap::IndexMap;
use polars::prelude::*;
use sluice_core::{Result, StepError};
use sluice_model::{ConfigError, FieldIssue, FromValue, Params, Value};

use crate::function::lit_value;
use crate::signature::{CallShape, OptionParam};

/// A data parameter bound to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub param: String,
    pub column: String,
}

/// Arguments for one call of a column function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    fixed: Vec<Binding>,
    variadic: Vec<String>,
    options: IndexMap<String, Value>,
}

impl Arguments {
    /// Expression for the first bound column.
    pub fn col(&self) -> Result<Expr> {
        self.fixed
            .first()
            .map(|b| b.column.as_str())
            .or_else(|| self.variadic.first().map(String::as_str))
            .map(col)
            .ok_or_else(|| StepError::MissingParameter {
                param: "column".to_string(),
            })
    }

    /// Expression for the column bound to data parameter `param`.
    pub fn column(&self, param: &str) -> Result<Expr> {
        self.fixed
            .iter()
            .find(|b| b.param == param)
            .map(|b| col(b.column.as_str()))
            .ok_or_else(|| StepError::MissingParameter {
                param: param.to_string(),
            })
    }

    /// Every bound column in binding order, fixed parameters first.
    pub fn columns(&self) -> Vec<Expr> {
        self.column_names().into_iter().map(col).collect()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fixed
            .iter()
            .map(|b| b.column.as_str())
            .chain(self.variadic.iter().map(String::as_str))
            .collect()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.fixed
    }

    /// Columns collected by the variadic parameter.
    pub fn variadic(&self) -> Vec<Expr> {
        self.variadic.iter().map(|c| col(c.as_str())).collect()
    }

    pub fn option(&self, name: &str) -> Result<&Value> {
        self.options
            .get(name)
            .ok_or_else(|| StepError::MissingParameter {
                param: name.to_string(),
            })
    }

    /// Typed option read.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.option(name)?;
        T::from_value(value).ok_or_else(|| {
            ConfigError::Validation {
                model: "parameters".to_string(),
                issues: vec![FieldIssue::wrong_type(name, T::EXPECTED, value.kind())],
            }
            .into()
        })
    }

    /// Option as a literal expression.
    pub fn lit(&self, name: &str) -> Result<Expr> {
        lit_value(self.option(name)?)
    }

    pub fn options(&self) -> &IndexMap<String, Value> {
        &self.options
    }
}

/// Rejects caller values that no option parameter declares.
fn reject_unknown(shape: &CallShape, params: &Params) -> Result<()> {
    let issues: Vec<FieldIssue> = params
        .keys()
        .filter(|key| !shape.option_names().any(|name| name == *key))
        .map(FieldIssue::unknown)
        .collect();
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            model: "parameters".to_string(),
            issues,
        }
        .into())
    }
}

fn default_or_missing(option: &OptionParam) -> Result<Value> {
    option
        .default
        .clone()
        .ok_or_else(|| StepError::MissingParameter {
            param: option.name.clone(),
        })
}

/// One bundle per column, in column order.
pub fn map_arguments(shape: &CallShape, columns: &[String], params: &Params) -> Result<Vec<Arguments>> {
    reject_unknown(shape, params)?;
    let Some(param) = shape.fixed.first() else {
        return Err(StepError::MissingParameter {
            param: "column".to_string(),
        });
    };

    let expected = columns.len();
    let mut per_column: Vec<(String, Vec<Value>)> = Vec::with_capacity(shape.options.len());
    for option in &shape.options {
        let values = match params.get(&option.name) {
            Some(Value::List(items)) if items.len() == expected => items.clone(),
            Some(Value::List(items)) => {
                return Err(StepError::ArityMismatch {
                    param: option.name.clone(),
                    supplied: items.len(),
                    expected,
                });
            }
            Some(value) => vec![value.clone(); expected],
            None => vec![default_or_missing(option)?; expected],
        };
        per_column.push((option.name.clone(), values));
    }

    Ok(columns
        .iter()
        .enumerate()
        .map(|(i, column)| Arguments {
            fixed: vec![Binding {
                param: param.clone(),
                column: column.clone(),
            }],
            variadic: Vec::new(),
            options: per_column
                .iter()
                .map(|(name, values)| (name.clone(), values[i].clone()))
                .collect(),
        })
        .collect())
}

/// A single bundle with every column: fixed parameters take columns in
/// order, the variadic parameter takes the rest.
pub fn reduce_arguments(
    shape: &CallShape,
    columns: &[String],
    params: &Params,
    step: &str,
) -> Result<Arguments> {
    reject_unknown(shape, params)?;
    let fixed_count = shape.fixed.len();
    let fits = if shape.variadic.is_some() {
        columns.len() >= fixed_count
    } else {
        columns.len() == fixed_count
    };
    if !fits {
        return Err(StepError::ColumnCount {
            step: step.to_string(),
            expected: fixed_count,
            found: columns.len(),
        });
    }

    let fixed = shape
        .fixed
        .iter()
        .zip(columns)
        .map(|(param, column)| Binding {
            param: param.clone(),
            column: column.clone(),
        })
        .collect();
    let variadic = columns[fixed_count..].to_vec();

    let mut options = IndexMap::with_capacity(shape.options.len());
    for option in &shape.options {
        let value = match params.get(&option.name) {
            Some(value) => value.clone(),
            None => default_or_missing(option)?,
        };
        options.insert(option.name.clone(), value);
    }

    Ok(Arguments {
        fixed,
        variadic,
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{CallMode, Signature, classify};

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| (*c).to_string()).collect()
    }

    fn tax_shape() -> CallShape {
        let sig = Signature::new().column("amount").option("rate");
        classify("tax", &sig, None, CallMode::Map).unwrap()
    }

    #[test]
    fn test_scalar_is_repeated() {
        let bundles = map_arguments(
            &tax_shape(),
            &names(&["a", "b", "c"]),
            &Params::new().with("rate", 0.1),
        )
        .unwrap();
        assert_eq!(bundles.len(), 3);
        assert!(bundles.iter().all(|b| b.get::<f64>("rate").unwrap() == 0.1));
        assert_eq!(bundles[2].column_names(), ["c"]);
    }

    #[test]
    fn test_list_pairs_positionally() {
        let bundles = map_arguments(
            &tax_shape(),
            &names(&["a", "b"]),
            &Params::new().with("rate", vec![0.08, 0.13]),
        )
        .unwrap();
        assert_eq!(bundles[0].get::<f64>("rate").unwrap(), 0.08);
        assert_eq!(bundles[1].get::<f64>("rate").unwrap(), 0.13);
        assert_eq!(bundles[1].column_names(), ["b"]);
    }

    #[test]
    fn test_list_length_must_match() {
        let err = map_arguments(
            &tax_shape(),
            &names(&["a", "b", "c"]),
            &Params::new().with("rate", vec![0.1, 0.2]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StepError::ArityMismatch { supplied: 2, expected: 3, .. }
        ));
    }

    #[test]
    fn test_default_and_missing() {
        let sig = Signature::new()
            .column("c")
            .option_with_default("scale", 2)
            .option("offset");
        let shape = classify("f", &sig, None, CallMode::Map).unwrap();
        let err = map_arguments(&shape, &names(&["a"]), &Params::new()).unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"parameter 'offset' is required but was not supplied and has no default"
        );
        let bundles =
            map_arguments(&shape, &names(&["a"]), &Params::new().with("offset", 1)).unwrap();
        assert_eq!(bundles[0].get::<i64>("scale").unwrap(), 2);
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let err = map_arguments(
            &tax_shape(),
            &names(&["a"]),
            &Params::new().with("rate", 0.1).with("ratio", 2),
        )
        .unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"invalid parameters: field 'ratio' is not declared"
        );
    }

    #[test]
    fn test_reduce_fixed_and_variadic() {
        let sig = Signature::new().column("first").columns("rest");
        let shape = classify("f", &sig, None, CallMode::Reduce).unwrap();
        let args = reduce_arguments(&shape, &names(&["a", "b", "c"]), &Params::new(), "f").unwrap();
        assert_eq!(args.bindings()[0].column, "a");
        assert_eq!(args.variadic().len(), 2);
        assert_eq!(args.column_names(), ["a", "b", "c"]);
    }

    #[test]
    fn test_reduce_column_count_must_match_fixed() {
        let sig = Signature::new().column("a").column("b");
        let shape = classify("pair", &sig, None, CallMode::Reduce).unwrap();
        let err = reduce_arguments(&shape, &names(&["x"]), &Params::new(), "pair").unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"pair binds 2 column parameter(s) but 1 columns were selected"
        );
    }

    #[test]
    fn test_reduce_passes_list_option_whole() {
        let sig = Signature::new().columns("cols").option("weights");
        let shape = classify("f", &sig, None, CallMode::Reduce).unwrap();
        let args = reduce_arguments(
            &shape,
            &names(&["a", "b"]),
            &Params::new().with("weights", vec![1, 2, 3]),
            "f",
        )
        .unwrap();
        assert_eq!(args.get::<Vec<i64>>("weights").unwrap(), [1, 2, 3]);
    }
}
