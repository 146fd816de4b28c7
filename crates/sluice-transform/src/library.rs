//! Ready-made column transformations.

use polars::prelude::*;
use sluice_core::Result;

use crate::columns::ColumnTransform;
use crate::schema::ColumnType;
use crate::signature::Signature;

/// String columns to lower case. Applies to every string column unless
/// columns are given; non-string columns are skipped.
pub fn lowercase() -> Result<ColumnTransform> {
    string_transform("lowercase", |c| c.str().to_lowercase())
}

/// String columns to upper case.
pub fn uppercase() -> Result<ColumnTransform> {
    string_transform("uppercase", |c| c.str().to_uppercase())
}

/// Strips leading and trailing whitespace from string columns.
pub fn trim() -> Result<ColumnTransform> {
    string_transform("trim", |c| c.str().strip_chars(lit(NULL)))
}

fn string_transform(name: &str, op: fn(Expr) -> Expr) -> Result<ColumnTransform> {
    Ok(
        ColumnTransform::from_func(name, Signature::new().column("column"), move |args| {
            Ok(op(args.col()?))
        })?
        .auto_select([ColumnType::String])
        .restrict_to([ColumnType::String]),
    )
}

/// Replaces nulls with the `value` option.
pub fn fill_null() -> Result<ColumnTransform> {
    ColumnTransform::from_func(
        "fill_null",
        Signature::new().column("column").option("value"),
        |args| Ok(args.col()?.fill_null(args.lit("value")?)),
    )
}

/// Multiplies numeric columns by the `factor` option. A column of another
/// type is an error.
pub fn multiply() -> Result<ColumnTransform> {
    Ok(ColumnTransform::from_func(
        "multiply",
        Signature::new().column("column").option("factor"),
        |args| Ok(args.col()? * args.lit("factor")?),
    )?
    .restrict_to([ColumnType::Integer, ColumnType::Float])
    .strict(true))
}

/// Row-wise sum of every selected column into the target column.
pub fn sum_columns() -> Result<ColumnTransform> {
    ColumnTransform::from_multi_column_func(
        "sum_columns",
        Signature::new().columns("columns"),
        |args| {
            args.columns()
                .into_iter()
                .reduce(|acc, c| acc + c)
                .ok_or_else(|| sluice_core::StepError::MissingParameter {
                    param: "columns".to_string(),
                })
        },
    )
}
