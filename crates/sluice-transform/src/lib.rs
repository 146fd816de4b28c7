//! DataFrame transformations built on the sluice step lifecycle.
//!
//! A plain function that builds a polars expression becomes a reusable
//! [`Transformation`] through [`ColumnTransform::from_func`] (one call per
//! column by default) or [`ColumnTransform::from_multi_column_func`] (one
//! call over all columns by default). On every run the transformation:
//!
//! 1. selects columns by name or by type ([`selector`])
//! 2. uses the call shape classified when it was built ([`signature`])
//! 3. binds columns and options into argument bundles ([`broadcast`])
//! 4. evaluates the resulting expressions with polars
//!
//! [`TransformPipeline`] chains transformations, and [`library`] holds a
//! few ready-made ones.

pub mod broadcast;
pub mod columns;
pub mod function;
pub mod library;
pub mod pipeline;
pub mod schema;
pub mod selector;
pub mod signature;
pub mod transformation;

pub use broadcast::{Arguments, Binding, map_arguments, reduce_arguments};
pub use columns::{APPLIED_COLUMNS_FIELD, ColumnSettings, ColumnTransform, SKIPPED_COLUMNS_FIELD};
pub use function::{ColumnFunction, lit_value};
pub use pipeline::{STEPS_FIELD, TransformPipeline};
pub use schema::{ColumnType, FrameSchema};
pub use selector::{ColumnSpec, PolicyOverrides, Selection, SkippedColumn, TypePolicy, select_columns};
pub use signature::{CallMode, CallShape, OptionParam, ParamKind, Parameter, Signature, classify};
pub use transformation::{DF_FIELD, FrameSlot, FrameTransform, Transformation};
