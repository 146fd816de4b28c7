//! Configuration and data model shared by every sluice crate.
//!
//! - [`ConfigModel`]: typed, validated configuration structs over serde
//! - [`ModelSpec`] / [`Record`]: the same contract for fields known only at run time
//! - [`Context`]: nested key/value configuration with dotted lookup and merging
//! - [`Value`] / [`Params`]: dynamic values and keyword options

pub mod config;
pub mod context;
pub mod error;
pub mod field;
pub mod masked;
pub mod params;
pub mod record;
pub mod value;

pub use config::{ConfigModel, short_type_name};
pub use context::Context;
pub use error::{ConfigError, FieldIssue, IssueKind, Result};
pub use field::{ExtraFields, FieldSpec, FieldType, ModelSpec};
pub use masked::{Masked, REDACTED_VALUE};
pub use params::Params;
pub use record::Record;
pub use value::{FromValue, Value};
