use std::fmt;

use thiserror::Error;

/// A single problem found while validating one field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub problem: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// Required field has no value and no default.
    Missing,
    /// Value does not match the declared type.
    WrongType { expected: String, found: String },
    /// Field is not declared and the model forbids extra fields.
    Unknown,
    /// Model-specific rule violation.
    Invalid(String),
}

impl FieldIssue {
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: IssueKind::Missing,
        }
    }

    pub fn wrong_type(
        field: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            problem: IssueKind::WrongType {
                expected: expected.into(),
                found: found.into(),
            },
        }
    }

    pub fn unknown(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: IssueKind::Unknown,
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: IssueKind::Invalid(reason.into()),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            IssueKind::Missing => write!(f, "field '{}' is required but missing", self.field),
            IssueKind::WrongType { expected, found } => write!(
                f,
                "field '{}' expected type {expected}, found {found}",
                self.field
            ),
            IssueKind::Unknown => write!(f, "field '{}' is not declared", self.field),
            IssueKind::Invalid(reason) => write!(f, "field '{}' {reason}", self.field),
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {model}: {}", join_issues(.issues))]
    Validation {
        model: String,
        issues: Vec<FieldIssue>,
    },
    #[error("cannot build {model}: {message}")]
    Deserialize { model: String, message: String },
    #[error("key '{0}' not found in context")]
    KeyNotFound(String),
    #[error("value of kind {kind} cannot be represented as {target}")]
    Unrepresentable { kind: String, target: String },
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("toml write error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl ConfigError {
    /// Issues carried by a validation failure, empty for other kinds.
    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            ConfigError::Validation { issues, .. } => issues,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
