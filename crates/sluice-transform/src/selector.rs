//! Column selection against a frame schema.
//!
//! A [`ColumnSpec`] names columns explicitly or asks for automatic
//! selection; a [`TypePolicy`] says which column types may be picked
//! automatically and which may be touched at all. [`select_columns`]
//! resolves both against a [`FrameSchema`].

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use sluice_core::{Result, StepError};
use sluice_model::ConfigModel;

use crate::schema::{ColumnType, FrameSchema};

/// Marker that requests automatic selection.
pub const ALL_COLUMNS: &str = "*";

/// Which columns a transformation should operate on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnSpec {
    /// Pick columns by the type policy's auto-select types.
    #[default]
    Auto,
    /// Explicit names, ordered and free of duplicates.
    Named(Vec<String>),
}

impl ColumnSpec {
    /// Normalizes explicit names: blanks are dropped, duplicates removed
    /// keeping the first occurrence. No names, or any `"*"`, means `Auto`.
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if name.trim().is_empty() {
                continue;
            }
            if name == ALL_COLUMNS {
                return ColumnSpec::Auto;
            }
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        if unique.is_empty() {
            ColumnSpec::Auto
        } else {
            ColumnSpec::Named(unique)
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, ColumnSpec::Auto)
    }

    /// Explicit names; empty for `Auto`.
    pub fn names(&self) -> &[String] {
        match self {
            ColumnSpec::Auto => &[],
            ColumnSpec::Named(names) => names,
        }
    }
}

impl From<&str> for ColumnSpec {
    fn from(name: &str) -> Self {
        ColumnSpec::named([name])
    }
}

impl From<String> for ColumnSpec {
    fn from(name: String) -> Self {
        ColumnSpec::named([name])
    }
}

impl From<Vec<&str>> for ColumnSpec {
    fn from(names: Vec<&str>) -> Self {
        ColumnSpec::named(names)
    }
}

impl From<Vec<String>> for ColumnSpec {
    fn from(names: Vec<String>) -> Self {
        ColumnSpec::named(names)
    }
}

impl<const N: usize> From<[&str; N]> for ColumnSpec {
    fn from(names: [&str; N]) -> Self {
        ColumnSpec::named(names)
    }
}

impl Serialize for ColumnSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ColumnSpec::Auto => serializer.serialize_str(ALL_COLUMNS),
            ColumnSpec::Named(names) => names.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ColumnSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(ColumnSpec::named(one_or_many::<String, D>(deserializer)?))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, T, D>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    match OneOrMany::<T>::deserialize(deserializer) {
        Ok(OneOrMany::One(value)) => Ok(vec![value]),
        Ok(OneOrMany::Many(values)) => Ok(values),
        Err(_) => Err(de::Error::custom("expected a value or a list of values")),
    }
}

fn some_one_or_many<'de, T, D>(deserializer: D) -> std::result::Result<Option<Vec<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    one_or_many(deserializer).map(Some)
}

/// Type rules applied during selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePolicy {
    /// Types picked when no columns are named.
    #[serde(default, alias = "run_for_all_data_type", deserialize_with = "one_or_many")]
    pub auto_select: Vec<ColumnType>,
    /// Types the transformation may touch; empty means any.
    #[serde(default, alias = "limit_data_type", deserialize_with = "one_or_many")]
    pub restrict_to: Vec<ColumnType>,
    /// Whether a named column outside `restrict_to` is an error rather than skipped.
    #[serde(default, alias = "data_type_strict_mode")]
    pub strict: bool,
}

impl ConfigModel for TypePolicy {}

impl TypePolicy {
    #[must_use]
    pub fn auto_select(mut self, types: impl IntoIterator<Item = ColumnType>) -> Self {
        self.auto_select = types.into_iter().collect();
        self
    }

    #[must_use]
    pub fn restrict_to(mut self, types: impl IntoIterator<Item = ColumnType>) -> Self {
        self.restrict_to = types.into_iter().collect();
        self
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Applies the keys present in `overrides`, leaving the others as they are.
    #[must_use]
    pub fn overlay(mut self, overrides: &PolicyOverrides) -> Self {
        if let Some(types) = &overrides.auto_select {
            self.auto_select.clone_from(types);
        }
        if let Some(types) = &overrides.restrict_to {
            self.restrict_to.clone_from(types);
        }
        if let Some(strict) = overrides.strict {
            self.strict = strict;
        }
        self
    }

    fn allows(&self, ty: ColumnType) -> bool {
        self.restrict_to.is_empty() || self.restrict_to.contains(&ty)
    }
}

/// Partial [`TypePolicy`]; only the keys given in configuration are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverrides {
    #[serde(
        default,
        alias = "run_for_all_data_type",
        deserialize_with = "some_one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub auto_select: Option<Vec<ColumnType>>,
    #[serde(
        default,
        alias = "limit_data_type",
        deserialize_with = "some_one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub restrict_to: Option<Vec<ColumnType>>,
    #[serde(default, alias = "data_type_strict_mode", skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

impl PolicyOverrides {
    pub fn is_empty(&self) -> bool {
        self.auto_select.is_none() && self.restrict_to.is_none() && self.strict.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedColumn {
    pub name: String,
    pub actual: ColumnType,
}

/// Result of column selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Columns to operate on, in resolution order.
    pub columns: Vec<String>,
    /// Named columns dropped by a lenient type restriction.
    pub skipped: Vec<SkippedColumn>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn skipped_names(&self) -> Vec<String> {
        self.skipped.iter().map(|s| s.name.clone()).collect()
    }
}

/// Resolves `spec` against `schema` under `policy`.
///
/// Explicit names keep caller order; automatic selection follows schema
/// order. A named column that does not exist is an error. A column of a
/// type outside `policy.restrict_to` is an error in strict mode and is
/// skipped with a warning otherwise, which may leave the selection empty.
pub fn select_columns(
    spec: &ColumnSpec,
    schema: &FrameSchema,
    policy: &TypePolicy,
    step: &str,
) -> Result<Selection> {
    let candidates: Vec<(String, ColumnType)> = match spec {
        ColumnSpec::Named(names) => names
            .iter()
            .map(|name| {
                schema
                    .get(name)
                    .map(|ty| (name.clone(), ty))
                    .ok_or_else(|| StepError::MissingColumn {
                        column: name.clone(),
                        available: schema.names(),
                    })
            })
            .collect::<Result<_>>()?,
        ColumnSpec::Auto if policy.auto_select.is_empty() => {
            return Err(StepError::ambiguous(
                step,
                "no columns were given and no auto-select types are configured",
            ));
        }
        ColumnSpec::Auto => {
            let picked: Vec<_> = schema
                .iter()
                .filter(|(_, ty)| policy.auto_select.contains(ty))
                .map(|(name, ty)| (name.to_string(), ty))
                .collect();
            if picked.is_empty() {
                tracing::warn!(
                    step = %step,
                    types = ?policy.auto_select,
                    "No columns match the auto-select types"
                );
            }
            picked
        }
    };

    let mut selection = Selection::default();
    for (name, ty) in candidates {
        if policy.allows(ty) {
            selection.columns.push(name);
        } else if policy.strict {
            return Err(StepError::ColumnType {
                column: name,
                actual: ty.to_string(),
                expected: policy.restrict_to.iter().map(ToString::to_string).collect(),
            });
        } else {
            tracing::warn!(
                step = %step,
                column = %name,
                actual = %ty,
                allowed = ?policy.restrict_to,
                "Column type is not allowed, skipping"
            );
            selection.skipped.push(SkippedColumn { name, actual: ty });
        }
    }
    Ok(selection)
}
