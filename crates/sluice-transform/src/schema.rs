//! Column type categories and the schema view used for selection.

use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Coarse column type used by type policies.
///
/// Widths are folded together: every integer dtype is `Integer`, both
/// float widths are `Float`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "int", alias = "long", alias = "short", alias = "byte")]
    Integer,
    #[serde(alias = "double", alias = "decimal")]
    Float,
    #[serde(alias = "str", alias = "utf8")]
    String,
    Binary,
    Date,
    #[serde(alias = "timestamp")]
    Datetime,
    Duration,
    Time,
    #[serde(alias = "array")]
    List,
    Struct,
    Null,
    Other,
}

impl ColumnType {
    pub fn from_dtype(dtype: &DataType) -> Self {
        if dtype.is_bool() {
            return ColumnType::Boolean;
        }
        if dtype.is_integer() {
            return ColumnType::Integer;
        }
        if dtype.is_float() {
            return ColumnType::Float;
        }
        if dtype.is_string() {
            return ColumnType::String;
        }
        if matches!(dtype, DataType::Binary) {
            return ColumnType::Binary;
        }
        if dtype.is_null() {
            return ColumnType::Null;
        }
        // Feature-gated dtypes are told apart by their display name.
        let name = dtype.to_string();
        if name == "date" {
            ColumnType::Date
        } else if name.starts_with("datetime") {
            ColumnType::Datetime
        } else if name.starts_with("duration") {
            ColumnType::Duration
        } else if name == "time" {
            ColumnType::Time
        } else if name.starts_with("list") || name.starts_with("array") {
            ColumnType::List
        } else if name.starts_with("struct") {
            ColumnType::Struct
        } else if name.starts_with("decimal") {
            ColumnType::Float
        } else {
            ColumnType::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Binary => "binary",
            ColumnType::Date => "date",
            ColumnType::Datetime => "datetime",
            ColumnType::Duration => "duration",
            ColumnType::Time => "time",
            ColumnType::List => "list",
            ColumnType::Struct => "struct",
            ColumnType::Null => "null",
            ColumnType::Other => "other",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
    }
}

/// Ordered column names and types of a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSchema {
    columns: Vec<(String, ColumnType)>,
}

impl FrameSchema {
    pub fn of(df: &DataFrame) -> Self {
        Self {
            columns: df
                .get_columns()
                .iter()
                .map(|c| (c.name().to_string(), ColumnType::from_dtype(c.dtype())))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ty)| *ty)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(n, ty)| (n.as_str(), *ty))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, ColumnType)> for FrameSchema {
    fn from_iter<I: IntoIterator<Item = (S, ColumnType)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(n, ty)| (n.into(), ty)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_of_frame() {
        let df = DataFrame::new(vec![
            Series::new("name".into(), vec!["a", "b"]).into(),
            Series::new("qty".into(), vec![1i32, 2]).into(),
            Series::new("price".into(), vec![1.5f64, 2.0]).into(),
            Series::new("flag".into(), vec![true, false]).into(),
        ])
        .unwrap();
        let schema = FrameSchema::of(&df);
        let types: Vec<_> = schema.iter().collect();
        assert_eq!(
            types,
            [
                ("name", ColumnType::String),
                ("qty", ColumnType::Integer),
                ("price", ColumnType::Float),
                ("flag", ColumnType::Boolean),
            ]
        );
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("int".parse::<ColumnType>().unwrap(), ColumnType::Integer);
        assert_eq!("STRING".parse::<ColumnType>().unwrap(), ColumnType::String);
        assert_eq!("double".parse::<ColumnType>().unwrap(), ColumnType::Float);
        assert!("blob".parse::<ColumnType>().is_err());
    }

    #[test]
    fn test_list_dtype() {
        let dtype = DataType::List(Box::new(DataType::Int64));
        assert_eq!(ColumnType::from_dtype(&dtype), ColumnType::List);
    }
}
