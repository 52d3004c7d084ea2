//! Backend-neutral query and result types.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{GraphMemError, GraphMemResult};

/// A parameter value passed alongside a Cypher query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    List(Vec<QueryValue>),
    Map(BTreeMap<String, QueryValue>),
}

impl QueryValue {
    /// Replace every `DateTime` (at any depth) with its RFC 3339 string.
    ///
    /// Used by backends without native temporal parameters.
    pub fn with_datetimes_as_strings(self) -> Self {
        match self {
            QueryValue::DateTime(dt) => {
                QueryValue::String(dt.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            QueryValue::List(items) => QueryValue::List(
                items
                    .into_iter()
                    .map(QueryValue::with_datetimes_as_strings)
                    .collect(),
            ),
            QueryValue::Map(entries) => QueryValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.with_datetimes_as_strings()))
                    .collect(),
            ),
            other => other,
        }
    }
}

impl From<bool> for QueryValue {
    fn from(v: bool) -> Self {
        QueryValue::Bool(v)
    }
}

impl From<i64> for QueryValue {
    fn from(v: i64) -> Self {
        QueryValue::Int(v)
    }
}

impl From<i32> for QueryValue {
    fn from(v: i32) -> Self {
        QueryValue::Int(i64::from(v))
    }
}

impl From<usize> for QueryValue {
    fn from(v: usize) -> Self {
        QueryValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for QueryValue {
    fn from(v: f64) -> Self {
        QueryValue::Float(v)
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        QueryValue::String(v)
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::String(v.to_string())
    }
}

impl From<&String> for QueryValue {
    fn from(v: &String) -> Self {
        QueryValue::String(v.clone())
    }
}

impl From<DateTime<Utc>> for QueryValue {
    fn from(v: DateTime<Utc>) -> Self {
        QueryValue::DateTime(v)
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(QueryValue::Null)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(v: Vec<T>) -> Self {
        QueryValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// Query parameters, keyed by name.
pub type Params = BTreeMap<String, QueryValue>;

/// A Cypher statement with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub text: String,
    pub params: Params,
}

impl Query {
    /// Create a query without parameters.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Params::new(),
        }
    }

    /// Add a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// A single result row, keyed by column name.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Uniform result of a query: rows, column names and an optional backend summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Record>,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
}

impl QueryResult {
    /// An empty result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Deserialize every row into `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> GraphMemResult<Vec<T>> {
        self.rows
            .into_iter()
            .map(|row| {
                serde_json::from_value(serde_json::Value::Object(row))
                    .map_err(|e| GraphMemError::parse(format!("Failed to decode row: {}", e)))
            })
            .collect()
    }

    /// Deserialize the first row into `T`, if any.
    pub fn first_typed<T: DeserializeOwned>(self) -> GraphMemResult<Option<T>> {
        Ok(self.into_typed::<T>()?.into_iter().next())
    }

    /// Read an integer column from the first row.
    pub fn first_i64(&self, column: &str) -> Option<i64> {
        self.rows.first().and_then(|r| r.get(column)).and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        })
    }
}
