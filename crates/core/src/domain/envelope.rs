use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::intent::Intent;

/// One result row. Data sources either name their columns or hand back bare tuples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowRecord {
    Mapping(Map<String, Value>),
    Positional(Vec<Value>),
}

impl RowRecord {
    pub fn len(&self) -> usize {
        match self {
            Self::Mapping(map) => map.len(),
            Self::Positional(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell lookup by header for mappings (falling back to the lowercase key), by index otherwise.
    pub fn cell(&self, header: &str, index: usize) -> Option<&Value> {
        match self {
            Self::Mapping(map) => {
                map.get(header).or_else(|| map.get(&header.to_ascii_lowercase()))
            }
            Self::Positional(values) => values.get(index),
        }
    }

    pub fn values(&self) -> Vec<&Value> {
        match self {
            Self::Mapping(map) => map.values().collect(),
            Self::Positional(values) => values.iter().collect(),
        }
    }
}

/// Outcome of running one query. Either tabular data or an error, never both.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    headers: Vec<String>,
    rows: Vec<RowRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ExecutionResult {
    pub fn success(headers: Vec<String>, rows: Vec<RowRecord>) -> Self {
        Self { headers, rows, error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { headers: Vec::new(), rows: Vec::new(), error: Some(error.into()) }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[RowRecord] {
        &self.rows
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn into_table(self) -> Result<(Vec<String>, Vec<RowRecord>), String> {
        match self.error {
            Some(error) => Err(error),
            None => Ok((self.headers, self.rows)),
        }
    }
}

/// The normalized response every agent hands back to the caller.
///
/// When `error` is present the tabular fields must not be trusted, even if partially filled.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<RowRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultEnvelope {
    pub fn for_agent(agent: Intent) -> Self {
        Self { agent: Some(agent), ..Self::default() }
    }

    pub fn failure(agent: Intent, error: impl Into<String>) -> Self {
        Self::for_agent(agent).with_error(error)
    }

    pub fn with_query(mut self, sql_query: impl Into<String>) -> Self {
        self.sql_query = Some(sql_query.into());
        self
    }

    pub fn with_table(mut self, headers: Vec<String>, rows: Vec<RowRecord>) -> Self {
        self.headers = headers;
        self.rows = rows;
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_chart(mut self, chart_filename: impl Into<String>) -> Self {
        self.chart_filename = Some(chart_filename.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
