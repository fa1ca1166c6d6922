//! View query options and result rows

use serde::{Deserialize, Serialize};
use serde_json::Value;
use viewkey::KeyRange;

use crate::storage::document::Document;

/// Options for a single view query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewQuery {
    /// Exact key match; takes precedence over `range`
    pub key: Option<Value>,
    /// Inclusive key range
    pub range: KeyRange,
    /// Apply the view's reduce function
    pub reduce: bool,
    /// Attach the emitting document to each row
    pub include_docs: bool,
    pub limit: Option<usize>,
}

impl ViewQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: impl Into<Value>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn range(mut self, range: KeyRange) -> Self {
        self.range = range;
        self
    }

    pub fn reduce(mut self, reduce: bool) -> Self {
        self.reduce = reduce;
        self
    }

    pub fn include_docs(mut self, include_docs: bool) -> Self {
        self.include_docs = include_docs;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a row key passes the key / range filter
    pub fn matches_key(&self, key: &Value) -> bool {
        match &self.key {
            Some(exact) => KeyRange::exact(exact.clone()).contains(key),
            None => self.range.contains(key),
        }
    }
}

/// One row of a view result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    /// Id of the emitting document; absent on reduced rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,
}
