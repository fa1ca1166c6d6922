//! Key ranges for view queries

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::collation::{collate, high_sentinel};

/// An inclusive range of view keys
///
/// A missing bound is unbounded on that side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyRange {
    pub start: Option<Value>,
    pub end: Option<Value>,
}

impl KeyRange {
    /// Keys equal to `key`
    pub fn exact(key: impl Into<Value>) -> Self {
        let key = key.into();
        Self {
            start: Some(key.clone()),
            end: Some(key),
        }
    }

    /// Keys in `[start, end]`
    pub fn between(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    /// Compound keys that begin with `prefix`: `[prefix..]` to `[prefix.., {}]`
    pub fn prefix(prefix: Vec<Value>) -> Self {
        let mut upper = prefix.clone();
        upper.push(high_sentinel());
        Self {
            start: Some(Value::Array(prefix)),
            end: Some(Value::Array(upper)),
        }
    }

    /// Whether `key` falls inside the range
    pub fn contains(&self, key: &Value) -> bool {
        let above_start = self
            .start
            .as_ref()
            .map(|s| collate(key, s) != Ordering::Less)
            .unwrap_or(true);
        let below_end = self
            .end
            .as_ref()
            .map(|e| collate(key, e) != Ordering::Greater)
            .unwrap_or(true);
        above_start && below_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_between_is_inclusive() {
        let range = KeyRange::between("2024-01-01", "2024-01-31");
        assert!(range.contains(&json!("2024-01-01")));
        assert!(range.contains(&json!("2024-01-31")));
        assert!(!range.contains(&json!("2024-02-01")));
    }

    #[test]
    fn test_exact() {
        let range = KeyRange::exact("ex1");
        assert!(range.contains(&json!("ex1")));
        assert!(!range.contains(&json!("ex10")));
    }

    #[test]
    fn test_unbounded() {
        let range = KeyRange::default();
        assert!(range.contains(&json!(null)));
        assert!(range.contains(&json!({"a": 1})));
    }
}
