//! Mango selector evaluation
//!
//! Selectors are the JSON filter language of CouchDB's `_find` endpoint.
//! The CouchDB backend sends them as-is; the in-memory backend evaluates
//! them here.
//!
//! ```json
//! {"type": "user_profile", "username": "alice"}
//! {"start_time": {"$gte": "2024-01-01"}, "$or": [{"title": "Legs"}, {"title": "Push"}]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use viewkey::collate;

use crate::storage::document::Document;

/// A Mango selector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(Map<String, Value>);

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Require `field` to satisfy an operator object such as `{"$gt": 3}`
    pub fn op(mut self, field: impl Into<String>, op: &str, value: impl Into<Value>) -> Self {
        let field = field.into();
        let mut ops = match self.0.remove(&field) {
            Some(Value::Object(existing)) if is_operator_object(&existing) => existing,
            _ => Map::new(),
        };
        ops.insert(op.to_string(), value.into());
        self.0.insert(field, Value::Object(ops));
        self
    }

    /// Evaluate against a document
    pub fn matches(&self, doc: &Document) -> bool {
        evaluate_object(&self.0, doc)
    }
}

fn evaluate_object(selector: &Map<String, Value>, doc: &Document) -> bool {
    selector.iter().all(|(key, condition)| match key.as_str() {
        "$and" => as_selectors(condition)
            .map(|subs| subs.iter().all(|s| evaluate_object(s, doc)))
            .unwrap_or(false),
        "$or" => as_selectors(condition)
            .map(|subs| subs.iter().any(|s| evaluate_object(s, doc)))
            .unwrap_or(false),
        "$nor" => as_selectors(condition)
            .map(|subs| !subs.iter().any(|s| evaluate_object(s, doc)))
            .unwrap_or(false),
        "$not" => condition
            .as_object()
            .map(|sub| !evaluate_object(sub, doc))
            .unwrap_or(false),
        field => evaluate_condition(doc.get_path(field), condition),
    })
}

fn evaluate_condition(field: Option<&Value>, condition: &Value) -> bool {
    match condition {
        Value::Object(ops) if is_operator_object(ops) => ops
            .iter()
            .all(|(op, operand)| evaluate_operator(field, op, operand)),
        literal => field.map(|v| values_equal(v, literal)).unwrap_or(false),
    }
}

fn evaluate_operator(field: Option<&Value>, op: &str, operand: &Value) -> bool {
    match op {
        "$exists" => field.is_some() == operand.as_bool().unwrap_or(true),
        "$ne" => field.map(|v| !values_equal(v, operand)).unwrap_or(true),
        "$nin" => match (field, operand.as_array()) {
            (Some(v), Some(list)) => !list.iter().any(|item| values_equal(v, item)),
            (None, Some(_)) => true,
            _ => false,
        },
        "$not" => !evaluate_condition(field, operand),
        _ => {
            let Some(value) = field else {
                return false;
            };
            match op {
                "$eq" => values_equal(value, operand),
                "$gt" => collate(value, operand) == Ordering::Greater,
                "$gte" => collate(value, operand) != Ordering::Less,
                "$lt" => collate(value, operand) == Ordering::Less,
                "$lte" => collate(value, operand) != Ordering::Greater,
                "$in" => operand
                    .as_array()
                    .map(|list| list.iter().any(|item| values_equal(value, item)))
                    .unwrap_or(false),
                // Unknown operators never match
                _ => false,
            }
        }
    }
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

fn as_selectors(value: &Value) -> Option<Vec<&Map<String, Value>>> {
    value
        .as_array()?
        .iter()
        .map(Value::as_object)
        .collect::<Option<Vec<_>>>()
}

fn values_equal(a: &Value, b: &Value) -> bool {
    collate(a, b) == Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_doc() -> Document {
        Document::from_value(json!({
            "_id": "user-1",
            "type": "user_profile",
            "username": "alice",
            "age": 31,
            "goals": ["strength", "mobility"],
            "profile": {"units": "metric"}
        }))
        .unwrap()
    }

    #[test]
    fn test_equality() {
        let doc = make_doc();
        assert!(Selector::new()
            .eq("type", "user_profile")
            .eq("username", "alice")
            .matches(&doc));
        assert!(!Selector::new().eq("username", "bob").matches(&doc));
    }

    #[test]
    fn test_missing_field_never_equals() {
        let doc = make_doc();
        assert!(!Selector::new().eq("email", Value::Null).matches(&doc));
    }

    #[test]
    fn test_comparison() {
        let doc = make_doc();
        assert!(Selector::new().op("age", "$gt", 30).matches(&doc));
        assert!(Selector::new().op("age", "$gte", 30).op("age", "$lt", 32).matches(&doc));
        assert!(!Selector::new().op("age", "$lte", 30).matches(&doc));
    }

    #[test]
    fn test_exists_and_in() {
        let doc = make_doc();
        assert!(Selector::new().op("email", "$exists", false).matches(&doc));
        assert!(Selector::new()
            .op("username", "$in", json!(["alice", "bob"]))
            .matches(&doc));
        assert!(Selector::new()
            .op("username", "$nin", json!(["carol"]))
            .matches(&doc));
    }

    #[test]
    fn test_nested_path() {
        let doc = make_doc();
        assert!(Selector::new().eq("profile.units", "metric").matches(&doc));
        assert!(Selector::new().eq("goals.1", "mobility").matches(&doc));
    }

    #[test]
    fn test_and_or() {
        let doc = make_doc();
        let selector: Selector = serde_json::from_value(json!({
            "$or": [{"username": "bob"}, {"username": "alice"}],
            "$not": {"age": {"$lt": 18}}
        }))
        .unwrap();
        assert!(selector.matches(&doc));

        let selector: Selector = serde_json::from_value(json!({
            "$and": [{"username": "alice"}, {"age": 40}]
        }))
        .unwrap();
        assert!(!selector.matches(&doc));
    }
}
