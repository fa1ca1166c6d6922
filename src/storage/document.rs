//! Document representation
//!
//! A Document is a JSON object as stored in CouchDB. The reserved `_id` and
//! `_rev` keys carry identity and the optimistic-concurrency revision; the
//! `type` key says which domain kind the document holds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::Kind;

pub const ID_FIELD: &str = "_id";
pub const REV_FIELD: &str = "_rev";
pub const TYPE_FIELD: &str = "type";

/// Prefix of design document ids
pub const DESIGN_PREFIX: &str = "_design/";

/// A document in the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Create an empty document without an id
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty document with the given id
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut doc = Self::new();
        doc.set_id(id);
        doc
    }

    /// Wrap a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::InvalidDocument {
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }

    /// Normalize any serializable value into a document
    ///
    /// Serialization is the normalization step: timestamps become ISO-8601
    /// strings, nested structs become objects. The result must be an object.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Self::from_value(serde_json::to_value(value)?)
    }

    /// Encode a typed document, adding its `type` tag
    pub fn encode<T: Kind>(value: &T) -> Result<Self> {
        let mut doc = Self::from_serialize(value)?;
        doc.set(TYPE_FIELD, T::TYPE.as_str());
        Ok(doc)
    }

    /// Decode into a typed document, checking the `type` tag
    pub fn decode<T: Kind>(mut self) -> Result<T> {
        match self.doc_type() {
            Some(t) if t == T::TYPE.as_str() => {}
            other => {
                return Err(Error::TypeMismatch {
                    id: self.id().unwrap_or_default().to_string(),
                    expected: T::TYPE.as_str(),
                    actual: other.unwrap_or("<none>").to_string(),
                })
            }
        }
        self.fields.remove(TYPE_FIELD);
        Ok(serde_json::from_value(Value::Object(self.fields))?)
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn rev(&self) -> Option<&str> {
        self.fields.get(REV_FIELD).and_then(Value::as_str)
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.fields.get(TYPE_FIELD).and_then(Value::as_str)
    }

    pub fn set_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.fields.insert(ID_FIELD.to_string(), Value::String(id.into()));
        self
    }

    pub fn set_rev(&mut self, rev: impl Into<String>) -> &mut Self {
        self.fields.insert(REV_FIELD.to_string(), Value::String(rev.into()));
        self
    }

    /// Whether this is a design document
    pub fn is_design(&self) -> bool {
        self.id().map(|id| id.starts_with(DESIGN_PREFIX)).unwrap_or(false)
    }

    /// Get a top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a field by dotted path (`exercises.0.template_id` style)
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set a field value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_document_creation() {
        let mut doc = Document::with_id("workout-1");
        doc.set("title", "Leg day").set("duration", 3600);

        assert_eq!(doc.id(), Some("workout-1"));
        assert_eq!(doc.rev(), None);
        assert_eq!(doc.get("title"), Some(&json!("Leg day")));
    }

    #[test]
    fn test_normalizes_timestamps() {
        #[derive(Serialize)]
        struct Entry {
            at: chrono::DateTime<Utc>,
            nested: Vec<chrono::DateTime<Utc>>,
        }
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let doc = Document::from_serialize(&Entry { at: ts, nested: vec![ts] }).unwrap();

        let at = doc.get("at").and_then(Value::as_str).unwrap();
        assert!(at.starts_with("2024-01-02T03:04:05"));
        assert!(doc.get_path("nested.0").unwrap().is_string());
    }

    #[test]
    fn test_rejects_non_objects() {
        assert!(Document::from_serialize(&vec![1, 2, 3]).is_err());
        assert!(Document::from_value(json!("text")).is_err());
    }

    #[test]
    fn test_dotted_path() {
        let doc = Document::from_value(json!({
            "exercises": [{"template_id": "squat"}]
        }))
        .unwrap();
        assert_eq!(doc.get_path("exercises.0.template_id"), Some(&json!("squat")));
        assert_eq!(doc.get_path("exercises.1.template_id"), None);
    }

    #[test]
    fn test_design_detection() {
        assert!(Document::with_id("_design/users").is_design());
        assert!(!Document::with_id("base_exercises").is_design());
    }
}
