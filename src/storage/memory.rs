//! In-process fallback store
//!
//! Used when CouchDB cannot be reached, so the application still runs
//! during local development. Documents live in a map keyed by id; new ids
//! come from a monotonic counter (`mock_0`, `mock_1`, ...). Revisions and
//! conflicts follow CouchDB's rules, and the built-in views are evaluated
//! natively from their stored map sources.
//!
//! Nothing is persisted: the data is gone when the process exits.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use uuid::Uuid;
use viewkey::SortKey;

use super::backend::{Backend, BackendKind};
use super::document::Document;
use crate::error::{Error, Result};
use crate::query::{Selector, ViewQuery, ViewRow};
use crate::schema::{design_id, MapRule, ReduceRule};

#[derive(Debug, Default)]
struct State {
    docs: BTreeMap<String, Document>,
    counter: u64,
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Next revision token after `current`
fn next_rev(current: Option<&str>) -> String {
    let generation = current
        .and_then(|rev| rev.split('-').next())
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, Uuid::new_v4().simple())
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }

    async fn save(&self, mut doc: Document) -> Result<(String, String)> {
        let mut state = self.state.lock().await;

        let id = match doc.id() {
            Some(id) => id.to_string(),
            None => {
                let id = format!("mock_{}", state.counter);
                state.counter += 1;
                id
            }
        };

        let current = state.docs.get(&id).and_then(|d| d.rev().map(str::to_string));
        if current.as_deref() != doc.rev() {
            return Err(Error::Conflict { id });
        }

        let rev = next_rev(current.as_deref());
        doc.set_id(&id).set_rev(&rev);
        state.docs.insert(id.clone(), doc);
        Ok((id, rev))
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.state.lock().await.docs.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.state.lock().await.docs.remove(id).is_some())
    }

    async fn all_docs(&self) -> Result<Vec<Document>> {
        Ok(self.state.lock().await.docs.values().cloned().collect())
    }

    async fn query_view(&self, design: &str, view: &str, query: &ViewQuery) -> Result<Vec<ViewRow>> {
        let state = self.state.lock().await;
        let missing = || Error::SchemaMissing {
            design: design.to_string(),
            view: view.to_string(),
        };

        let design_doc = state.docs.get(&design_id(design)).ok_or_else(missing)?;
        let def = design_doc
            .get("views")
            .and_then(|views| views.get(view))
            .ok_or_else(missing)?;

        let map_source = def.get("map").and_then(Value::as_str).unwrap_or_default();
        let map = MapRule::parse(map_source).ok_or_else(|| Error::InvalidQuery {
            design: design.to_string(),
            view: view.to_string(),
            reason: "the in-memory store cannot evaluate this map function".to_string(),
        })?;

        let reduce = match def.get("reduce").and_then(Value::as_str) {
            Some(source) => Some(ReduceRule::parse(source).ok_or_else(|| Error::InvalidQuery {
                design: design.to_string(),
                view: view.to_string(),
                reason: "the in-memory store cannot evaluate this reduce function".to_string(),
            })?),
            None => None,
        };

        let mut rows: Vec<(SortKey, String, Value)> = Vec::new();
        for (id, doc) in state.docs.iter().filter(|(_, d)| !d.is_design()) {
            for (key, value) in map.emit(doc) {
                if query.matches_key(&key) {
                    rows.push((SortKey(key), id.clone(), value));
                }
            }
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        if query.reduce {
            let rule = reduce.ok_or_else(|| Error::InvalidQuery {
                design: design.to_string(),
                view: view.to_string(),
                reason: "reduce requested on a map-only view".to_string(),
            })?;
            if rows.is_empty() {
                return Ok(Vec::new());
            }
            let values: Vec<Value> = rows.into_iter().map(|(_, _, v)| v).collect();
            return Ok(vec![ViewRow {
                id: None,
                key: Value::Null,
                value: rule.reduce(&values),
                doc: None,
            }]);
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|(key, id, value)| ViewRow {
                doc: if query.include_docs {
                    state.docs.get(&id).cloned()
                } else {
                    None
                },
                id: Some(id),
                key: key.0,
                value,
            })
            .collect())
    }

    async fn find(&self, selector: &Selector) -> Result<Vec<Document>> {
        let state = self.state.lock().await;
        Ok(state
            .docs
            .values()
            .filter(|doc| !doc.is_design() && selector.matches(doc))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::design_doc;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_auto_ids_are_sequential() {
        let backend = MemoryBackend::new();
        let (first, rev) = backend.save(doc(json!({"a": 1}))).await.unwrap();
        let (second, _) = backend.save(doc(json!({"a": 2}))).await.unwrap();
        assert_eq!(first, "mock_0");
        assert_eq!(second, "mock_1");
        assert!(rev.starts_with("1-"));
    }

    #[tokio::test]
    async fn test_revision_conflicts() {
        let backend = MemoryBackend::new();
        let (id, rev1) = backend.save(doc(json!({"_id": "w1"}))).await.unwrap();

        // new document reusing an existing id
        let err = backend.save(doc(json!({"_id": "w1"}))).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        let mut current = backend.get(&id).await.unwrap().unwrap();
        current.set("title", "updated");
        let (_, rev2) = backend.save(current).await.unwrap();
        assert!(rev2.starts_with("2-"));
        assert_ne!(rev1, rev2);

        let stale = doc(json!({"_id": "w1", "_rev": rev1}));
        assert!(matches!(backend.save(stale).await, Err(Error::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_rev_on_unknown_id_conflicts() {
        let backend = MemoryBackend::new();
        let phantom = doc(json!({"_id": "ghost", "_rev": "3-abc"}));
        assert!(matches!(backend.save(phantom).await, Err(Error::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = MemoryBackend::new();
        backend.save(doc(json!({"_id": "x"}))).await.unwrap();
        assert!(backend.delete("x").await.unwrap());
        assert!(!backend.delete("x").await.unwrap());
        assert!(backend.get("x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_view_reports_schema_missing() {
        let backend = MemoryBackend::new();
        let err = backend
            .query_view("workouts", "by_date", &ViewQuery::new())
            .await
            .unwrap_err();
        assert!(err.is_schema_missing());

        backend.save(design_doc("workouts").unwrap().to_document()).await.unwrap();
        let err = backend
            .query_view("workouts", "no_such_view", &ViewQuery::new())
            .await
            .unwrap_err();
        assert!(err.is_schema_missing());
    }

    #[tokio::test]
    async fn test_view_rows_are_collated() {
        let backend = MemoryBackend::new();
        backend.save(design_doc("workouts").unwrap().to_document()).await.unwrap();
        for (id, start) in [("b", "2024-02-01T00:00:00.000Z"), ("a", "2024-01-01T00:00:00.000Z")] {
            backend
                .save(doc(json!({"_id": id, "type": "workout", "start_time": start, "exercises": []})))
                .await
                .unwrap();
        }

        let rows = backend
            .query_view("workouts", "by_date", &ViewQuery::new())
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(rows[0].doc.is_none());
    }

    #[tokio::test]
    async fn test_reduce_on_map_only_view_is_rejected() {
        let backend = MemoryBackend::new();
        backend.save(design_doc("workouts").unwrap().to_document()).await.unwrap();
        let err = backend
            .query_view("workouts", "by_date", &ViewQuery::new().reduce(true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn test_find_skips_design_documents() {
        let backend = MemoryBackend::new();
        backend.save(design_doc("users").unwrap().to_document()).await.unwrap();
        backend
            .save(doc(json!({"type": "user_profile", "username": "alice"})))
            .await
            .unwrap();

        let all = backend.find(&Selector::new()).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
