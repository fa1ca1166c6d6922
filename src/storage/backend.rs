//! The storage interface both backends implement

use async_trait::async_trait;

use crate::error::Result;
use crate::query::{Selector, ViewQuery, ViewRow};
use crate::storage::document::Document;

/// Which backend a store is running on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// A live CouchDB database
    CouchDb,
    /// The in-process fallback used when CouchDB is unreachable
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::CouchDb => f.write_str("couchdb"),
            BackendKind::Memory => f.write_str("memory"),
        }
    }
}

/// Raw document operations against one database
///
/// Backends report a missing view as `Error::SchemaMissing` and a stale
/// revision as `Error::Conflict`; the `Store` decides how to surface them.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Human-readable location, for logs and `status`
    fn describe(&self) -> String;

    /// Write a document. Without `_id` the backend assigns one; with `_id`
    /// an existing document is replaced only if `_rev` matches.
    async fn save(&self, doc: Document) -> Result<(String, String)>;

    /// Read a document; `None` when absent
    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Delete a document; `false` when absent
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Every document, design documents included
    async fn all_docs(&self) -> Result<Vec<Document>>;

    /// Query a view of a design document
    async fn query_view(&self, design: &str, view: &str, query: &ViewQuery) -> Result<Vec<ViewRow>>;

    /// Documents matching a Mango selector
    async fn find(&self, selector: &Selector) -> Result<Vec<Document>>;

    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }
}
