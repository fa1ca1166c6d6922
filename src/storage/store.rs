//! Document access layer
//!
//! `Store` is the handle every other part of the crate goes through. It
//! wraps one [`Backend`] behind an `Arc`, so cloning it is cheap and all
//! clones share the same connection or in-memory map.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::backend::{Backend, BackendKind};
use super::couch::CouchBackend;
use super::document::Document;
use super::memory::MemoryBackend;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::Kind;
use crate::query::{Selector, ViewQuery, ViewRow};
use crate::schema;
use crate::validation::validate_document_id;

/// Shared handle to the document store
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend.describe())
            .finish()
    }
}

impl Store {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// A fresh in-memory store without design documents
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Connect to CouchDB, falling back to memory
    ///
    /// Never fails: any connection error is logged and the in-memory store
    /// is used instead. Design documents are bootstrapped either way.
    pub async fn connect(config: &Config) -> Self {
        let store = match CouchBackend::connect(config).await {
            Ok(backend) => {
                info!("Connected to CouchDB database {}", backend.database());
                Self::new(backend)
            }
            Err(e) => {
                error!("Failed to connect to CouchDB: {}", e);
                warn!("Using in-memory store; data will not be persisted");
                Self::in_memory()
            }
        };

        if let Err(e) = schema::ensure_views(&store).await {
            error!("Failed to create design documents: {}", e);
        }

        store
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Save any serializable value
    ///
    /// The value must serialize to a JSON object. Without `_id` the store
    /// assigns one. Returns the id and the new revision.
    pub async fn save<T: Serialize + ?Sized>(&self, value: &T) -> Result<(String, String)> {
        self.save_document(Document::from_serialize(value)?).await
    }

    pub async fn save_document(&self, doc: Document) -> Result<(String, String)> {
        if let Some(id) = doc.id() {
            validate_document_id(id)?;
        }
        let (id, rev) = self.backend.save(doc).await?;
        info!("Saved document {} ({})", id, rev);
        Ok((id, rev))
    }

    /// Save a typed document, tagging it with its `type`
    pub async fn save_kind<T: Kind>(&self, value: &T) -> Result<(String, String)> {
        self.save_document(Document::encode(value)?).await
    }

    /// Read a typed document; `None` when absent
    pub async fn get_kind<T: Kind>(&self, id: &str) -> Result<Option<T>> {
        match self.get(id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        self.backend.get(id).await
    }

    /// Replace an existing document
    ///
    /// The document must carry both `_id` and the `_rev` it was read at.
    pub async fn update(&self, doc: Document) -> Result<(String, String)> {
        let id = doc.id().ok_or(Error::MissingDocumentId)?;
        if doc.rev().is_none() {
            return Err(Error::MissingRevision { id: id.to_string() });
        }
        self.save_document(doc).await
    }

    /// Delete a document; `false` when it does not exist
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let deleted = self.backend.delete(id).await?;
        if deleted {
            info!("Deleted document {}", id);
        } else {
            debug!("Nothing to delete for {}", id);
        }
        Ok(deleted)
    }

    /// Every document in the database, design documents included
    pub async fn list_all(&self) -> Result<Vec<Document>> {
        self.backend.all_docs().await
    }

    /// Query a view; a missing design document or view yields no rows
    pub async fn query_view(&self, design: &str, view: &str, query: &ViewQuery) -> Result<Vec<ViewRow>> {
        match self.backend.query_view(design, view, query).await {
            Err(Error::SchemaMissing { .. }) => {
                info!("View {}/{} does not exist yet; returning no rows", design, view);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    pub async fn find(&self, selector: &Selector) -> Result<Vec<Document>> {
        self.backend.find(selector).await
    }

    pub async fn contains(&self, id: &str) -> Result<bool> {
        self.backend.contains(id).await
    }
}
