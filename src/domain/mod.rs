//! Domain queries
//!
//! Typed operations on [`Database`] grouped by document kind. Every query
//! goes through a view, a selector or a direct read on the [`Store`]; a view
//! that has not been created yet reads as empty.
//!
//! [`Store`]: crate::storage::Store

mod exercises;
mod users;
mod workouts;

use tracing::{info, warn};

use crate::error::Result;
use crate::model::{Exercise, Kind, Workout};
use crate::query::{ViewQuery, ViewRow};
use crate::storage::Document;
use crate::Database;

/// Entities synced from Hevy, unique by `hevy_id`
pub trait Synced: Kind {
    /// Design document holding the `by_hevy_id` view
    const DESIGN: &'static str;

    fn hevy_id(&self) -> Option<&str>;
}

impl Synced for Exercise {
    const DESIGN: &'static str = crate::schema::EXERCISES;

    fn hevy_id(&self) -> Option<&str> {
        self.hevy_id.as_deref()
    }
}

impl Synced for Workout {
    const DESIGN: &'static str = crate::schema::WORKOUTS;

    fn hevy_id(&self) -> Option<&str> {
        self.hevy_id.as_deref()
    }
}

impl Database {
    /// Look up a synced entity by its Hevy id
    pub async fn find_by_hevy_id<T: Synced>(&self, hevy_id: &str) -> Result<Option<T>> {
        match self.synced_document::<T>(hevy_id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// The stored document holding a Hevy id, undecoded
    async fn synced_document<T: Synced>(&self, hevy_id: &str) -> Result<Option<Document>> {
        let query = ViewQuery::new().key(hevy_id).include_docs(true).limit(1);
        let rows = self.store().query_view(T::DESIGN, "by_hevy_id", &query).await?;
        Ok(rows.into_iter().next().and_then(row_document))
    }

    /// Save a synced entity, replacing the document that already holds its
    /// Hevy id
    ///
    /// The stored `_id` and `_rev` are carried over, so re-ingesting the same
    /// payload produces a new revision of the same document. Without a Hevy
    /// id the entity is saved as new. The stored document does not have to
    /// fit `T`; a malformed one is replaced.
    pub async fn upsert_synced<T: Synced>(&self, mut item: T) -> Result<String> {
        let hevy_id = item.hevy_id().map(str::to_string);
        if let Some(hevy_id) = hevy_id {
            if let Some(existing) = self.synced_document::<T>(&hevy_id).await? {
                if let Some(id) = existing.id() {
                    item.set_identity(id.to_string(), existing.rev().map(str::to_string));
                }
            }
        }

        let (id, _) = self.store().save_kind(&item).await?;
        info!("Saved {} with ID: {}", T::TYPE, id);
        Ok(id)
    }
}

/// The document behind a view row: the included doc, else the emitted value
pub(crate) fn row_document(row: ViewRow) -> Option<Document> {
    match row.doc {
        Some(doc) => Some(doc),
        None => Document::from_value(row.value).ok(),
    }
}

/// Decode documents of one kind, skipping any that do not fit its shape
pub(crate) fn decode_all<T: Kind>(docs: impl IntoIterator<Item = Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id().unwrap_or_default().to_string();
            match doc.decode() {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Skipping malformed {} document {}: {}", T::TYPE, id, e);
                    None
                }
            }
        })
        .collect()
}

/// Decode view rows of one kind
pub(crate) fn decode_rows<T: Kind>(rows: Vec<ViewRow>) -> Vec<T> {
    decode_all(rows.into_iter().filter_map(row_document))
}
