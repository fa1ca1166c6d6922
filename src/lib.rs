//! trainerdb - document store access for a personal training app
//!
//! Stores user profiles, the exercise catalogue and workout history synced
//! from Hevy in CouchDB, falling back to an in-process store when CouchDB is
//! unreachable.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Database                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │   Users     │  │  Exercises  │  │   Workouts              │  │
//! │  │             │  │             │  │   (history, stats)      │  │
//! │  └──────┬──────┘  └──────┬──────┘  └───────────┬─────────────┘  │
//! │         │                │                     │                │
//! │         ▼                ▼                     ▼                │
//! │  ┌─────────────────────────────────────────────────────────────┐│
//! │  │                 Store (documents, views, _find)             ││
//! │  └──────────────────────────┬──────────────────────────────────┘│
//! │                             │                                   │
//! │                             ▼                                   │
//! │  ┌──────────────────────────────┐  ┌───────────────────────────┐│
//! │  │   CouchDB backend (reqwest)  │  │   Memory backend          ││
//! │  └──────────────────────────────┘  └───────────────────────────┘│
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Design documents are created when the store connects (see [`schema`]).

pub mod config;
pub mod domain;
pub mod error;
pub mod model;
pub mod query;
pub mod schema;
pub mod storage;
pub mod sync;
pub mod timestamp;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};
pub use model::{Exercise, TypedDocument, UserProfile, Workout, WorkoutStats};
pub use storage::{BackendKind, Document, Store};

/// The main database handle
///
/// Cheap to clone; construct once at start-up and pass it to whatever needs
/// it.
#[derive(Debug, Clone)]
pub struct Database {
    store: Store,
}

impl Database {
    /// Connect using `config`; falls back to memory, never fails
    pub async fn connect(config: &Config) -> Self {
        Self::with_store(Store::connect(config).await)
    }

    /// An empty in-memory database with its design documents in place
    pub async fn in_memory() -> Result<Self> {
        let store = Store::in_memory();
        schema::ensure_views(&store).await?;
        Ok(Self { store })
    }

    /// Wrap an existing store as is
    pub fn with_store(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}
