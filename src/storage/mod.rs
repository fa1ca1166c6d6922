//! Storage layer for trainerdb
//!
//! Raw document access over CouchDB, or over an in-process map when
//! CouchDB is unreachable.

pub mod backend;
pub mod couch;
pub mod document;
pub mod memory;
pub mod store;

pub use backend::{Backend, BackendKind};
pub use document::Document;
pub use store::Store;
