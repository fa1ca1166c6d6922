//! Query primitives shared by both storage backends
//!
//! View queries read the indexes defined in design documents; selectors
//! filter documents directly, the way CouchDB's `_find` does.

pub mod selector;
pub mod view;

pub use selector::Selector;
pub use view::{ViewQuery, ViewRow};
