//! viewkey - CouchDB view key collation
//!
//! View rows are ordered by their keys using CouchDB's collation rules,
//! which define a total order over every JSON value:
//!
//! ```text
//! null < false < true < numbers < strings < arrays < objects
//! ```
//!
//! Arrays and objects compare element by element, and a shorter prefix
//! sorts first. Because objects sort after everything else, `{}` is the
//! conventional "greater than any value" sentinel for the upper bound of a
//! compound-key range:
//!
//! ```
//! use serde_json::json;
//! use viewkey::KeyRange;
//!
//! let range = KeyRange::prefix(vec![json!("squat")]);
//! assert!(range.contains(&json!(["squat", "2024-05-01T07:30:00.000Z"])));
//! assert!(!range.contains(&json!(["deadlift", "2024-05-01T07:30:00.000Z"])));
//! ```
//!
//! String comparison here is by code point. CouchDB itself collates strings
//! with ICU, which agrees for the ASCII identifiers and ISO-8601 timestamps
//! used as keys in practice but differs for mixed-case text.

mod collation;
mod range;

pub use collation::{collate, high_sentinel, SortKey};
pub use range::KeyRange;
