//! Design documents and view bootstrap
//!
//! Each domain document type owns one design document holding its views:
//!
//! | Design doc  | View             | Key                                | Value                       | Reduce        |
//! |-------------|------------------|------------------------------------|-----------------------------|---------------|
//! | `users`     | `by_username`    | username                           | document                    |               |
//! | `users`     | `by_email`       | email                              | document                    |               |
//! | `exercises` | `by_hevy_id`     | Hevy id                            | document                    |               |
//! | `exercises` | `by_muscle_group`| muscle group                       | document                    |               |
//! | `exercises` | `all`            | `_id`                              | document                    |               |
//! | `workouts`  | `by_hevy_id`     | Hevy id                            | document                    |               |
//! | `workouts`  | `by_date`        | start time                         | document                    |               |
//! | `workouts`  | `by_exercise`    | `[template id, start time]`        | document                    |               |
//! | `workouts`  | `stats`          | start time                         | `{duration, exercise_count}`| workout totals|
//!
//! [`ensure_views`] creates missing design documents and never touches
//! existing ones. Changing a deployed view is an administrative step done
//! with [`create_view`].

mod rules;

pub use rules::{MapRule, ReduceRule};

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::storage::document::{Document, DESIGN_PREFIX};
use crate::storage::store::Store;

pub const USERS: &str = "users";
pub const EXERCISES: &str = "exercises";
pub const WORKOUTS: &str = "workouts";

/// A view definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDef {
    pub name: &'static str,
    pub map: MapRule,
    pub reduce: Option<ReduceRule>,
}

/// A design document definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignDoc {
    pub name: &'static str,
    pub views: &'static [ViewDef],
}

const fn view(name: &'static str, map: MapRule) -> ViewDef {
    ViewDef {
        name,
        map,
        reduce: None,
    }
}

/// The fixed design documents
pub const DESIGN_DOCS: &[DesignDoc] = &[
    DesignDoc {
        name: USERS,
        views: &[
            view("by_username", MapRule::field("user_profile", "username")),
            view("by_email", MapRule::field("user_profile", "email")),
        ],
    },
    DesignDoc {
        name: EXERCISES,
        views: &[
            view("by_hevy_id", MapRule::field("exercise", "hevy_id")),
            view("by_muscle_group", MapRule::field("exercise", "muscle_group")),
            view("all", MapRule::field("exercise", "_id")),
        ],
    },
    DesignDoc {
        name: WORKOUTS,
        views: &[
            view("by_hevy_id", MapRule::field("workout", "hevy_id")),
            view("by_date", MapRule::field("workout", "start_time")),
            view("by_exercise", MapRule::ExerciseTimeline),
            ViewDef {
                name: "stats",
                map: MapRule::WorkoutSummary,
                reduce: Some(ReduceRule::WorkoutTotals),
            },
        ],
    },
];

/// Id of the design document called `name`
pub fn design_id(name: &str) -> String {
    format!("{DESIGN_PREFIX}{name}")
}

impl DesignDoc {
    pub fn id(&self) -> String {
        design_id(self.name)
    }

    pub fn view(&self, name: &str) -> Option<&ViewDef> {
        self.views.iter().find(|v| v.name == name)
    }

    /// Render as a CouchDB design document
    pub fn to_document(&self) -> Document {
        let views: Map<String, Value> = self
            .views
            .iter()
            .map(|v| (v.name.to_string(), v.to_json()))
            .collect();

        let mut doc = Document::with_id(self.id());
        doc.set("language", "javascript").set("views", views);
        doc
    }
}

impl ViewDef {
    fn to_json(&self) -> Value {
        let mut def = Map::new();
        def.insert("map".to_string(), Value::String(self.map.source().into_owned()));
        if let Some(reduce) = self.reduce {
            def.insert("reduce".to_string(), Value::String(reduce.source().to_string()));
        }
        Value::Object(def)
    }
}

/// Look up a fixed design document by name
pub fn design_doc(name: &str) -> Option<&'static DesignDoc> {
    DESIGN_DOCS.iter().find(|d| d.name == name)
}

/// Create any missing design documents
///
/// Returns the names of the design documents that were created. Existing
/// design documents are left as they are, even if their views differ.
pub async fn ensure_views(store: &Store) -> Result<Vec<&'static str>> {
    let mut created = Vec::new();

    for design in DESIGN_DOCS {
        let id = design.id();
        if store.contains(&id).await? {
            debug!("Design document {} already exists", id);
            continue;
        }

        info!("Creating {} design document", design.name);
        match store.save_document(design.to_document()).await {
            Ok(_) => {
                info!("{} design document created successfully", design.name);
                created.push(design.name);
            }
            // Another process created it between the check and the write
            Err(Error::Conflict { .. }) => {
                debug!("Design document {} created concurrently", id);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(created)
}

/// Add or replace one view of a design document
///
/// Sibling views are kept. The design document is created if it does not
/// exist yet.
pub async fn create_view(
    store: &Store,
    design: &str,
    view: &str,
    map: &str,
    reduce: Option<&str>,
) -> Result<(String, String)> {
    let id = design_id(design);
    let mut doc = match store.get(&id).await? {
        Some(doc) => doc,
        None => {
            let mut doc = Document::with_id(&id);
            doc.set("language", "javascript");
            doc
        }
    };

    let mut views = doc
        .get("views")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut def = json!({ "map": map });
    if let Some(reduce) = reduce {
        def["reduce"] = Value::String(reduce.to_string());
    }
    views.insert(view.to_string(), def);
    doc.set("views", views);

    info!("Writing view {}/{}", design, view);
    store.save_document(doc).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_shape() {
        let names: Vec<&str> = DESIGN_DOCS.iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["users", "exercises", "workouts"]);

        let workouts = design_doc("workouts").unwrap();
        assert_eq!(workouts.views.len(), 4);
        assert_eq!(workouts.view("stats").unwrap().reduce, Some(ReduceRule::WorkoutTotals));
        assert!(workouts.view("by_date").unwrap().reduce.is_none());
    }

    #[test]
    fn test_design_document_rendering() {
        let doc = design_doc("exercises").unwrap().to_document();
        assert_eq!(doc.id(), Some("_design/exercises"));
        assert!(doc.is_design());

        let map = doc.get_path("views.by_hevy_id.map").and_then(Value::as_str).unwrap();
        assert_eq!(MapRule::parse(map), Some(MapRule::field("exercise", "hevy_id")));
        assert!(doc.get_path("views.by_hevy_id.reduce").is_none());
    }

    #[test]
    fn test_stats_view_has_reduce_source() {
        let doc = design_doc("workouts").unwrap().to_document();
        let reduce = doc.get_path("views.stats.reduce").and_then(Value::as_str).unwrap();
        assert!(reduce.contains("rereduce"));
    }
}
