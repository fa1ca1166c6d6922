//! Typed documents
//!
//! Every domain document is a JSON object with a `type` tag. The structs
//! here give each kind a typed shape; fields they do not name are kept in
//! `extra` so documents written by other clients survive a read-modify-write
//! unchanged.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::storage::document::{Document, TYPE_FIELD};
use crate::timestamp;

/// The `type` discriminant of a stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    UserProfile,
    Exercise,
    Workout,
    BaseExerciseList,
    CustomExerciseList,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::UserProfile => "user_profile",
            DocType::Exercise => "exercise",
            DocType::Workout => "workout",
            DocType::BaseExerciseList => "base_exercise_list",
            DocType::CustomExerciseList => "custom_exercise_list",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document kind stored under a single `type` tag
pub trait Kind: Serialize + DeserializeOwned {
    const TYPE: DocType;

    fn id(&self) -> Option<&str>;
    fn rev(&self) -> Option<&str>;

    /// Adopt the identity of a stored document
    fn set_identity(&mut self, id: String, rev: Option<String>);
}

macro_rules! impl_kind {
    ($ty:ty, $tag:expr) => {
        impl Kind for $ty {
            const TYPE: DocType = $tag;

            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }

            fn rev(&self) -> Option<&str> {
                self.rev.as_deref()
            }

            fn set_identity(&mut self, id: String, rev: Option<String>) {
                self.id = Some(id);
                self.rev = rev;
            }
        }
    };
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Training days per week. Always written as a scalar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_workout_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hevy_api_key: Option<String>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub hevy_api_key_updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_kind!(UserProfile, DocType::UserProfile);

impl UserProfile {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    /// Decode a stored profile, tolerating the legacy list shape of
    /// `preferred_workout_days`
    pub fn from_document(mut doc: Document) -> Result<Self> {
        repair_workout_days(&mut doc);
        doc.decode()
    }
}

/// Older profiles stored `preferred_workout_days` as a list. Keep the first
/// element; an empty list becomes absent.
pub(crate) fn repair_workout_days(doc: &mut Document) -> bool {
    let Some(Value::Array(items)) = doc.get("preferred_workout_days") else {
        return false;
    };
    match items.first().cloned() {
        Some(first) => {
            info!(
                "Converted preferred_workout_days from list to scalar {} on '{}'",
                first,
                doc.id().unwrap_or_default()
            );
            doc.set("preferred_workout_days", first);
        }
        None => {
            doc.remove("preferred_workout_days");
        }
    }
    true
}

// =============================================================================
// Exercises
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Exercise template id assigned by Hevy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hevy_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muscle_group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_muscle_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<String>,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_kind!(Exercise, DocType::Exercise);

impl Exercise {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_hevy_id(mut self, hevy_id: impl Into<String>) -> Self {
        self.hevy_id = Some(hevy_id.into());
        self
    }

    pub fn with_muscle_group(mut self, group: impl Into<String>) -> Self {
        self.muscle_group = Some(group.into());
        self
    }
}

/// A whole exercise catalogue stored as one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseList {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Workouts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Workout id assigned by Hevy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hevy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(with = "timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,
    /// Length in seconds
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub exercises: Vec<WorkoutExercise>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_kind!(Workout, DocType::Workout);

impl Workout {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            id: None,
            rev: None,
            hevy_id: None,
            user_id: None,
            title: None,
            start_time,
            end_time: None,
            duration: 0,
            exercises: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_hevy_id(mut self, hevy_id: impl Into<String>) -> Self {
        self.hevy_id = Some(hevy_id.into());
        self
    }

    pub fn with_exercise(mut self, exercise: WorkoutExercise) -> Self {
        self.exercises.push(exercise);
        self
    }

    pub fn contains_exercise(&self, template_id: &str) -> bool {
        self.exercises.iter().any(|e| e.template_id == template_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutExercise {
    pub template_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub sets: Vec<WorkoutSet>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkoutExercise {
    pub fn new(template_id: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Totals produced by the `workouts/stats` reduce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutStats {
    #[serde(default)]
    pub total_duration: i64,
    #[serde(default)]
    pub total_exercises: u64,
    #[serde(default)]
    pub count: u64,
}

// =============================================================================
// Tagged union
// =============================================================================

/// Any typed document, discriminated by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedDocument {
    UserProfile(UserProfile),
    Exercise(Exercise),
    Workout(Workout),
    BaseExerciseList(ExerciseList),
    CustomExerciseList(ExerciseList),
}

impl TypedDocument {
    pub fn doc_type(&self) -> DocType {
        match self {
            TypedDocument::UserProfile(_) => DocType::UserProfile,
            TypedDocument::Exercise(_) => DocType::Exercise,
            TypedDocument::Workout(_) => DocType::Workout,
            TypedDocument::BaseExerciseList(_) => DocType::BaseExerciseList,
            TypedDocument::CustomExerciseList(_) => DocType::CustomExerciseList,
        }
    }

    /// Decode an untyped document; fails for design documents and unknown tags
    pub fn from_document(mut doc: Document) -> Result<Self> {
        if doc.get(TYPE_FIELD).is_none() {
            return Err(Error::InvalidDocument {
                reason: format!("document '{}' has no type", doc.id().unwrap_or_default()),
            });
        }
        if doc.doc_type() == Some(DocType::UserProfile.as_str()) {
            repair_workout_days(&mut doc);
        }
        Ok(serde_json::from_value(doc.into_value())?)
    }

    pub fn to_document(&self) -> Result<Document> {
        Document::from_serialize(self)
    }
}
