//! Exercise catalogue queries
//!
//! Exercises live in two shapes: one document per synced exercise (unique
//! by Hevy id), and whole catalogue lists stored under a fixed id
//! (`base_exercises`, `custom_exercises_{user}`).

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{DocType, Exercise, ExerciseList};
use crate::query::ViewQuery;
use crate::schema::EXERCISES;
use crate::storage::Document;
use crate::Database;

use super::decode_rows;

pub const BASE_EXERCISES_ID: &str = "base_exercises";

/// Id of a user's custom exercise list
pub fn custom_exercises_id(user_id: &str) -> String {
    format!("custom_exercises_{user_id}")
}

impl Database {
    /// Save a synced exercise; see [`Database::upsert_synced`]
    pub async fn upsert_exercise(&self, exercise: Exercise) -> Result<String> {
        self.upsert_synced(exercise).await
    }

    pub async fn get_exercise_by_hevy_id(&self, hevy_id: &str) -> Result<Option<Exercise>> {
        self.find_by_hevy_id(hevy_id).await
    }

    pub async fn get_exercises_by_muscle_group(&self, muscle_group: &str) -> Result<Vec<Exercise>> {
        let query = ViewQuery::new().key(muscle_group).include_docs(true);
        let rows = self.store().query_view(EXERCISES, "by_muscle_group", &query).await?;
        Ok(decode_rows(rows))
    }

    /// Every synced exercise, ordered by document id
    pub async fn get_all_exercises(&self) -> Result<Vec<Exercise>> {
        let query = ViewQuery::new().include_docs(true);
        let rows = self.store().query_view(EXERCISES, "all", &query).await?;
        Ok(decode_rows(rows))
    }

    /// Replace a whole exercise list
    ///
    /// Without a user this is the shared base list, otherwise the user's
    /// custom list. The list is written as one document; the last writer
    /// wins.
    pub async fn save_exercises(
        &self,
        exercises: Vec<Exercise>,
        user_id: Option<&str>,
    ) -> Result<(String, String)> {
        let (id, doc_type) = match user_id {
            Some(user) => (custom_exercises_id(user), DocType::CustomExerciseList),
            None => (BASE_EXERCISES_ID.to_string(), DocType::BaseExerciseList),
        };

        let count = exercises.len();
        let rev = self
            .store()
            .get(&id)
            .await?
            .and_then(|doc| doc.rev().map(str::to_string));
        let list = ExerciseList {
            id: Some(id),
            rev,
            exercises,
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        let mut doc = Document::from_serialize(&list)?;
        doc.set("type", doc_type.as_str());
        let saved = self.store().save_document(doc).await?;

        let kind = if user_id.is_some() { "custom" } else { "base" };
        info!("Saved {} {} exercises", count, kind);
        Ok(saved)
    }

    /// The base list, followed by the user's custom list when requested
    pub async fn get_exercises(&self, user_id: Option<&str>, include_custom: bool) -> Result<Vec<Exercise>> {
        let mut exercises = self.load_exercise_list(BASE_EXERCISES_ID).await?;
        if include_custom {
            if let Some(user) = user_id {
                exercises.extend(self.get_custom_exercises(user).await?);
            }
        }
        Ok(exercises)
    }

    pub async fn get_custom_exercises(&self, user_id: &str) -> Result<Vec<Exercise>> {
        self.load_exercise_list(&custom_exercises_id(user_id)).await
    }

    async fn load_exercise_list(&self, id: &str) -> Result<Vec<Exercise>> {
        let Some(doc) = self.store().get(id).await? else {
            info!("No exercise list {} found", id);
            return Ok(Vec::new());
        };
        let Some(Value::Array(items)) = doc.get("exercises") else {
            return Ok(Vec::new());
        };
        Ok(items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item.clone()) {
                Ok(exercise) => Some(exercise),
                Err(e) => {
                    warn!("Skipping malformed entry {} of {}: {}", index, id, e);
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_exercise_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let first = db
            .upsert_exercise(Exercise::new("Squat").with_hevy_id("ex1"))
            .await
            .unwrap();
        let second = db
            .upsert_exercise(Exercise::new("Back Squat").with_hevy_id("ex1"))
            .await
            .unwrap();
        assert_eq!(first, second);

        let all = db.get_all_exercises().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Back Squat");
        assert!(all[0].rev.as_deref().unwrap().starts_with("2-"));
    }

    #[tokio::test]
    async fn test_exercise_without_hevy_id_is_always_new() {
        let db = Database::in_memory().await.unwrap();
        let a = db.upsert_exercise(Exercise::new("Plank")).await.unwrap();
        let b = db.upsert_exercise(Exercise::new("Plank")).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_exercises_by_muscle_group() {
        let db = Database::in_memory().await.unwrap();
        for (hevy, name, group) in [("a", "Squat", "quadriceps"), ("b", "Curl", "biceps"), ("c", "Lunge", "quadriceps")] {
            db.upsert_exercise(Exercise::new(name).with_hevy_id(hevy).with_muscle_group(group))
                .await
                .unwrap();
        }

        let quads = db.get_exercises_by_muscle_group("quadriceps").await.unwrap();
        let mut names: Vec<_> = quads.iter().map(|e| e.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Lunge", "Squat"]);
        assert!(db.get_exercises_by_muscle_group("calves").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exercise_lists() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.get_exercises(Some("u1"), true).await.unwrap().is_empty());

        db.save_exercises(vec![Exercise::new("Squat"), Exercise::new("Bench")], None)
            .await
            .unwrap();
        db.save_exercises(vec![Exercise::new("Sled Push")], Some("u1"))
            .await
            .unwrap();

        let names = |list: Vec<Exercise>| list.into_iter().map(|e| e.name).collect::<Vec<_>>();
        assert_eq!(
            names(db.get_exercises(Some("u1"), true).await.unwrap()),
            vec!["Squat", "Bench", "Sled Push"]
        );
        assert_eq!(
            names(db.get_exercises(Some("u1"), false).await.unwrap()),
            vec!["Squat", "Bench"]
        );
        assert_eq!(names(db.get_custom_exercises("u1").await.unwrap()), vec!["Sled Push"]);

        let doc = db.store().get("custom_exercises_u1").await.unwrap().unwrap();
        assert_eq!(doc.doc_type(), Some("custom_exercise_list"));
        assert!(doc.get("updated_at").is_some());
    }

    #[tokio::test]
    async fn test_malformed_list_entries_are_skipped() {
        let db = Database::in_memory().await.unwrap();
        db.store()
            .save(&serde_json::json!({
                "_id": "base_exercises",
                "type": "base_exercise_list",
                "exercises": [{"name": "Squat"}, {"title": "no name"}, {"name": "Row"}]
            }))
            .await
            .unwrap();

        let names: Vec<_> = db
            .get_exercises(None, true)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Squat", "Row"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_malformed_stored_exercise() {
        let db = Database::in_memory().await.unwrap();
        let (id, _) = db
            .store()
            .save(&serde_json::json!({"type": "exercise", "hevy_id": "ex1"}))
            .await
            .unwrap();

        let upserted = db
            .upsert_exercise(Exercise::new("Squat").with_hevy_id("ex1"))
            .await
            .unwrap();
        assert_eq!(upserted, id);

        let repaired = db.get_exercise_by_hevy_id("ex1").await.unwrap().unwrap();
        assert_eq!(repaired.name, "Squat");
        assert!(repaired.rev.as_deref().unwrap().starts_with("2-"));
    }

    #[tokio::test]
    async fn test_save_exercises_replaces_whole_list() {
        let db = Database::in_memory().await.unwrap();
        db.save_exercises(vec![Exercise::new("Squat")], None).await.unwrap();
        let (_, rev) = db
            .save_exercises(vec![Exercise::new("Row")], None)
            .await
            .unwrap();
        assert!(rev.starts_with("2-"));

        let names: Vec<_> = db
            .get_exercises(None, true)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Row"]);
    }
}
