//! Hevy payload ingestion
//!
//! Converts pages returned by the Hevy API into domain documents and upserts
//! them. Fetching the pages is left to the caller; [`import_dir`] ingests
//! pages that were saved to disk as JSON files.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::model::{Exercise, Workout, WorkoutExercise, WorkoutSet};
use crate::timestamp;
use crate::Database;

/// One page of a Hevy listing: workouts, exercise templates, or both
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HevyPage {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub workouts: Vec<HevyWorkout>,
    #[serde(default)]
    pub exercise_templates: Vec<HevyExerciseTemplate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HevyExerciseTemplate {
    pub id: String,
    pub title: String,
    #[serde(default, rename = "type")]
    pub exercise_type: Option<String>,
    #[serde(default)]
    pub primary_muscle_group: Option<String>,
    #[serde(default)]
    pub secondary_muscle_groups: Vec<String>,
    #[serde(default)]
    pub equipment: Option<String>,
    #[serde(default)]
    pub is_custom: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HevyWorkout {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(with = "timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exercises: Vec<HevyExercise>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HevyExercise {
    pub exercise_template_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sets: Vec<WorkoutSet>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<HevyExerciseTemplate> for Exercise {
    fn from(template: HevyExerciseTemplate) -> Self {
        let mut extra = Map::new();
        if let Some(kind) = template.exercise_type {
            extra.insert("exercise_type".to_string(), Value::String(kind));
        }
        Exercise {
            id: None,
            rev: None,
            hevy_id: Some(template.id),
            name: template.title,
            muscle_group: template.primary_muscle_group,
            secondary_muscle_groups: template.secondary_muscle_groups,
            equipment: template.equipment,
            is_custom: template.is_custom,
            extra,
        }
    }
}

impl From<HevyExercise> for WorkoutExercise {
    fn from(exercise: HevyExercise) -> Self {
        WorkoutExercise {
            template_id: exercise.exercise_template_id,
            title: exercise.title,
            sets: exercise.sets,
            extra: exercise.extra,
        }
    }
}

impl HevyWorkout {
    /// Convert into a workout document owned by `user_id`
    pub fn into_workout(self, user_id: Option<&str>) -> Workout {
        let duration = self
            .end_time
            .map(|end| (end - self.start_time).num_seconds().max(0))
            .unwrap_or(0);

        let mut workout = Workout::new(self.start_time).with_hevy_id(self.id);
        workout.user_id = user_id.map(str::to_string);
        workout.title = self.title;
        workout.end_time = self.end_time;
        workout.duration = duration;
        workout.exercises = self.exercises.into_iter().map(Into::into).collect();
        workout.extra = self.extra;
        workout
    }
}

/// Counts from one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub exercises: usize,
    pub workouts: usize,
    pub files: usize,
    pub skipped: usize,
}

impl SyncReport {
    fn absorb(&mut self, other: SyncReport) {
        self.exercises += other.exercises;
        self.workouts += other.workouts;
        self.files += other.files;
        self.skipped += other.skipped;
    }
}

/// Upsert every entity of a page
pub async fn ingest_page(db: &Database, page: HevyPage, user_id: Option<&str>) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    for template in page.exercise_templates {
        db.upsert_exercise(template.into()).await?;
        report.exercises += 1;
    }
    for workout in page.workouts {
        db.upsert_workout(workout.into_workout(user_id)).await?;
        report.workouts += 1;
    }

    info!(
        "Ingested {} exercises and {} workouts",
        report.exercises, report.workouts
    );
    Ok(report)
}

async fn read_page(path: &Path) -> anyhow::Result<HevyPage> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let page = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a Hevy page", path.display()))?;
    Ok(page)
}

/// Ingest every `*.json` page below `dir`, in file name order
///
/// Files that cannot be read or parsed are logged and counted as skipped.
/// Store failures stop the import.
pub async fn import_dir(db: &Database, dir: &Path, user_id: Option<&str>) -> anyhow::Result<SyncReport> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    let mut report = SyncReport::default();
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }

        let page = match read_page(path).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Skipping {:#}", e);
                report.skipped += 1;
                continue;
            }
        };

        let counts = ingest_page(db, page, user_id)
            .await
            .with_context(|| format!("failed to ingest {}", path.display()))?;
        report.absorb(counts);
        report.files += 1;
    }

    info!(
        "Imported {} files from {} ({} skipped)",
        report.files,
        dir.display(),
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workout_page() -> Value {
        json!({
            "page": 1,
            "page_count": 1,
            "workouts": [{
                "id": "hw-1",
                "title": "Leg Day",
                "description": "heavy",
                "start_time": "2024-01-10T09:00:00+00:00",
                "end_time": "2024-01-10T10:15:00+00:00",
                "exercises": [{
                    "index": 0,
                    "title": "Squat (Barbell)",
                    "exercise_template_id": "D04AC939",
                    "sets": [{"index": 0, "type": "normal", "weight_kg": 100.0, "reps": 5}]
                }]
            }]
        })
    }

    #[test]
    fn test_workout_conversion() {
        let page: HevyPage = serde_json::from_value(workout_page()).unwrap();
        let workout = page.workouts[0].clone().into_workout(Some("u1"));

        assert_eq!(workout.hevy_id.as_deref(), Some("hw-1"));
        assert_eq!(workout.user_id.as_deref(), Some("u1"));
        assert_eq!(workout.duration, 4500);
        assert!(workout.contains_exercise("D04AC939"));
        assert_eq!(workout.exercises[0].sets[0].reps, Some(5));
        assert_eq!(workout.extra.get("description"), Some(&json!("heavy")));
    }

    #[test]
    fn test_template_conversion() {
        let template: HevyExerciseTemplate = serde_json::from_value(json!({
            "id": "D04AC939",
            "title": "Squat (Barbell)",
            "type": "weight_reps",
            "primary_muscle_group": "quadriceps",
            "secondary_muscle_groups": ["glutes", "hamstrings"],
            "is_custom": false
        }))
        .unwrap();
        let exercise = Exercise::from(template);

        assert_eq!(exercise.hevy_id.as_deref(), Some("D04AC939"));
        assert_eq!(exercise.name, "Squat (Barbell)");
        assert_eq!(exercise.muscle_group.as_deref(), Some("quadriceps"));
        assert_eq!(exercise.extra.get("exercise_type"), Some(&json!("weight_reps")));
    }

    #[tokio::test]
    async fn test_ingest_twice_does_not_duplicate() {
        let db = Database::in_memory().await.unwrap();
        let page: HevyPage = serde_json::from_value(workout_page()).unwrap();

        let first = ingest_page(&db, page.clone(), None).await.unwrap();
        let second = ingest_page(&db, page, None).await.unwrap();
        assert_eq!(first.workouts, 1);
        assert_eq!(second.workouts, 1);

        let history = db.get_user_workout_history("anyone", None, None).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_import_dir_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("01-workouts.json"), workout_page().to_string()).unwrap();
        std::fs::write(
            dir.path().join("02-templates.json"),
            json!({"exercise_templates": [{"id": "D04AC939", "title": "Squat"}]}).to_string(),
        )
        .unwrap();
        std::fs::write(dir.path().join("03-broken.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let db = Database::in_memory().await.unwrap();
        let report = import_dir(&db, dir.path(), Some("u1")).await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                exercises: 1,
                workouts: 1,
                files: 2,
                skipped: 1
            }
        );
        assert!(db.get_exercise_by_hevy_id("D04AC939").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_import_missing_dir_fails() {
        let db = Database::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(import_dir(&db, &dir.path().join("nope"), None).await.is_err());
    }
}
