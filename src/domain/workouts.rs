//! Workout history queries
//!
//! Date bounds are inclusive and compared as stored timestamps, so a bound
//! equal to a workout's start time includes that workout.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;
use viewkey::KeyRange;

use crate::error::Result;
use crate::model::{DocType, Workout, WorkoutStats};
use crate::query::ViewQuery;
use crate::schema::WORKOUTS;
use crate::timestamp;
use crate::Database;

use super::{decode_all, decode_rows};

fn date_range(start: &DateTime<Utc>, end: &DateTime<Utc>) -> KeyRange {
    KeyRange::between(timestamp::format(start), timestamp::format(end))
}

fn exercise_range(template_id: &str) -> KeyRange {
    KeyRange::prefix(vec![template_id.into()])
}

impl Database {
    /// Save a synced workout; see [`Database::upsert_synced`]
    pub async fn upsert_workout(&self, workout: Workout) -> Result<String> {
        self.upsert_synced(workout).await
    }

    pub async fn get_workout_by_hevy_id(&self, hevy_id: &str) -> Result<Option<Workout>> {
        self.find_by_hevy_id(hevy_id).await
    }

    /// Workouts that started between `start` and `end`, oldest first
    pub async fn get_workouts_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Workout>> {
        let query = ViewQuery::new().range(date_range(&start, &end));
        let rows = self.store().query_view(WORKOUTS, "by_date", &query).await?;
        Ok(decode_rows(rows))
    }

    /// Every workout, oldest first
    pub async fn get_all_workouts(&self) -> Result<Vec<Workout>> {
        let rows = self.store().query_view(WORKOUTS, "by_date", &ViewQuery::new()).await?;
        Ok(decode_rows(rows))
    }

    /// One entry per occurrence of the exercise, ordered by start time
    ///
    /// A workout that lists the exercise twice appears twice.
    pub async fn get_workouts_by_exercise(&self, template_id: &str) -> Result<Vec<Workout>> {
        let query = ViewQuery::new().range(exercise_range(template_id));
        let rows = self.store().query_view(WORKOUTS, "by_exercise", &query).await?;
        Ok(decode_rows(rows))
    }

    /// Workouts containing the exercise, oldest first, each once
    pub async fn get_workout_progression(&self, template_id: &str) -> Result<Vec<Workout>> {
        let query = ViewQuery::new()
            .range(exercise_range(template_id))
            .include_docs(true);
        let mut rows = self.store().query_view(WORKOUTS, "by_exercise", &query).await?;

        let mut seen = HashSet::new();
        rows.retain(|row| match &row.id {
            Some(id) => seen.insert(id.clone()),
            None => true,
        });
        Ok(decode_rows(rows))
    }

    /// Aggregate duration and exercise counts
    ///
    /// Restricted to a date range only when both bounds are given. Nothing
    /// matching, or no stats view yet, gives zeros.
    pub async fn get_workout_stats(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<WorkoutStats> {
        let mut query = ViewQuery::new().reduce(true);
        if let (Some(start), Some(end)) = (&start, &end) {
            query = query.range(date_range(start, end));
        }

        let rows = self.store().query_view(WORKOUTS, "stats", &query).await?;
        match rows.into_iter().next() {
            Some(row) if !row.value.is_null() => Ok(serde_json::from_value(row.value)?),
            _ => Ok(WorkoutStats::default()),
        }
    }

    /// A user's workouts, oldest first
    ///
    /// With both bounds this is the date-range query; otherwise every
    /// workout in the database. Workouts stamped with another user's id are
    /// left out; unstamped workouts are kept.
    pub async fn get_user_workout_history(
        &self,
        user_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Workout>> {
        let mut workouts = match (start, end) {
            (Some(start), Some(end)) => self.get_workouts_by_date_range(start, end).await?,
            _ => {
                let docs = self.store().list_all().await?;
                let mut all: Vec<Workout> = decode_all(
                    docs.into_iter()
                        .filter(|doc| doc.doc_type() == Some(DocType::Workout.as_str())),
                );
                all.sort_by(|a, b| a.start_time.cmp(&b.start_time));
                all
            }
        };

        let before = workouts.len();
        workouts.retain(|w| w.user_id.as_deref().map_or(true, |owner| owner == user_id));
        debug!(
            "Workout history for {}: {} of {} workouts",
            user_id,
            workouts.len(),
            before
        );
        Ok(workouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkoutExercise;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 9, 0, 0).unwrap()
    }

    fn workout(hevy: &str, d: u32, templates: &[&str]) -> Workout {
        let mut w = Workout::new(day(d)).with_hevy_id(hevy);
        w.duration = 3600;
        for t in templates {
            w = w.with_exercise(WorkoutExercise::new(*t));
        }
        w
    }

    #[tokio::test]
    async fn test_date_range_is_inclusive() {
        let db = Database::in_memory().await.unwrap();
        for (hevy, d) in [("w1", 1), ("w2", 10), ("w3", 20)] {
            db.upsert_workout(workout(hevy, d, &["squat"])).await.unwrap();
        }

        let hits = db.get_workouts_by_date_range(day(1), day(10)).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|w| w.hevy_id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["w1", "w2"]);
        assert_eq!(db.get_all_workouts().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_progression_lists_each_workout_once() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_workout(workout("late", 15, &["squat"])).await.unwrap();
        db.upsert_workout(workout("twice", 5, &["squat", "bench", "squat"]))
            .await
            .unwrap();
        db.upsert_workout(workout("other", 7, &["bench"])).await.unwrap();

        let progression = db.get_workout_progression("squat").await.unwrap();
        let ids: Vec<_> = progression.iter().map(|w| w.hevy_id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["twice", "late"]);

        let occurrences = db.get_workouts_by_exercise("squat").await.unwrap();
        assert_eq!(occurrences.len(), 3);
    }

    #[tokio::test]
    async fn test_stats() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(db.get_workout_stats(None, None).await.unwrap(), WorkoutStats::default());

        db.upsert_workout(workout("w1", 1, &["squat", "bench"])).await.unwrap();
        db.upsert_workout(workout("w2", 10, &["row"])).await.unwrap();

        let all = db.get_workout_stats(None, None).await.unwrap();
        assert_eq!(
            all,
            WorkoutStats {
                total_duration: 7200,
                total_exercises: 3,
                count: 2
            }
        );

        let first = db.get_workout_stats(Some(day(1)), Some(day(2))).await.unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(first.total_exercises, 2);

        // one bound alone is ignored
        let unbounded = db.get_workout_stats(Some(day(5)), None).await.unwrap();
        assert_eq!(unbounded.count, 2);
    }

    #[tokio::test]
    async fn test_user_history_excludes_other_users() {
        let db = Database::in_memory().await.unwrap();
        let mut mine = workout("mine", 3, &["squat"]);
        mine.user_id = Some("u1".to_string());
        let mut theirs = workout("theirs", 2, &["squat"]);
        theirs.user_id = Some("u2".to_string());
        db.upsert_workout(mine).await.unwrap();
        db.upsert_workout(theirs).await.unwrap();
        db.upsert_workout(workout("legacy", 1, &["squat"])).await.unwrap();

        let history = db.get_user_workout_history("u1", None, None).await.unwrap();
        let ids: Vec<_> = history.iter().map(|w| w.hevy_id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["legacy", "mine"]);

        let ranged = db
            .get_user_workout_history("u1", Some(day(2)), Some(day(3)))
            .await
            .unwrap();
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].hevy_id.as_deref(), Some("mine"));
    }
}
