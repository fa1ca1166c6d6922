//! Map and reduce rules
//!
//! A rule is one view function with two renderings: the JavaScript source
//! stored in the CouchDB design document, and a native evaluation the
//! in-memory store runs instead of a JavaScript engine.

use regex::Regex;
use serde_json::{json, Value};
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::storage::document::Document;

/// A view's map function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapRule {
    /// `emit(doc.<field>, doc)` for documents of one type
    Field {
        doc_type: Cow<'static, str>,
        field: Cow<'static, str>,
    },
    /// `emit([ex.template_id, doc.start_time], doc)` once per exercise of a workout
    ExerciseTimeline,
    /// `emit(doc.start_time, {duration, exercise_count})` for workouts
    WorkoutSummary,
}

/// A view's reduce function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceRule {
    /// Sums duration and exercise count, and counts rows
    WorkoutTotals,
}

const TIMELINE_SOURCE: &str = "function(doc) { if (doc.type === 'workout') { (doc.exercises || []).forEach(function(ex) { emit([ex.template_id, doc.start_time], doc); }); } }";

const SUMMARY_SOURCE: &str = "function(doc) { if (doc.type === 'workout') { emit(doc.start_time, {duration: doc.duration || 0, exercise_count: (doc.exercises || []).length}); } }";

const TOTALS_SOURCE: &str = "function(keys, values, rereduce) { var out = {total_duration: 0, total_exercises: 0, count: 0}; values.forEach(function(v) { if (rereduce) { out.total_duration += v.total_duration; out.total_exercises += v.total_exercises; out.count += v.count; } else { out.total_duration += v.duration; out.total_exercises += v.exercise_count; out.count += 1; } }); return out; }";

fn field_rule_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^function\s*\(doc\)\s*\{\s*if\s*\(doc\.type\s*===\s*'([a-z_]+)'\)\s*\{\s*emit\(doc\.([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*),\s*doc\);\s*\}\s*\}$",
        )
        .expect("field rule pattern is valid")
    })
}

impl MapRule {
    pub const fn field(doc_type: &'static str, field: &'static str) -> Self {
        MapRule::Field {
            doc_type: Cow::Borrowed(doc_type),
            field: Cow::Borrowed(field),
        }
    }

    /// JavaScript source for CouchDB
    pub fn source(&self) -> Cow<'static, str> {
        match self {
            MapRule::Field { doc_type, field } => Cow::Owned(format!(
                "function(doc) {{ if (doc.type === '{}') {{ emit(doc.{}, doc); }} }}",
                doc_type, field
            )),
            MapRule::ExerciseTimeline => Cow::Borrowed(TIMELINE_SOURCE),
            MapRule::WorkoutSummary => Cow::Borrowed(SUMMARY_SOURCE),
        }
    }

    /// Recognize a stored map source
    pub fn parse(source: &str) -> Option<Self> {
        let source = source.trim();
        if source == TIMELINE_SOURCE {
            return Some(MapRule::ExerciseTimeline);
        }
        if source == SUMMARY_SOURCE {
            return Some(MapRule::WorkoutSummary);
        }
        let caps = field_rule_pattern().captures(source)?;
        Some(MapRule::Field {
            doc_type: Cow::Owned(caps[1].to_string()),
            field: Cow::Owned(caps[2].to_string()),
        })
    }

    /// Evaluate against one document, returning the emitted `(key, value)` pairs
    pub fn emit(&self, doc: &Document) -> Vec<(Value, Value)> {
        match self {
            MapRule::Field { doc_type, field } => {
                if doc.doc_type() != Some(doc_type.as_ref()) {
                    return Vec::new();
                }
                let key = doc.get_path(field).cloned().unwrap_or(Value::Null);
                vec![(key, doc.clone().into_value())]
            }
            MapRule::ExerciseTimeline => {
                if doc.doc_type() != Some("workout") {
                    return Vec::new();
                }
                let start = doc.get("start_time").cloned().unwrap_or(Value::Null);
                exercises(doc)
                    .iter()
                    .map(|ex| {
                        let template = ex.get("template_id").cloned().unwrap_or(Value::Null);
                        (json!([template, start.clone()]), doc.clone().into_value())
                    })
                    .collect()
            }
            MapRule::WorkoutSummary => {
                if doc.doc_type() != Some("workout") {
                    return Vec::new();
                }
                let start = doc.get("start_time").cloned().unwrap_or(Value::Null);
                let duration = doc.get("duration").cloned().unwrap_or(json!(0));
                let value = json!({
                    "duration": duration,
                    "exercise_count": exercises(doc).len(),
                });
                vec![(start, value)]
            }
        }
    }
}

fn exercises(doc: &Document) -> &[Value] {
    doc.get("exercises")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

impl ReduceRule {
    pub fn source(&self) -> &'static str {
        match self {
            ReduceRule::WorkoutTotals => TOTALS_SOURCE,
        }
    }

    pub fn parse(source: &str) -> Option<Self> {
        (source.trim() == TOTALS_SOURCE).then_some(ReduceRule::WorkoutTotals)
    }

    /// Reduce mapped values into one
    pub fn reduce(&self, values: &[Value]) -> Value {
        match self {
            ReduceRule::WorkoutTotals => {
                let mut total_duration = 0i64;
                let mut total_exercises = 0u64;
                for value in values {
                    total_duration += as_i64(value.get("duration"));
                    total_exercises += as_i64(value.get("exercise_count")).max(0) as u64;
                }
                json!({
                    "total_duration": total_duration,
                    "total_exercises": total_exercises,
                    "count": values.len(),
                })
            }
        }
    }
}

fn as_i64(value: Option<&Value>) -> i64 {
    value
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}
