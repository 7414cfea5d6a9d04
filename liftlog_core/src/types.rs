//! Core domain types for the Liftlog workout tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Routines and their exercise templates (including the legacy bare-name form)
//! - Set entries and per-exercise logs recorded during a session
//! - Finished workout logs as persisted by the log store
//! - Store modes (normal vs. demonstration data)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Loose numeric fields
// ============================================================================

/// Accept either a JSON string or a JSON number and keep it as text.
///
/// Weights, reps and targets are free-form strings in the UI but older
/// documents (and model output) carry plain numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Int(i64),
        Float(f64),
        Missing(Option<()>),
    }

    Ok(match Loose::deserialize(deserializer)? {
        Loose::Text(s) => s,
        Loose::Int(n) => n.to_string(),
        Loose::Float(f) => f.to_string(),
        Loose::Missing(_) => String::new(),
    })
}

/// Interpret a free-form numeric field; anything non-numeric counts as zero.
pub fn numeric_value(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

// ============================================================================
// Routine Types
// ============================================================================

/// One exercise of a routine, always in its full shape
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(from = "ExerciseEntry")]
pub struct ExerciseTemplate {
    pub name: String,
    pub sets: String,
    pub reps: String,
    pub notes: String,
}

impl ExerciseTemplate {
    pub fn new(name: impl Into<String>, sets: impl Into<String>, reps: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sets: sets.into(),
            reps: reps.into(),
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Exercise as it appears in stored documents or model output
///
/// Early routines stored exercises as bare names; later ones carry targets.
/// Both are resolved into [`ExerciseTemplate`] once, at deserialization.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ExerciseEntry {
    /// Legacy form: just the exercise name
    Name(String),
    /// Full form with targets and an optional note
    Detailed {
        name: String,
        #[serde(default, deserialize_with = "string_or_number")]
        sets: String,
        #[serde(default, deserialize_with = "string_or_number")]
        reps: String,
        #[serde(default, deserialize_with = "string_or_number")]
        notes: String,
    },
}

impl From<ExerciseEntry> for ExerciseTemplate {
    fn from(entry: ExerciseEntry) -> Self {
        match entry {
            ExerciseEntry::Name(name) => ExerciseTemplate {
                name,
                ..Default::default()
            },
            ExerciseEntry::Detailed {
                name,
                sets,
                reps,
                notes,
            } => ExerciseTemplate {
                name,
                sets,
                reps,
                notes,
            },
        }
    }
}

/// A stored routine definition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Routine {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub exercises: Vec<ExerciseTemplate>,
    pub created_at: DateTime<Utc>,
}

/// Routine content before the store assigns an id and creation time
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct RoutineDraft {
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub notes: String,
    #[serde(default)]
    pub exercises: Vec<ExerciseTemplate>,
}

impl From<&Routine> for RoutineDraft {
    fn from(routine: &Routine) -> Self {
        RoutineDraft {
            name: routine.name.clone(),
            notes: routine.notes.clone(),
            exercises: routine.exercises.clone(),
        }
    }
}

// ============================================================================
// Session Types
// ============================================================================

/// One recorded attempt within an exercise
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SetEntry {
    #[serde(default, deserialize_with = "string_or_number")]
    pub weight: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub reps: String,
    #[serde(default)]
    pub completed: bool,
}

impl SetEntry {
    pub fn new(weight: impl Into<String>, reps: impl Into<String>, completed: bool) -> Self {
        Self {
            weight: weight.into(),
            reps: reps.into(),
            completed,
        }
    }

    /// Whether a finished workout keeps this set
    pub fn is_worth_keeping(&self) -> bool {
        self.completed || (!self.weight.is_empty() && !self.reps.is_empty())
    }

    pub fn weight_value(&self) -> f64 {
        numeric_value(&self.weight)
    }

    pub fn reps_value(&self) -> f64 {
        numeric_value(&self.reps)
    }
}

/// Which field of a set an edit targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetField {
    Weight,
    Reps,
}

impl std::str::FromStr for SetField {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "w" | "weight" => Ok(SetField::Weight),
            "r" | "reps" => Ok(SetField::Reps),
            other => Err(crate::Error::Other(format!("Unknown set field: {}", other))),
        }
    }
}

/// Per-exercise record kept by an active session
#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseLog {
    pub name: String,
    pub target_sets: String,
    pub target_reps: String,
    pub notes: String,
    pub(crate) sets: Vec<SetEntry>,
}

impl ExerciseLog {
    /// Start a log from a template with a single empty set
    pub fn from_template(template: &ExerciseTemplate) -> Self {
        Self {
            name: template.name.clone(),
            target_sets: template.sets.clone(),
            target_reps: template.reps.clone(),
            notes: template.notes.clone(),
            sets: vec![SetEntry::default()],
        }
    }

    /// Recorded sets; never empty
    pub fn sets(&self) -> &[SetEntry] {
        &self.sets
    }
}

/// Weight and reps of a set from an earlier workout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviousSet {
    pub weight: String,
    pub reps: String,
}

// ============================================================================
// Finished Workout Types
// ============================================================================

/// An exercise as recorded in a finished workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LoggedExercise {
    pub name: String,
    #[serde(default)]
    pub sets: Vec<SetEntry>,
}

/// The immutable record persisted when a session finishes
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutLog {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub routine_id: Option<String>,
    pub routine_name: String,
    pub duration_seconds: u64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub exercises: Vec<LoggedExercise>,
}

impl WorkoutLog {
    pub fn exercise(&self, name: &str) -> Option<&LoggedExercise> {
        self.exercises.iter().find(|e| e.name == name)
    }
}

// ============================================================================
// Store Mode
// ============================================================================

/// Which pair of collections the application reads and writes
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    #[default]
    Normal,
    Demo,
}

impl StoreMode {
    pub fn routines_collection(self) -> &'static str {
        match self {
            StoreMode::Normal => "routines",
            StoreMode::Demo => "demo_routines",
        }
    }

    pub fn logs_collection(self) -> &'static str {
        match self {
            StoreMode::Normal => "logs",
            StoreMode::Demo => "demo_logs",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_exercise_normalizes() {
        let template: ExerciseTemplate = serde_json::from_str(r#""Deadlift""#).unwrap();
        assert_eq!(
            template,
            ExerciseTemplate {
                name: "Deadlift".into(),
                sets: String::new(),
                reps: String::new(),
                notes: String::new(),
            }
        );
    }

    #[test]
    fn test_routine_with_mixed_exercises() {
        let json = r#"{
            "id": "r1",
            "name": "Push Day",
            "created_at": "2024-01-15T10:30:00Z",
            "exercises": [
                "Dips",
                { "name": "Bench Press", "sets": 3, "reps": 8, "notes": "Keep elbows tucked" },
                { "name": "Lunge", "sets": "3", "reps": "10" }
            ]
        }"#;

        let routine: Routine = serde_json::from_str(json).unwrap();
        assert_eq!(routine.notes, "");
        assert_eq!(routine.exercises.len(), 3);
        assert_eq!(routine.exercises[0].name, "Dips");
        assert_eq!(routine.exercises[0].sets, "");
        assert_eq!(routine.exercises[1].sets, "3");
        assert_eq!(routine.exercises[1].reps, "8");
        assert_eq!(routine.exercises[1].notes, "Keep elbows tucked");
        assert_eq!(routine.exercises[2].notes, "");
    }

    #[test]
    fn test_template_serializes_full_shape() {
        let template = ExerciseTemplate::new("Squat", "4", "6");
        let value = serde_json::to_value(&template).unwrap();
        assert_eq!(value["name"], "Squat");
        assert_eq!(value["notes"], "");
    }

    #[test]
    fn test_set_entry_accepts_numbers() {
        let set: SetEntry =
            serde_json::from_str(r#"{ "weight": 135, "reps": 10, "completed": true }"#).unwrap();
        assert_eq!(set.weight, "135");
        assert_eq!(set.reps, "10");
        assert!(set.completed);
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(numeric_value("135"), 135.0);
        assert_eq!(numeric_value(" 62.5 "), 62.5);
        assert_eq!(numeric_value(""), 0.0);
        assert_eq!(numeric_value("heavy"), 0.0);
    }

    #[test]
    fn test_set_worth_keeping() {
        assert!(SetEntry::new("", "", true).is_worth_keeping());
        assert!(SetEntry::new("100", "5", false).is_worth_keeping());
        assert!(!SetEntry::new("100", "", false).is_worth_keeping());
        assert!(!SetEntry::default().is_worth_keeping());
    }

    #[test]
    fn test_set_field_parse() {
        assert_eq!("w".parse::<SetField>().unwrap(), SetField::Weight);
        assert_eq!("Reps".parse::<SetField>().unwrap(), SetField::Reps);
        assert!("tempo".parse::<SetField>().is_err());
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(StoreMode::Normal.routines_collection(), "routines");
        assert_eq!(StoreMode::Demo.logs_collection(), "demo_logs");
    }
}
