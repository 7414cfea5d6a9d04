//! History view: per-workout summaries of finished logs.

use crate::{LoggedExercise, WorkoutLog};

/// One exercise line of a history card
#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseSummary {
    pub name: String,
    pub set_count: usize,
    /// Heaviest completed set; zero when nothing numeric was completed
    pub best_weight: f64,
}

/// A finished workout as the history list shows it
#[derive(Clone, Debug, PartialEq)]
pub struct WorkoutSummary {
    pub id: String,
    pub routine_name: String,
    /// e.g. `Sat, Mar 2`
    pub date: String,
    /// e.g. `61m 5s`
    pub duration: String,
    pub exercises: Vec<ExerciseSummary>,
}

/// Format a duration as `Xm Ys`
pub fn format_duration(seconds: u64) -> String {
    format!("{}m {}s", seconds / 60, seconds % 60)
}

/// Format a weight without a trailing `.0` for whole numbers
pub fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 {
        format!("{:.0}", weight)
    } else {
        format!("{}", weight)
    }
}

/// Max weight over the completed sets of an exercise
pub fn best_completed_weight(exercise: &LoggedExercise) -> f64 {
    exercise
        .sets
        .iter()
        .filter(|s| s.completed)
        .map(|s| s.weight_value())
        .fold(0.0, f64::max)
}

pub fn summarize(log: &WorkoutLog) -> WorkoutSummary {
    WorkoutSummary {
        id: log.id.clone(),
        routine_name: log.routine_name.clone(),
        date: log.date.format("%a, %b %-d").to_string(),
        duration: format_duration(log.duration_seconds),
        exercises: log
            .exercises
            .iter()
            .map(|exercise| ExerciseSummary {
                name: exercise.name.clone(),
                set_count: exercise.sets.len(),
                best_weight: best_completed_weight(exercise),
            })
            .collect(),
    }
}

/// Summaries for a whole snapshot, keeping its order (newest first)
pub fn summarize_all(logs: &[WorkoutLog]) -> Vec<WorkoutSummary> {
    logs.iter().map(summarize).collect()
}

/// The most recent log of a routine, if it has been performed
pub fn find_last_log_for_routine<'a>(
    logs: &'a [WorkoutLog],
    routine_id: &str,
) -> Option<&'a WorkoutLog> {
    // Logs are newest first
    logs.iter()
        .find(|log| log.routine_id.as_deref() == Some(routine_id))
}
