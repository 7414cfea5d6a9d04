//! Progress view: per-exercise strength charts and the AI coach summary.

use crate::completion::{CompletionClient, CompletionRequest};
use crate::WorkoutLog;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

const INSIGHT_SYSTEM_PROMPT: &str = "You are a data-driven fitness coach. Analyze these workout logs briefly. Identify trends, consistency, or give motivation. Be friendly and concise (max 3 bullet points).";

pub const INSIGHT_FALLBACK: &str = "Could not retrieve insights at this time.";

/// How many recent workouts the coach summary looks at
const INSIGHT_RECENT_LOGS: usize = 5;

/// One session on an exercise's progress chart
#[derive(Clone, Debug, PartialEq)]
pub struct ChartPoint {
    pub date: DateTime<Utc>,
    /// e.g. `Mar 2`
    pub label: String,
    pub max_weight: f64,
    /// Sum of weight times reps over every set
    pub volume: f64,
}

/// Every exercise name that appears in `logs`, sorted and without repeats
pub fn exercise_names(logs: &[WorkoutLog]) -> Vec<String> {
    logs.iter()
        .flat_map(|log| log.exercises.iter().map(|e| e.name.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Chart points for `exercise`, oldest first.
///
/// Sessions where the heaviest set weighs nothing are left out.
pub fn chart_data(logs: &[WorkoutLog], exercise: &str) -> Vec<ChartPoint> {
    let mut sorted: Vec<&WorkoutLog> = logs.iter().collect();
    sorted.sort_by_key(|log| log.date);

    sorted
        .into_iter()
        .filter_map(|log| {
            let logged = log.exercise(exercise)?;
            let max_weight = logged
                .sets
                .iter()
                .map(|s| s.weight_value())
                .fold(0.0, f64::max);
            if max_weight <= 0.0 {
                return None;
            }
            let volume = logged
                .sets
                .iter()
                .map(|s| s.weight_value() * s.reps_value())
                .sum();
            Some(ChartPoint {
                date: log.date,
                label: log.date.format("%b %-d").to_string(),
                max_weight,
                volume,
            })
        })
        .collect()
}

/// Heaviest weight on a chart
pub fn personal_best(points: &[ChartPoint]) -> Option<f64> {
    points.iter().map(|p| p.max_weight).reduce(f64::max)
}

/// The coach request for a newest-first snapshot; `None` without logs
pub fn insight_request(logs: &[WorkoutLog]) -> Option<CompletionRequest> {
    if logs.is_empty() {
        return None;
    }

    let recent = logs
        .iter()
        .take(INSIGHT_RECENT_LOGS)
        .map(|log| {
            format!(
                "{} on {}: {} exercises",
                log.routine_name,
                log.date.format("%a %b %d %Y"),
                log.exercises.len()
            )
        })
        .collect::<Vec<_>>()
        .join("; ");

    let prompt = format!(
        "Here is my recent workout history: {}. I have done {} total workouts.",
        recent,
        logs.len()
    );
    Some(CompletionRequest::text(prompt, INSIGHT_SYSTEM_PROMPT))
}

/// Ask the coach for a summary. Failures come back as the fallback text.
pub fn fetch_insight(client: &CompletionClient, logs: &[WorkoutLog]) -> Option<String> {
    let request = insight_request(logs)?;
    match client.complete(&request) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!("Coach insight failed: {}", e);
            Some(INSIGHT_FALLBACK.to_string())
        }
    }
}
