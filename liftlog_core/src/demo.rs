//! Built-in sample data for demo mode.
//!
//! Two routines and ten finished workouts spaced three days apart, with
//! weights that climb toward the most recent session so the progress charts
//! have something to show.

use crate::store::WriteBatch;
use crate::{ExerciseTemplate, LoggedExercise, RoutineDraft, SetEntry, StoreMode, WorkoutLog};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;

/// Number of sample workouts
pub const DEMO_LOG_COUNT: u32 = 10;

const DAYS_BETWEEN_LOGS: i64 = 3;

static DEMO_ROUTINES: Lazy<Vec<RoutineDraft>> = Lazy::new(|| {
    vec![
        RoutineDraft {
            name: "Push Day".into(),
            notes: "Focus on heavy compounds first, then isolation.".into(),
            exercises: vec![
                ExerciseTemplate::new("Bench Press", "3", "8").with_notes("Keep elbows tucked"),
                ExerciseTemplate::new("Overhead Press", "3", "10")
                    .with_notes("Dont arch back too much"),
                ExerciseTemplate::new("Tricep Extension", "3", "12")
                    .with_notes("Squeeze at the bottom"),
            ],
        },
        RoutineDraft {
            name: "Leg Day".into(),
            notes: "Keep rest times under 2 minutes.".into(),
            exercises: vec![
                ExerciseTemplate::new("Squat", "4", "6").with_notes("Go below parallel"),
                ExerciseTemplate::new("Lunge", "3", "10"),
                ExerciseTemplate::new("Calf Raise", "4", "15").with_notes("Pause at the top"),
            ],
        },
    ]
});

/// The sample routines
pub fn demo_routines() -> &'static [RoutineDraft] {
    &DEMO_ROUTINES
}

// Spread of up to 600 s that stays the same between runs
fn jitter(index: u32) -> u64 {
    u64::from((index * 347 + 113) % 600)
}

fn sets(weight: u32, reps: &[u32]) -> Vec<SetEntry> {
    reps.iter()
        .map(|r| SetEntry::new(weight.to_string(), r.to_string(), true))
        .collect()
}

/// The `index`-th sample workout, `index` sessions before `now`
pub fn demo_log(index: u32, now: DateTime<Utc>) -> WorkoutLog {
    let steps_back = DEMO_LOG_COUNT.saturating_sub(index);
    let bench = 135 + steps_back * 5;
    let squat = 185 + steps_back * 10;
    let date = now - Duration::days(i64::from(index) * DAYS_BETWEEN_LOGS);

    if index % 2 == 0 {
        WorkoutLog {
            id: String::new(),
            routine_id: None,
            routine_name: "Push Day".into(),
            duration_seconds: 3600 + jitter(index),
            date,
            exercises: vec![
                LoggedExercise {
                    name: "Bench Press".into(),
                    sets: sets(bench, &[10, 10, 8]),
                },
                LoggedExercise {
                    name: "Overhead Press".into(),
                    // 60% of bench, rounded down
                    sets: sets(bench * 3 / 5, &[12, 10]),
                },
            ],
        }
    } else {
        WorkoutLog {
            id: String::new(),
            routine_id: None,
            routine_name: "Leg Day".into(),
            duration_seconds: 4200 + jitter(index),
            date,
            exercises: vec![LoggedExercise {
                name: "Squat".into(),
                sets: sets(squat, &[8, 8, 8]),
            }],
        }
    }
}

/// Every sample document in one batch for the demo collections
pub fn demo_batch(now: DateTime<Utc>) -> WriteBatch {
    let mut batch = WriteBatch::new(StoreMode::Demo);
    for routine in demo_routines() {
        batch.create_routine(routine.clone(), now);
    }
    for index in 0..DEMO_LOG_COUNT {
        batch.add_log(demo_log(index, now));
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_demo_routines() {
        let routines = demo_routines();
        assert_eq!(routines.len(), 2);
        assert_eq!(routines[0].name, "Push Day");
        assert_eq!(routines[0].exercises[0].notes, "Keep elbows tucked");
        assert_eq!(routines[1].exercises[1].notes, "");
        assert_eq!(routines[1].exercises[2].reps, "15");
    }

    #[test]
    fn test_demo_logs_alternate_and_progress() {
        let newest = demo_log(0, now());
        assert_eq!(newest.routine_name, "Push Day");
        assert_eq!(newest.date, now());
        assert_eq!(newest.exercises[0].sets[0].weight, "185");
        assert_eq!(newest.exercises[1].sets[0].weight, "111");
        assert_eq!(newest.exercises[1].sets.len(), 2);

        let legs = demo_log(1, now());
        assert_eq!(legs.routine_name, "Leg Day");
        assert_eq!(legs.date, now() - Duration::days(3));
        assert_eq!(legs.exercises[0].sets[0].weight, "275");
        assert_eq!(legs.exercises[0].sets.len(), 3);

        let oldest = demo_log(9, now());
        assert_eq!(oldest.exercises[0].sets[0].weight, "195");
    }

    #[test]
    fn test_durations_are_deterministic() {
        for index in 0..DEMO_LOG_COUNT {
            let log = demo_log(index, now());
            let base = if index % 2 == 0 { 3600 } else { 4200 };
            assert!(log.duration_seconds >= base && log.duration_seconds < base + 600);
            assert_eq!(log.duration_seconds, demo_log(index, now()).duration_seconds);
        }
    }

    #[test]
    fn test_demo_batch() {
        let batch = demo_batch(now());
        assert_eq!(batch.mode(), StoreMode::Demo);
        assert_eq!(batch.len(), 12);
    }
}
