//! CSV export of finished workouts, one row per recorded set.

use crate::{Result, WorkoutLog};
use std::fs::File;
use std::path::Path;

#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    log_id: &'a str,
    date: String,
    routine: &'a str,
    duration_seconds: u64,
    exercise: &'a str,
    set: usize,
    weight: &'a str,
    reps: &'a str,
    completed: bool,
}

/// Write every set of `logs` to `path`, replacing any existing file.
///
/// Returns the number of rows written. The file is synced before returning.
pub fn export_csv(logs: &[WorkoutLog], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(File::create(path)?);

    let mut rows = 0;
    for log in logs {
        let date = log.date.to_rfc3339();
        for exercise in &log.exercises {
            for (index, set) in exercise.sets.iter().enumerate() {
                writer.serialize(CsvRow {
                    log_id: &log.id,
                    date: date.clone(),
                    routine: &log.routine_name,
                    duration_seconds: log.duration_seconds,
                    exercise: &exercise.name,
                    set: index + 1,
                    weight: &set.weight,
                    reps: &set.reps,
                    completed: set.completed,
                })?;
                rows += 1;
            }
        }
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} sets from {} workouts to {:?}", rows, logs.len(), path);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LoggedExercise, SetEntry};
    use chrono::{TimeZone, Utc};

    fn log(id: &str, sets: usize) -> WorkoutLog {
        WorkoutLog {
            id: id.into(),
            routine_id: None,
            routine_name: "Leg Day".into(),
            duration_seconds: 4200,
            date: Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap(),
            exercises: vec![LoggedExercise {
                name: "Squat".into(),
                sets: (0..sets).map(|_| SetEntry::new("225", "8", true)).collect(),
            }],
        }
    }

    #[test]
    fn test_export_writes_one_row_per_set() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out/history.csv");

        let rows = export_csv(&[log("a", 3), log("b", 2)], &path).unwrap();
        assert_eq!(rows, 5);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[4], "exercise");
        let records: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 5);
        assert_eq!(&records[0][0], "a");
        assert_eq!(&records[2][5], "3");
        assert_eq!(&records[4][6], "225");
    }

    #[test]
    fn test_export_empty_history_writes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history.csv");
        assert_eq!(export_csv(&[], &path).unwrap(), 0);
        assert!(path.exists());
    }
}
