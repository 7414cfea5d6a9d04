//! Integration tests for the liftlog binary.
//!
//! These tests verify end-to-end behavior including:
//! - Routine management
//! - Interactive workout logging from stdin
//! - History, CSV export and progress output
//! - Demo data seeding

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// The binary pointed at an isolated data directory and config file
fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("liftlog"));
    cmd.env_remove("GEMINI_API_KEY")
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(temp_dir.path().join("data"))
        .arg("--config")
        .arg(temp_dir.path().join("config.toml"));
    cmd
}

fn add_arms_routine(temp_dir: &TempDir) {
    cli(temp_dir)
        .args(["add", "--name", "Arms", "--notes", "Pump day"])
        .args(["-e", "Curl:3x12:Slow negatives", "-e", "Pushdown:3x15"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved routine 'Arms'"));
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("liftlog"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Strength workout tracker with AI-assisted routines",
        ));
}

#[test]
fn test_empty_routines_list() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("No routines yet"));
}

#[test]
fn test_add_and_list_routine() {
    let temp_dir = setup_test_dir();
    add_arms_routine(&temp_dir);

    cli(&temp_dir)
        .arg("routines")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. Arms"))
        .stdout(predicate::str::contains("Curl, Pushdown"));
}

#[test]
fn test_add_without_exercises_fails() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir)
        .args(["add", "--name", "Empty"])
        .assert()
        .failure();
}

#[test]
fn test_edit_and_delete_routine() {
    let temp_dir = setup_test_dir();
    add_arms_routine(&temp_dir);

    cli(&temp_dir)
        .args(["edit", "arms", "--name", "Big Arms"])
        .assert()
        .success();
    cli(&temp_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Big Arms"));

    cli(&temp_dir).args(["delete", "1"]).assert().success();
    cli(&temp_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("No routines yet"));
}

#[test]
fn test_workout_logged_from_stdin() {
    let temp_dir = setup_test_dir();
    add_arms_routine(&temp_dir);

    cli(&temp_dir)
        .args(["start", "1"])
        .write_stdin("w 1 1 30\nr 1 1 12\ndone 1 1\nadd 1\nfinish\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Set 1 of Curl complete"))
        .stdout(predicate::str::contains("Rest timer 1:30 (Isolation)"))
        .stdout(predicate::str::contains("Added set 2 to Curl"))
        .stdout(predicate::str::contains("Workout saved: Arms"));

    cli(&temp_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("Arms"))
        .stdout(predicate::str::contains("Best: 30 lbs"));

    // The previous session's numbers show up next time
    cli(&temp_dir)
        .args(["start", "Arms"])
        .write_stdin("cancel\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("prev 30 x 12"))
        .stdout(predicate::str::contains("Workout discarded."));
}

#[test]
fn test_bad_workout_command_keeps_going() {
    let temp_dir = setup_test_dir();
    add_arms_routine(&temp_dir);

    cli(&temp_dir)
        .args(["start", "1"])
        .write_stdin("done 9 1\njump\nfinish\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("out of range"))
        .stderr(predicate::str::contains("Unknown command 'jump'"))
        .stdout(predicate::str::contains("Workout saved: Arms"));
}

#[test]
fn test_plus_extends_rest_timer() {
    let temp_dir = setup_test_dir();
    add_arms_routine(&temp_dir);

    cli(&temp_dir)
        .args(["start", "1"])
        .write_stdin("done 1 1\n+\ncancel\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rest timer 2:00"));
}

#[test]
fn test_closed_input_discards_workout() {
    let temp_dir = setup_test_dir();
    add_arms_routine(&temp_dir);

    cli(&temp_dir)
        .args(["start", "1"])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Workout discarded"));

    cli(&temp_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No workouts logged yet."));
}

#[test]
fn test_start_unknown_routine_fails() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir).args(["start", "Nope"]).assert().failure();
}

#[test]
fn test_history_csv_export() {
    let temp_dir = setup_test_dir();
    add_arms_routine(&temp_dir);
    cli(&temp_dir)
        .args(["start", "1"])
        .write_stdin("w 1 1 25\nr 1 1 10\ndone 1 1\nfinish\n")
        .assert()
        .success();

    let csv_path = temp_dir.path().join("export/history.csv");
    cli(&temp_dir)
        .arg("history")
        .arg("--csv")
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 sets"));

    let content = fs::read_to_string(&csv_path).expect("Failed to read CSV");
    assert!(content.starts_with("log_id,date,routine"));
    assert!(content.contains("Arms"));
    assert!(content.contains("Curl"));
}

#[test]
fn test_demo_seed_and_progress() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .arg("seed-demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("Seeded 2 demo routines and 10 demo workouts"));

    cli(&temp_dir)
        .args(["--demo", "routines"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Demo Workouts"))
        .stdout(predicate::str::contains("Push Day"))
        .stdout(predicate::str::contains("Leg Day"));

    cli(&temp_dir)
        .args(["--demo", "progress", "Bench Press"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Personal best: 185 lbs"));

    // Demo data stays out of the normal collections
    cli(&temp_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No workouts logged yet."));
}

#[test]
fn test_ai_commands_without_key() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["generate", "upper", "body", "strength"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));

    cli(&temp_dir).arg("seed-demo").assert().success();
    cli(&temp_dir)
        .args(["--demo", "progress", "--insight"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AI insights need a completion API key."));
}

#[test]
fn test_token_users_are_separate() {
    let temp_dir = setup_test_dir();
    add_arms_routine(&temp_dir);

    cli(&temp_dir)
        .args(["--token", "second_user", "routines"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No routines yet"));
}
