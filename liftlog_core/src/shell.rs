//! Application shell.
//!
//! The [`Shell`] ties one signed-in user to the store for the current mode,
//! keeps the latest routine and log snapshots, routes between tabs and owns
//! the active workout. Every front end drives it the same way: call
//! [`Shell::pump`] (or [`Shell::refresh`]) to pick up new snapshots and
//! rest suggestions, call [`Shell::tick`] once a second while a workout is
//! running, and dispatch user actions through the remaining methods.

use crate::completion::CompletionClient;
use crate::identity::{sign_in, Credentials, Identity};
use crate::routines;
use crate::session::{RestSuggestionResponse, WorkoutSession};
use crate::store::{BatchStore, FileStore, LogStore, RoutineStore, Subscription};
use crate::{demo, progress};
use crate::{Config, Error, Result, Routine, RoutineDraft, StoreMode, WorkoutLog};
use chrono::{DateTime, Duration, Utc};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Everything the shell needs that outlives a store mode
pub struct AppContext {
    pub config: Config,
    pub identity: Identity,
    pub completion: Option<Arc<CompletionClient>>,
}

impl AppContext {
    pub fn new(config: Config, identity: Identity, completion: Option<CompletionClient>) -> Self {
        Self {
            config,
            identity,
            completion: completion.map(Arc::new),
        }
    }

    /// Sign in with the configured token (anonymously without one) and
    /// build the completion client when an API key is configured.
    pub fn from_config(config: Config) -> Result<Self> {
        let credentials = Credentials::from_token(config.identity.token.as_deref());
        let identity = sign_in(&credentials, &config.identity.app_id, &config.data.data_dir)?;
        let completion = CompletionClient::from_config(&config.completion)?;
        Ok(Self::new(config, identity, completion))
    }
}

/// Top-level views
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Routines,
    History,
    Progress,
}

struct ActiveWorkout {
    session: WorkoutSession,
    minimized: bool,
    /// Instant up to which the rest timer has been advanced
    timer_clock: DateTime<Utc>,
}

pub struct Shell {
    ctx: AppContext,
    store: FileStore,
    routine_feed: Subscription<Routine>,
    log_feed: Subscription<WorkoutLog>,
    routines: Vec<Routine>,
    logs: Vec<WorkoutLog>,
    tab: Tab,
    active: Option<ActiveWorkout>,
    suggestions_tx: Sender<RestSuggestionResponse>,
    suggestions_rx: Receiver<RestSuggestionResponse>,
}

impl Shell {
    pub fn open(ctx: AppContext, mode: StoreMode) -> Result<Self> {
        let mut store = FileStore::open(&ctx.config.data.data_dir, &ctx.identity, mode)?;
        let routine_feed = store.subscribe_routines()?;
        let log_feed = store.subscribe_logs()?;
        let (suggestions_tx, suggestions_rx) = mpsc::channel();

        let mut shell = Self {
            ctx,
            store,
            routine_feed,
            log_feed,
            routines: Vec::new(),
            logs: Vec::new(),
            tab: Tab::default(),
            active: None,
            suggestions_tx,
            suggestions_rx,
        };
        shell.pump();
        Ok(shell)
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn mode(&self) -> StoreMode {
        self.store.mode()
    }

    /// Switch between normal and demo data.
    ///
    /// Refused (returns `Ok(false)`) while a workout is active.
    pub fn set_demo_mode(&mut self, demo: bool) -> Result<bool> {
        let mode = if demo { StoreMode::Demo } else { StoreMode::Normal };
        if self.active.is_some() {
            tracing::warn!("Cannot switch to {:?} mode during a workout", mode);
            return Ok(false);
        }
        if mode == self.mode() {
            return Ok(true);
        }

        let mut store = FileStore::open(&self.ctx.config.data.data_dir, &self.ctx.identity, mode)?;
        self.routine_feed = store.subscribe_routines()?;
        self.log_feed = store.subscribe_logs()?;
        self.store = store;
        self.pump();
        tracing::info!("Switched to {:?} mode", mode);
        Ok(true)
    }

    /// Apply pending snapshots and rest suggestions. Returns whether
    /// anything changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        if let Some(routines) = self.routine_feed.latest() {
            self.routines = routines;
            changed = true;
        }
        if let Some(logs) = self.log_feed.latest() {
            self.logs = logs;
            changed = true;
        }
        while let Ok(response) = self.suggestions_rx.try_recv() {
            changed |= self.apply_suggestions(response);
        }
        changed
    }

    /// Pick up changes written by other processes, then pump
    pub fn refresh(&mut self) -> Result<bool> {
        self.store.refresh()?;
        Ok(self.pump())
    }

    fn apply_suggestions(&mut self, response: RestSuggestionResponse) -> bool {
        match self.active.as_mut() {
            Some(active) => active.session.apply_rest_suggestions(response),
            None => {
                tracing::debug!("Dropping rest suggestions for ended session {}", response.session_id);
                false
            }
        }
    }

    /// Block until the active session's rest suggestions arrive or `timeout`
    /// passes. Returns whether they are loaded.
    pub fn await_rest_suggestions(&mut self, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            match self.active.as_ref() {
                None => return false,
                Some(active) if active.session.suggestions_loaded() => return true,
                Some(_) => {}
            }
            let left = deadline.saturating_duration_since(std::time::Instant::now());
            match self.suggestions_rx.recv_timeout(left) {
                Ok(response) => {
                    self.apply_suggestions(response);
                }
                Err(_) => return false,
            }
        }
    }

    pub fn routines(&self) -> &[Routine] {
        &self.routines
    }

    pub fn logs(&self) -> &[WorkoutLog] {
        &self.logs
    }

    pub fn routine(&self, id: &str) -> Option<&Routine> {
        self.routines.iter().find(|r| r.id == id)
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn set_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    // ------------------------------------------------------------------------
    // Routines
    // ------------------------------------------------------------------------

    /// Create a routine, or replace the one with id `editing`
    pub fn save_routine(&mut self, draft: RoutineDraft, editing: Option<&str>) -> Result<()> {
        match editing {
            Some(id) => self.store.update_routine(id, draft)?,
            None => {
                self.store.create_routine(draft)?;
            }
        }
        self.pump();
        Ok(())
    }

    pub fn delete_routine(&mut self, id: &str) -> Result<bool> {
        let removed = self.store.delete_routine(id)?;
        self.pump();
        Ok(removed)
    }

    pub fn generate_routine(&self, prompt: &str) -> Result<RoutineDraft> {
        let client = self
            .ctx
            .completion
            .as_deref()
            .ok_or_else(|| Error::Other("AI features need a completion API key".into()))?;
        routines::generate_routine(client, prompt)
    }

    // ------------------------------------------------------------------------
    // Workout
    // ------------------------------------------------------------------------

    /// Start a workout from a routine in the current snapshot, replacing any
    /// workout already in progress.
    pub fn start_workout(&mut self, routine_id: &str, now: DateTime<Utc>) -> Result<&mut WorkoutSession> {
        let routine = self
            .routine(routine_id)
            .cloned()
            .ok_or_else(|| Error::Store(format!("No routine with id {}", routine_id)))?;

        if let Some(previous) = self.active.take() {
            tracing::warn!(
                "Replacing active workout '{}' with '{}'",
                previous.session.routine_name(),
                routine.name
            );
            previous.session.discard();
        }

        let mut session = WorkoutSession::start(&routine, self.logs.clone(), now)
            .with_default_rest(self.ctx.config.session.default_rest_seconds);

        match self.ctx.completion.clone() {
            Some(client) => {
                if let Some(request) = session.begin_rest_suggestions() {
                    let tx = self.suggestions_tx.clone();
                    std::thread::spawn(move || {
                        let response = request.run(&client);
                        // The shell may be gone by now
                        let _ = tx.send(response);
                    });
                }
            }
            None => session.skip_rest_suggestions(),
        }

        let active = self.active.insert(ActiveWorkout {
            session,
            minimized: false,
            timer_clock: now,
        });
        Ok(&mut active.session)
    }

    pub fn active_session(&self) -> Option<&WorkoutSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    pub fn active_session_mut(&mut self) -> Option<&mut WorkoutSession> {
        self.active.as_mut().map(|a| &mut a.session)
    }

    pub fn is_minimized(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.minimized)
    }

    /// Hide the workout behind the tabs; `false` when there is none
    pub fn minimize(&mut self) -> bool {
        self.set_minimized(true)
    }

    pub fn maximize(&mut self) -> bool {
        self.set_minimized(false)
    }

    fn set_minimized(&mut self, minimized: bool) -> bool {
        match self.active.as_mut() {
            Some(active) => {
                active.minimized = minimized;
                true
            }
            None => false,
        }
    }

    /// Add the configured increment to the rest timer, also after it ran
    /// out; `false` without a workout
    pub fn add_rest_time(&mut self) -> bool {
        let increment = self.ctx.config.session.rest_increment_seconds;
        match self.active_session_mut() {
            Some(session) => {
                session.rest_timer_mut().add_seconds(increment);
                true
            }
            None => false,
        }
    }

    /// Toggle a set's completion at `now`. A fresh countdown is anchored
    /// at `now` so the next tick does not cut it short.
    pub fn toggle_set_complete(&mut self, exercise: usize, set: usize, now: DateTime<Utc>) -> Result<bool> {
        self.tick(now);
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| Error::Session("No active workout".into()))?;
        let completed = active.session.toggle_set_complete(exercise, set)?;
        if completed {
            active.timer_clock = now;
        }
        Ok(completed)
    }

    /// Advance the workout clock and the rest timer to `now`. Returns the
    /// elapsed workout seconds, or `None` without a workout.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<u64> {
        let active = self.active.as_mut()?;
        let elapsed = active.session.tick(now);

        let whole = (now - active.timer_clock).num_seconds();
        if whole > 0 {
            active.session.advance_rest_timer(whole as u64);
            active.timer_clock += Duration::seconds(whole);
        }
        Some(elapsed)
    }

    /// Persist the active workout and end it.
    ///
    /// When the store write fails the workout stays active and the error
    /// is returned.
    pub fn finish_workout(&mut self, now: DateTime<Utc>) -> Result<WorkoutLog> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| Error::Session("No active workout".into()))?;

        let stored = self.store.add_log(active.session.finished_log(now))?;

        if let Some(active) = self.active.take() {
            active.session.finish(now);
        }
        self.tab = Tab::History;
        self.pump();
        Ok(stored)
    }

    /// Throw away the active workout; `false` when there is none
    pub fn discard_workout(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.session.discard();
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Demo data and insights
    // ------------------------------------------------------------------------

    /// Write the sample routines and workouts. Only allowed in demo mode;
    /// returns `Ok(false)` otherwise.
    pub fn seed_demo_data(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if self.mode() != StoreMode::Demo {
            tracing::warn!("Refusing to seed demo data outside demo mode");
            return Ok(false);
        }
        self.store.commit(demo::demo_batch(now))?;
        self.pump();
        Ok(true)
    }

    /// The coach summary of the current logs; `None` without a completion
    /// client or without logs.
    pub fn insight(&self) -> Option<String> {
        let client = self.ctx.completion.as_deref()?;
        progress::fetch_insight(client, &self.logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::scripted_client;
    use crate::{ExerciseTemplate, SetField};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
    }

    fn context(data_dir: &std::path::Path, completion: Option<CompletionClient>) -> AppContext {
        let mut config = Config::default();
        config.data.data_dir = data_dir.to_path_buf();
        let identity = sign_in(&Credentials::Token("tester".into()), "gym", data_dir).unwrap();
        AppContext::new(config, identity, completion)
    }

    fn leg_day() -> RoutineDraft {
        RoutineDraft {
            name: "Leg Day".into(),
            notes: String::new(),
            exercises: vec![
                ExerciseTemplate::new("Squat", "4", "6"),
                ExerciseTemplate::new("Calf Raise", "4", "15"),
            ],
        }
    }

    fn shell_with_routine(data_dir: &std::path::Path) -> (Shell, String) {
        let mut shell = Shell::open(context(data_dir, None), StoreMode::Normal).unwrap();
        shell.save_routine(leg_day(), None).unwrap();
        let id = shell.routines()[0].id.clone();
        (shell, id)
    }

    #[test]
    fn test_routine_crud_updates_snapshots() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut shell, id) = shell_with_routine(temp_dir.path());
        assert_eq!(shell.routines().len(), 1);

        let mut edited = leg_day();
        edited.name = "Leg Day II".into();
        shell.save_routine(edited, Some(&id)).unwrap();
        assert_eq!(shell.routines()[0].name, "Leg Day II");

        assert!(shell.delete_routine(&id).unwrap());
        assert!(shell.routines().is_empty());
    }

    #[test]
    fn test_workout_without_client_uses_default_rest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut shell, id) = shell_with_routine(temp_dir.path());

        let session = shell.start_workout(&id, t0()).unwrap();
        assert!(session.suggestions_loaded());
        session.toggle_set_complete(1, 0).unwrap();
        assert_eq!(session.rest_timer().remaining(), 90);
        assert!(!shell.is_minimized());

        assert_eq!(shell.tick(t0() + Duration::seconds(30)), Some(30));
        assert_eq!(shell.active_session().unwrap().rest_timer().remaining(), 60);

        assert!(shell.add_rest_time());
        assert_eq!(shell.active_session().unwrap().rest_timer().remaining(), 90);
    }

    #[test]
    fn test_rest_time_can_be_added_after_expiry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut shell, id) = shell_with_routine(temp_dir.path());
        shell.start_workout(&id, t0()).unwrap();
        assert!(shell.toggle_set_complete(0, 0, t0()).unwrap());

        shell.tick(t0() + Duration::seconds(95));
        assert_eq!(shell.active_session().unwrap().rest_timer().remaining(), 0);

        assert!(shell.add_rest_time());
        assert_eq!(shell.active_session().unwrap().rest_timer().remaining(), 30);

        shell.discard_workout();
        assert!(!shell.add_rest_time());
    }

    #[test]
    fn test_completed_set_restarts_timer_clock() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut shell, id) = shell_with_routine(temp_dir.path());
        shell.start_workout(&id, t0()).unwrap();

        shell.tick(t0() + Duration::milliseconds(30_700));
        let completed_at = t0() + Duration::milliseconds(30_900);
        assert!(shell.toggle_set_complete(0, 0, completed_at).unwrap());

        shell.tick(t0() + Duration::milliseconds(31_200));
        assert_eq!(shell.active_session().unwrap().rest_timer().remaining(), 90);

        shell.tick(completed_at + Duration::seconds(10));
        assert_eq!(shell.active_session().unwrap().rest_timer().remaining(), 80);

        assert!(!shell.toggle_set_complete(0, 0, completed_at + Duration::seconds(11)).unwrap());
        assert!(shell.toggle_set_complete(9, 0, completed_at).is_err());
    }

    #[test]
    fn test_rest_suggestions_arrive_from_background() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (client, _) = scripted_client(vec![Ok(r#"{"Squat": 150, "Deadlift": 200}"#.into())]);
        let mut shell = Shell::open(context(temp_dir.path(), Some(client)), StoreMode::Normal).unwrap();
        shell.save_routine(leg_day(), None).unwrap();
        let id = shell.routines()[0].id.clone();

        shell.start_workout(&id, t0()).unwrap();
        assert!(shell.await_rest_suggestions(std::time::Duration::from_secs(5)));

        let session = shell.active_session().unwrap();
        assert_eq!(session.rest_seconds_for("Squat"), 150);
        assert_eq!(session.rest_seconds_for("Calf Raise"), 90);
        assert!(!session.rest_suggestions().contains_key("Deadlift"));
    }

    #[test]
    fn test_late_suggestions_are_dropped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut shell, id) = shell_with_routine(temp_dir.path());
        shell.start_workout(&id, t0()).unwrap();

        let mut suggestions = std::collections::HashMap::new();
        suggestions.insert("Squat".to_string(), 240);
        shell
            .suggestions_tx
            .send(RestSuggestionResponse {
                session_id: Uuid::new_v4(),
                suggestions,
            })
            .unwrap();

        shell.pump();
        assert_eq!(shell.active_session().unwrap().rest_seconds_for("Squat"), 90);
    }

    #[test]
    fn test_finish_persists_and_routes_to_history() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut shell, id) = shell_with_routine(temp_dir.path());
        shell.set_tab(Tab::Progress);

        let session = shell.start_workout(&id, t0()).unwrap();
        session.update_set(0, 0, SetField::Weight, "225").unwrap();
        session.update_set(0, 0, SetField::Reps, "6").unwrap();
        session.toggle_set_complete(0, 0).unwrap();
        assert!(shell.minimize());
        assert!(shell.is_minimized());

        let log = shell.finish_workout(t0() + Duration::seconds(1800)).unwrap();
        assert_eq!(log.duration_seconds, 1800);
        assert!(shell.active_session().is_none());
        assert!(!shell.is_minimized());
        assert_eq!(shell.tab(), Tab::History);
        assert_eq!(shell.logs().len(), 1);
        assert_eq!(shell.logs()[0].exercises[0].sets[0].weight, "225");
        // The untouched calf raise set is not kept
        assert!(shell.logs()[0].exercises[1].sets.is_empty());
    }

    #[test]
    fn test_failed_persist_keeps_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut shell, id) = shell_with_routine(temp_dir.path());
        shell.start_workout(&id, t0()).unwrap();

        // Put a plain file where the user's store directory was
        let dir = shell.store.path().parent().unwrap().to_path_buf();
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, "not a directory").unwrap();

        assert!(shell.finish_workout(t0()).is_err());
        assert!(shell.active_session().is_some());
        assert_eq!(shell.tab(), Tab::Routines);
    }

    #[test]
    fn test_start_replaces_active_workout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut shell, id) = shell_with_routine(temp_dir.path());
        let first = shell.start_workout(&id, t0()).unwrap().id();
        shell.minimize();
        let second = shell.start_workout(&id, t0()).unwrap().id();
        assert_ne!(first, second);
        assert!(!shell.is_minimized());

        assert!(shell.discard_workout());
        assert!(!shell.discard_workout());
        assert!(shell.start_workout("missing", t0()).is_err());
    }

    #[test]
    fn test_demo_mode_and_seeding() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut shell, id) = shell_with_routine(temp_dir.path());

        assert!(!shell.seed_demo_data(t0()).unwrap());
        assert!(shell.logs().is_empty());

        shell.start_workout(&id, t0()).unwrap();
        assert!(!shell.set_demo_mode(true).unwrap());
        shell.discard_workout();

        assert!(shell.set_demo_mode(true).unwrap());
        assert!(shell.routines().is_empty());
        assert!(shell.seed_demo_data(t0()).unwrap());
        assert_eq!(shell.routines().len(), 2);
        assert_eq!(shell.logs().len(), 10);
        assert_eq!(shell.logs()[0].routine_name, "Push Day");

        assert!(shell.set_demo_mode(false).unwrap());
        assert_eq!(shell.routines().len(), 1);
        assert!(shell.logs().is_empty());
    }

    #[test]
    fn test_insight_and_generation_need_client() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (shell, _) = shell_with_routine(temp_dir.path());
        assert!(shell.insight().is_none());
        assert!(shell.generate_routine("legs").is_err());
    }

    #[test]
    fn test_refresh_sees_other_writers() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut shell = Shell::open(context(temp_dir.path(), None), StoreMode::Normal).unwrap();
        let mut other = Shell::open(context(temp_dir.path(), None), StoreMode::Normal).unwrap();

        other.save_routine(leg_day(), None).unwrap();
        assert!(shell.routines().is_empty());
        assert!(shell.refresh().unwrap());
        assert_eq!(shell.routines().len(), 1);
    }
}
