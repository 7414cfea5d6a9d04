//! Workout session engine.
//!
//! A [`WorkoutSession`] owns one in-progress workout: the per-exercise set
//! logs, the elapsed duration, the rest timer and the map of AI-suggested
//! rest lengths. It is created from a routine and ends by being consumed,
//! either through [`WorkoutSession::finish`], which yields the
//! [`WorkoutLog`] to persist, or through [`WorkoutSession::discard`].
//!
//! Rest suggestions are fetched at most once per session. The fetch is split
//! in three steps so the slow network call can run off the caller's thread:
//! [`WorkoutSession::begin_rest_suggestions`] hands out the request,
//! [`RestSuggestionRequest::run`] performs it, and
//! [`WorkoutSession::apply_rest_suggestions`] folds the answer back in.
//! Answers are tagged with the session id, so one that arrives after its
//! session ended is ignored.

use crate::completion::{CompletionClient, CompletionRequest};
use crate::timer::RestTimer;
use crate::{
    Error, ExerciseLog, LoggedExercise, PreviousSet, Result, Routine, SetEntry, SetField,
    WorkoutLog,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Rest length used when no suggestion exists for an exercise
pub const DEFAULT_REST_SECONDS: u32 = 90;

const REST_SUGGESTION_SYSTEM_PROMPT: &str = "You are a strict JSON generator. You must use the EXACT exercise names provided in the prompt as the keys in your JSON response.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SuggestionState {
    NotRequested,
    Pending,
    Loaded,
}

/// One in-progress workout
#[derive(Debug)]
pub struct WorkoutSession {
    id: Uuid,
    routine_id: String,
    routine_name: String,
    started_at: DateTime<Utc>,
    elapsed_seconds: u64,
    exercises: Vec<ExerciseLog>,
    rest_timer: RestTimer,
    default_rest_seconds: u32,
    rest_suggestions: HashMap<String, u32>,
    suggestion_state: SuggestionState,
    history: Vec<WorkoutLog>,
}

impl WorkoutSession {
    /// Start a session for `routine`.
    ///
    /// `history` holds earlier finished workouts, most recent first; it is
    /// only consulted for [`WorkoutSession::previous_set`].
    pub fn start(routine: &Routine, history: Vec<WorkoutLog>, now: DateTime<Utc>) -> Self {
        let exercises = routine
            .exercises
            .iter()
            .map(ExerciseLog::from_template)
            .collect::<Vec<_>>();

        tracing::info!(
            "Started workout '{}' with {} exercises",
            routine.name,
            exercises.len()
        );

        Self {
            id: Uuid::new_v4(),
            routine_id: routine.id.clone(),
            routine_name: routine.name.clone(),
            started_at: now,
            elapsed_seconds: 0,
            exercises,
            rest_timer: RestTimer::default(),
            default_rest_seconds: DEFAULT_REST_SECONDS,
            rest_suggestions: HashMap::new(),
            suggestion_state: SuggestionState::NotRequested,
            history,
        }
    }

    /// Override the rest length used when no suggestion applies
    pub fn with_default_rest(mut self, seconds: u32) -> Self {
        self.default_rest_seconds = seconds;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn routine_id(&self) -> &str {
        &self.routine_id
    }

    pub fn routine_name(&self) -> &str {
        &self.routine_name
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn exercises(&self) -> &[ExerciseLog] {
        &self.exercises
    }

    pub fn rest_timer(&self) -> &RestTimer {
        &self.rest_timer
    }

    pub fn rest_timer_mut(&mut self) -> &mut RestTimer {
        &mut self.rest_timer
    }

    pub fn rest_suggestions(&self) -> &HashMap<String, u32> {
        &self.rest_suggestions
    }

    pub fn suggestions_loaded(&self) -> bool {
        self.suggestion_state == SuggestionState::Loaded
    }

    // ------------------------------------------------------------------------
    // Duration
    // ------------------------------------------------------------------------

    /// Whole seconds elapsed as of the last tick
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Refresh the elapsed duration. It never goes backwards, even if the
    /// clock does.
    pub fn tick(&mut self, now: DateTime<Utc>) -> u64 {
        let elapsed = (now - self.started_at).num_seconds().max(0) as u64;
        self.elapsed_seconds = self.elapsed_seconds.max(elapsed);
        self.elapsed_seconds
    }

    /// Advance the rest countdown by `seconds` whole seconds
    pub fn advance_rest_timer(&mut self, seconds: u64) {
        self.rest_timer.advance(seconds);
    }

    // ------------------------------------------------------------------------
    // Set bookkeeping
    // ------------------------------------------------------------------------

    fn exercise_mut(&mut self, exercise: usize) -> Result<&mut ExerciseLog> {
        let count = self.exercises.len();
        self.exercises
            .get_mut(exercise)
            .ok_or_else(|| Error::Session(format!("exercise {} out of range ({})", exercise, count)))
    }

    fn set_mut(&mut self, exercise: usize, set: usize) -> Result<&mut SetEntry> {
        let log = self.exercise_mut(exercise)?;
        if set >= log.sets.len() {
            return Err(Error::Session(format!(
                "set {} out of range for '{}' ({})",
                set,
                log.name,
                log.sets.len()
            )));
        }
        Ok(&mut log.sets[set])
    }

    /// Append a set, carrying weight and reps forward from the last one
    pub fn add_set(&mut self, exercise: usize) -> Result<()> {
        let log = self.exercise_mut(exercise)?;
        let next = log
            .sets
            .last()
            .map(|last| SetEntry::new(last.weight.clone(), last.reps.clone(), false))
            .unwrap_or_default();
        log.sets.push(next);
        Ok(())
    }

    /// Store `value` verbatim in the chosen field
    pub fn update_set(
        &mut self,
        exercise: usize,
        set: usize,
        field: SetField,
        value: impl Into<String>,
    ) -> Result<()> {
        let entry = self.set_mut(exercise, set)?;
        match field {
            SetField::Weight => entry.weight = value.into(),
            SetField::Reps => entry.reps = value.into(),
        }
        Ok(())
    }

    /// Remove a set. The last remaining set of an exercise is kept, in which
    /// case this returns `Ok(false)`.
    pub fn remove_set(&mut self, exercise: usize, set: usize) -> Result<bool> {
        let log = self.exercise_mut(exercise)?;
        if set >= log.sets.len() {
            return Err(Error::Session(format!(
                "set {} out of range for '{}'",
                set, log.name
            )));
        }
        if log.sets.len() == 1 {
            return Ok(false);
        }
        log.sets.remove(set);
        Ok(true)
    }

    /// Flip a set's completed flag and return the new value.
    ///
    /// Completing a set starts the rest timer with the suggested rest for
    /// that exercise, or the default rest when there is none.
    pub fn toggle_set_complete(&mut self, exercise: usize, set: usize) -> Result<bool> {
        let entry = self.set_mut(exercise, set)?;
        entry.completed = !entry.completed;
        let completed = entry.completed;

        if completed {
            let seconds = self.rest_seconds_for(&self.exercises[exercise].name);
            self.rest_timer.start(seconds);
        }
        Ok(completed)
    }

    /// Rest length for an exercise, by exact name
    pub fn rest_seconds_for(&self, exercise_name: &str) -> u32 {
        self.rest_suggestions
            .get(exercise_name)
            .copied()
            .filter(|s| *s > 0)
            .unwrap_or(self.default_rest_seconds)
    }

    /// The set at `position` the last time `exercise_name` was performed
    pub fn previous_set(&self, exercise_name: &str, position: usize) -> Option<PreviousSet> {
        self.history
            .iter()
            .find_map(|log| log.exercise(exercise_name))
            .and_then(|exercise| exercise.sets.get(position))
            .map(|set| PreviousSet {
                weight: set.weight.clone(),
                reps: set.reps.clone(),
            })
    }

    // ------------------------------------------------------------------------
    // Rest suggestions
    // ------------------------------------------------------------------------

    /// Hand out the one rest-suggestion request this session will make.
    ///
    /// Returns `None` once a request has been handed out.
    pub fn begin_rest_suggestions(&mut self) -> Option<RestSuggestionRequest> {
        if self.suggestion_state != SuggestionState::NotRequested {
            return None;
        }
        self.suggestion_state = SuggestionState::Pending;

        let mut seen = HashSet::new();
        let exercise_names = self
            .exercises
            .iter()
            .filter(|e| seen.insert(e.name.as_str()))
            .map(|e| e.name.clone())
            .collect();

        Some(RestSuggestionRequest {
            session_id: self.id,
            exercise_names,
        })
    }

    /// Fold a rest-suggestion answer into the session.
    ///
    /// Answers for another session are ignored and `false` is returned.
    pub fn apply_rest_suggestions(&mut self, response: RestSuggestionResponse) -> bool {
        if response.session_id != self.id {
            tracing::debug!(
                "Ignoring rest suggestions for session {} (active: {})",
                response.session_id,
                self.id
            );
            return false;
        }
        self.rest_suggestions = response.suggestions;
        self.suggestion_state = SuggestionState::Loaded;
        true
    }

    /// Fetch and apply rest suggestions on the calling thread
    pub fn request_rest_suggestions(&mut self, client: &CompletionClient) {
        if let Some(request) = self.begin_rest_suggestions() {
            let response = request.run(client);
            self.apply_rest_suggestions(response);
        }
    }

    /// Mark suggestions as loaded without asking anyone; every set then
    /// rests for the default length.
    pub fn skip_rest_suggestions(&mut self) {
        if let Some(request) = self.begin_rest_suggestions() {
            self.apply_rest_suggestions(request.empty_response());
        }
    }

    // ------------------------------------------------------------------------
    // Terminal outcomes
    // ------------------------------------------------------------------------

    /// The record `finish` would produce at `now`, without ending the session
    pub fn finished_log(&self, now: DateTime<Utc>) -> WorkoutLog {
        let elapsed = (now - self.started_at).num_seconds().max(0) as u64;
        WorkoutLog {
            id: String::new(),
            routine_id: Some(self.routine_id.clone()),
            routine_name: self.routine_name.clone(),
            duration_seconds: self.elapsed_seconds.max(elapsed),
            date: now,
            exercises: self
                .exercises
                .iter()
                .map(|log| LoggedExercise {
                    name: log.name.clone(),
                    sets: log
                        .sets
                        .iter()
                        .filter(|s| s.is_worth_keeping())
                        .cloned()
                        .collect(),
                })
                .collect(),
        }
    }

    /// End the session and produce the record to persist
    pub fn finish(self, now: DateTime<Utc>) -> WorkoutLog {
        let log = self.finished_log(now);
        tracing::info!(
            "Finished workout '{}' after {}s",
            log.routine_name,
            log.duration_seconds
        );
        log
    }

    /// End the session without producing anything
    pub fn discard(self) {
        tracing::info!("Discarded workout '{}'", self.routine_name);
    }
}

/// A pending rest-suggestion fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestSuggestionRequest {
    pub session_id: Uuid,
    pub exercise_names: Vec<String>,
}

/// Rest suggestions for one session, keyed by exact exercise name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestSuggestionResponse {
    pub session_id: Uuid,
    pub suggestions: HashMap<String, u32>,
}

/// A non-negative whole number of seconds, accepting `60.0` as well as `60`
fn whole_seconds(value: &serde_json::Value) -> Option<u32> {
    if let Some(seconds) = value.as_u64() {
        return u32::try_from(seconds).ok();
    }
    value
        .as_f64()
        .filter(|s| s.is_finite() && *s >= 0.0 && s.fract() == 0.0 && *s <= f64::from(u32::MAX))
        .map(|s| s as u32)
}

impl RestSuggestionRequest {
    pub fn completion_request(&self) -> CompletionRequest {
        let names = serde_json::to_string(&self.exercise_names).unwrap_or_else(|_| "[]".into());
        let prompt = format!(
            "Analyze the following exercises array: {}. Classify each as \"Compound\" or \"Isolation\". Return a JSON object where keys are the EXACT exercise names from the input array (verbatim) and values are recommended rest times in seconds (integer). Use 120-180s for compound, 60-90s for isolation. Example format: {{\"Bench Press\": 180, \"Curl\": 60}}",
            names
        );
        CompletionRequest::json(prompt, REST_SUGGESTION_SYSTEM_PROMPT)
    }

    pub fn empty_response(&self) -> RestSuggestionResponse {
        RestSuggestionResponse {
            session_id: self.session_id,
            suggestions: HashMap::new(),
        }
    }

    /// Ask the model. Any failure yields an empty suggestion map.
    pub fn run(&self, client: &CompletionClient) -> RestSuggestionResponse {
        let decoded = client.complete_json::<HashMap<String, serde_json::Value>>(&self.completion_request());
        let suggestions = match decoded {
            Ok(map) => {
                let (known, unknown): (HashMap<_, _>, HashMap<_, _>) = map
                    .into_iter()
                    .filter_map(|(name, value)| match whole_seconds(&value) {
                        Some(seconds) => Some((name, seconds)),
                        None => {
                            tracing::warn!("Ignoring rest suggestion {:?} for '{}'", value, name);
                            None
                        }
                    })
                    .partition(|(name, _)| self.exercise_names.contains(name));
                if !unknown.is_empty() {
                    tracing::warn!(
                        "Dropping rest suggestions for unknown exercises: {:?}",
                        unknown.keys().collect::<Vec<_>>()
                    );
                }
                known
            }
            Err(e) => {
                tracing::warn!("Rest suggestions unavailable: {}", e);
                HashMap::new()
            }
        };

        RestSuggestionResponse {
            session_id: self.session_id,
            suggestions,
        }
    }
}
