//! Routines view: the routine editor form and AI routine generation.

use crate::completion::{decode_json, CompletionClient, CompletionRequest};
use crate::{Error, ExerciseTemplate, Result, Routine, RoutineDraft};

const GENERATE_SYSTEM_PROMPT: &str = "You are an expert fitness coach. Create a workout routine based on the user's request. You MUST return valid JSON in the following format: { \"name\": \"Creative Routine Name\", \"notes\": \"Brief notes on focus/strategy\", \"exercises\": [{ \"name\": \"Exercise Name\", \"sets\": \"3\", \"reps\": \"12\", \"notes\": \"Optional tip\" }] }. Do not include any markdown formatting, code blocks, or explanations. Return ONLY the raw JSON string.";

/// How many exercise names a routine card shows before "+N more"
const PREVIEW_EXERCISES: usize = 3;

/// Form state for creating or editing a routine
#[derive(Clone, Debug, PartialEq)]
pub struct RoutineEditor {
    pub name: String,
    pub notes: String,
    pub exercises: Vec<ExerciseTemplate>,
    editing: Option<String>,
}

impl Default for RoutineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutineEditor {
    /// Empty form with one blank exercise row
    pub fn new() -> Self {
        Self {
            name: String::new(),
            notes: String::new(),
            exercises: vec![ExerciseTemplate::default()],
            editing: None,
        }
    }

    /// Form pre-filled from an existing routine
    pub fn edit(routine: &Routine) -> Self {
        let exercises = if routine.exercises.is_empty() {
            vec![ExerciseTemplate::default()]
        } else {
            routine.exercises.clone()
        };
        Self {
            name: routine.name.clone(),
            notes: routine.notes.clone(),
            exercises,
            editing: Some(routine.id.clone()),
        }
    }

    /// Id of the routine being edited, if any
    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn add_exercise(&mut self) {
        self.exercises.push(ExerciseTemplate::default());
    }

    pub fn remove_exercise(&mut self, index: usize) {
        if index < self.exercises.len() {
            self.exercises.remove(index);
        }
    }

    pub fn exercise_mut(&mut self, index: usize) -> Option<&mut ExerciseTemplate> {
        self.exercises.get_mut(index)
    }

    /// The draft to store, or `None` when the name is blank or no row has
    /// an exercise name. Blank rows are dropped.
    pub fn save(&self) -> Option<RoutineDraft> {
        let exercises: Vec<_> = self
            .exercises
            .iter()
            .filter(|e| !e.name.trim().is_empty())
            .cloned()
            .collect();

        if self.name.trim().is_empty() || exercises.is_empty() {
            tracing::debug!("Refusing to save routine without a name or exercises");
            return None;
        }

        Some(RoutineDraft {
            name: self.name.clone(),
            notes: self.notes.trim().to_string(),
            exercises,
        })
    }
}

/// Ask the model for a routine matching `prompt`.
///
/// The answer is accepted only when it has a name and at least one exercise.
pub fn generate_routine(client: &CompletionClient, prompt: &str) -> Result<RoutineDraft> {
    if prompt.trim().is_empty() {
        return Err(Error::Other("Describe the workout you want first".into()));
    }

    let raw = client.complete(&CompletionRequest::json(prompt, GENERATE_SYSTEM_PROMPT))?;
    let draft: RoutineDraft = decode_json(&raw)?;

    let has_name = !draft.name.trim().is_empty();
    let has_exercises = draft.exercises.iter().any(|e| !e.name.trim().is_empty());
    if !has_name || !has_exercises {
        return Err(Error::Decode("generated routine is missing a name or exercises".into()));
    }

    tracing::info!(
        "Generated routine '{}' with {} exercises",
        draft.name,
        draft.exercises.len()
    );
    Ok(RoutineDraft {
        exercises: draft
            .exercises
            .into_iter()
            .filter(|e| !e.name.trim().is_empty())
            .collect(),
        ..draft
    })
}

/// First few exercise names of a routine and how many more there are
pub fn routine_preview(routine: &Routine) -> (Vec<&str>, usize) {
    let names = routine
        .exercises
        .iter()
        .take(PREVIEW_EXERCISES)
        .map(|e| e.name.as_str())
        .collect();
    let more = routine.exercises.len().saturating_sub(PREVIEW_EXERCISES);
    (names, more)
}
