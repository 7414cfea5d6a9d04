//! Document store for routines and workout logs.
//!
//! Each signed-in user gets one JSON document under
//! `{data_dir}/artifacts/{app_id}/users/{user_id}/collections.json` holding
//! every collection (`routines`, `logs`, `demo_routines`, `demo_logs`).
//! Keeping them in one file makes a [`WriteBatch`] a single atomic replace.
//!
//! Readers get whole snapshots, newest first. Subscribers receive the full
//! snapshot on subscribe and again after every write (or after
//! [`FileStore::refresh`] notices an outside change); they are expected to
//! replace their state wholesale.

use crate::identity::Identity;
use crate::{Error, Result, Routine, RoutineDraft, StoreMode, WorkoutLog};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use tempfile::NamedTempFile;
use uuid::Uuid;

const COLLECTIONS_FILE: &str = "collections.json";
const LOCK_FILE: &str = "collections.lock";

// ============================================================================
// Subscriptions
// ============================================================================

/// Live feed of full collection snapshots
pub struct Subscription<T> {
    rx: Receiver<Vec<T>>,
}

impl<T> Subscription<T> {
    /// The newest snapshot published since the last call, if any
    pub fn latest(&self) -> Option<Vec<T>> {
        self.rx.try_iter().last()
    }
}

fn publish<T: Clone>(subscribers: &mut Vec<Sender<Vec<T>>>, snapshot: &[T]) {
    // Dropped receivers unsubscribe themselves
    subscribers.retain(|tx| tx.send(snapshot.to_vec()).is_ok());
}

// ============================================================================
// Store traits
// ============================================================================

/// Durable collection of routine definitions
pub trait RoutineStore {
    /// All routines, newest first
    fn routines(&self) -> Result<Vec<Routine>>;
    fn create_routine(&mut self, draft: RoutineDraft) -> Result<Routine>;
    /// Replace a routine's name, notes and exercises
    fn update_routine(&mut self, id: &str, draft: RoutineDraft) -> Result<()>;
    /// Returns whether a routine was removed
    fn delete_routine(&mut self, id: &str) -> Result<bool>;
    fn subscribe_routines(&mut self) -> Result<Subscription<Routine>>;
}

/// Durable collection of finished workouts
pub trait LogStore {
    /// All logs, most recent first
    fn logs(&self) -> Result<Vec<WorkoutLog>>;
    /// Persist a log, assigning an id when it has none
    fn add_log(&mut self, log: WorkoutLog) -> Result<WorkoutLog>;
    fn subscribe_logs(&mut self) -> Result<Subscription<WorkoutLog>>;
}

/// Several creates applied together or not at all
#[derive(Clone, Debug)]
pub struct WriteBatch {
    mode: StoreMode,
    routines: Vec<(RoutineDraft, DateTime<Utc>)>,
    logs: Vec<WorkoutLog>,
}

impl WriteBatch {
    pub fn new(mode: StoreMode) -> Self {
        Self {
            mode,
            routines: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn create_routine(&mut self, draft: RoutineDraft, created_at: DateTime<Utc>) -> &mut Self {
        self.routines.push((draft, created_at));
        self
    }

    pub fn add_log(&mut self, log: WorkoutLog) -> &mut Self {
        self.logs.push(log);
        self
    }

    pub fn len(&self) -> usize {
        self.routines.len() + self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Store that can apply a [`WriteBatch`] atomically
pub trait BatchStore: RoutineStore + LogStore {
    fn commit(&mut self, batch: WriteBatch) -> Result<()>;
}

// ============================================================================
// On-disk document
// ============================================================================

/// One collection as stored on disk.
///
/// Entries that do not parse are kept verbatim in `unreadable` and written
/// back after the readable ones, so a write never erases them.
#[derive(Clone, Debug)]
struct Documents<T> {
    items: Vec<T>,
    unreadable: Vec<serde_json::Value>,
}

impl<T> Default for Documents<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            unreadable: Vec::new(),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Documents<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
        let mut documents = Documents::default();
        for (index, value) in raw.into_iter().enumerate() {
            match T::deserialize(&value) {
                Ok(item) => documents.items.push(item),
                Err(e) => {
                    tracing::warn!("Skipping unreadable document at index {}: {}", index, e);
                    documents.unreadable.push(value);
                }
            }
        }
        Ok(documents)
    }
}

impl<T: Serialize> Serialize for Documents<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.items.len() + self.unreadable.len()))?;
        for item in &self.items {
            seq.serialize_element(item)?;
        }
        for value in &self.unreadable {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Collections {
    #[serde(default)]
    routines: Documents<Routine>,
    #[serde(default)]
    logs: Documents<WorkoutLog>,
    #[serde(default)]
    demo_routines: Documents<Routine>,
    #[serde(default)]
    demo_logs: Documents<WorkoutLog>,
}

impl Collections {
    fn routines(&self, mode: StoreMode) -> &Vec<Routine> {
        match mode {
            StoreMode::Normal => &self.routines.items,
            StoreMode::Demo => &self.demo_routines.items,
        }
    }

    fn routines_mut(&mut self, mode: StoreMode) -> &mut Vec<Routine> {
        match mode {
            StoreMode::Normal => &mut self.routines.items,
            StoreMode::Demo => &mut self.demo_routines.items,
        }
    }

    fn logs(&self, mode: StoreMode) -> &Vec<WorkoutLog> {
        match mode {
            StoreMode::Normal => &self.logs.items,
            StoreMode::Demo => &self.demo_logs.items,
        }
    }

    fn logs_mut(&mut self, mode: StoreMode) -> &mut Vec<WorkoutLog> {
        match mode {
            StoreMode::Normal => &mut self.logs.items,
            StoreMode::Demo => &mut self.demo_logs.items,
        }
    }

    // Reversed first so that equal timestamps list the later insert first
    fn sorted_routines(&self, mode: StoreMode) -> Vec<Routine> {
        let mut routines: Vec<_> = self.routines(mode).iter().rev().cloned().collect();
        routines.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        routines
    }

    fn sorted_logs(&self, mode: StoreMode) -> Vec<WorkoutLog> {
        let mut logs: Vec<_> = self.logs(mode).iter().rev().cloned().collect();
        logs.sort_by(|a, b| b.date.cmp(&a.date));
        logs
    }
}

enum Loaded {
    Missing,
    Parsed(Collections),
    Corrupt(String),
}

// ============================================================================
// File store
// ============================================================================

/// JSON-file store for one user, reading and writing one mode's collections
pub struct FileStore {
    dir: PathBuf,
    mode: StoreMode,
    routine_subscribers: Vec<Sender<Vec<Routine>>>,
    log_subscribers: Vec<Sender<Vec<WorkoutLog>>>,
    last_routines: Vec<Routine>,
    last_logs: Vec<WorkoutLog>,
}

impl FileStore {
    /// Open the store for a signed-in user
    pub fn open(data_dir: &Path, identity: &Identity, mode: StoreMode) -> Result<Self> {
        Self::open_dir(identity.namespace_dir(data_dir), mode)
    }

    /// Open a store rooted at `dir`
    pub fn open_dir(dir: impl Into<PathBuf>, mode: StoreMode) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!("Opened {:?} store at {:?}", mode, dir);
        let mut store = Self {
            dir,
            mode,
            routine_subscribers: Vec::new(),
            log_subscribers: Vec::new(),
            last_routines: Vec::new(),
            last_logs: Vec::new(),
        };
        let collections = store.read()?;
        store.last_routines = collections.sorted_routines(mode);
        store.last_logs = collections.sorted_logs(mode);
        Ok(store)
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(COLLECTIONS_FILE)
    }

    fn lock_file(&self) -> Result<File> {
        Ok(OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))?)
    }

    fn load_unlocked(&self) -> Result<Loaded> {
        let path = self.path();
        if !path.exists() {
            return Ok(Loaded::Missing);
        }

        let mut contents = String::new();
        File::open(&path)?.read_to_string(&mut contents)?;
        match serde_json::from_str::<Collections>(&contents) {
            Ok(collections) => Ok(Loaded::Parsed(collections)),
            Err(e) => Ok(Loaded::Corrupt(e.to_string())),
        }
    }

    fn read(&self) -> Result<Collections> {
        let lock = self.lock_file()?;
        lock.lock_shared()?;
        let loaded = self.load_unlocked();
        lock.unlock()?;

        match loaded? {
            Loaded::Missing => Ok(Collections::default()),
            Loaded::Parsed(collections) => Ok(collections),
            Loaded::Corrupt(e) => {
                tracing::warn!("Failed to parse store {:?}: {}. Reading as empty.", self.path(), e);
                Ok(Collections::default())
            }
        }
    }

    fn write_unlocked(&self, collections: &Collections) -> Result<()> {
        let temp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, collections)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(self.path()).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Load, change and save the document under an exclusive lock, then
    /// publish fresh snapshots.
    fn modify<R>(&mut self, f: impl FnOnce(&mut Collections) -> Result<R>) -> Result<R> {
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;

        let outcome = (|| -> Result<(R, Collections)> {
            let mut collections = match self.load_unlocked()? {
                Loaded::Missing => Collections::default(),
                Loaded::Parsed(collections) => collections,
                Loaded::Corrupt(e) => {
                    // Keep the unreadable file for manual recovery
                    let backup = self
                        .path()
                        .with_extension(format!("json.corrupt-{}", Utc::now().timestamp()));
                    std::fs::rename(self.path(), &backup)?;
                    tracing::warn!("Store {:?} was unreadable ({}); moved to {:?}", self.path(), e, backup);
                    Collections::default()
                }
            };
            let result = f(&mut collections)?;
            self.write_unlocked(&collections)?;
            Ok((result, collections))
        })();

        lock.unlock()?;
        let (result, collections) = outcome?;
        self.publish(&collections);
        Ok(result)
    }

    fn publish(&mut self, collections: &Collections) {
        let routines = collections.sorted_routines(self.mode);
        let logs = collections.sorted_logs(self.mode);
        publish(&mut self.routine_subscribers, &routines);
        publish(&mut self.log_subscribers, &logs);
        self.last_routines = routines;
        self.last_logs = logs;
    }

    /// Re-read the document and publish if it changed since the last
    /// publish. Returns whether anything changed.
    pub fn refresh(&mut self) -> Result<bool> {
        let collections = self.read()?;
        let routines = collections.sorted_routines(self.mode);
        let logs = collections.sorted_logs(self.mode);
        let changed = self.last_routines != routines || self.last_logs != logs;
        if changed {
            tracing::debug!("Store {:?} changed on disk, publishing", self.path());
            self.publish(&collections);
        }
        Ok(changed)
    }
}

impl RoutineStore for FileStore {
    fn routines(&self) -> Result<Vec<Routine>> {
        Ok(self.read()?.sorted_routines(self.mode))
    }

    fn create_routine(&mut self, draft: RoutineDraft) -> Result<Routine> {
        let mode = self.mode;
        let routine = Routine {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            notes: draft.notes,
            exercises: draft.exercises,
            created_at: Utc::now(),
        };
        let created = routine.clone();
        self.modify(move |c| {
            c.routines_mut(mode).push(routine);
            Ok(())
        })?;
        tracing::info!("Created routine '{}' ({})", created.name, created.id);
        Ok(created)
    }

    fn update_routine(&mut self, id: &str, draft: RoutineDraft) -> Result<()> {
        let mode = self.mode;
        self.modify(|c| {
            let routine = c
                .routines_mut(mode)
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| Error::Store(format!("No routine with id {}", id)))?;
            routine.name = draft.name;
            routine.notes = draft.notes;
            routine.exercises = draft.exercises;
            Ok(())
        })?;
        tracing::info!("Updated routine {}", id);
        Ok(())
    }

    fn delete_routine(&mut self, id: &str) -> Result<bool> {
        let mode = self.mode;
        let removed = self.modify(|c| {
            let routines = c.routines_mut(mode);
            let before = routines.len();
            routines.retain(|r| r.id != id);
            Ok(routines.len() != before)
        })?;
        if removed {
            tracing::info!("Deleted routine {}", id);
        } else {
            tracing::debug!("No routine {} to delete", id);
        }
        Ok(removed)
    }

    fn subscribe_routines(&mut self) -> Result<Subscription<Routine>> {
        let snapshot = self.routines()?;
        let (tx, rx) = mpsc::channel();
        // The receiver is alive, so this cannot fail
        let _ = tx.send(snapshot.clone());
        self.routine_subscribers.push(tx);
        self.last_routines = snapshot;
        Ok(Subscription { rx })
    }
}

impl LogStore for FileStore {
    fn logs(&self) -> Result<Vec<WorkoutLog>> {
        Ok(self.read()?.sorted_logs(self.mode))
    }

    fn add_log(&mut self, mut log: WorkoutLog) -> Result<WorkoutLog> {
        if log.id.is_empty() {
            log.id = Uuid::new_v4().to_string();
        }
        let mode = self.mode;
        let stored = log.clone();
        self.modify(move |c| {
            c.logs_mut(mode).push(log);
            Ok(())
        })?;
        tracing::info!("Logged workout '{}' ({})", stored.routine_name, stored.id);
        Ok(stored)
    }

    fn subscribe_logs(&mut self) -> Result<Subscription<WorkoutLog>> {
        let snapshot = self.logs()?;
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(snapshot.clone());
        self.log_subscribers.push(tx);
        self.last_logs = snapshot;
        Ok(Subscription { rx })
    }
}

impl BatchStore for FileStore {
    fn commit(&mut self, batch: WriteBatch) -> Result<()> {
        let count = batch.len();
        let mode = batch.mode;
        self.modify(move |c| {
            for (draft, created_at) in batch.routines {
                c.routines_mut(mode).push(Routine {
                    id: Uuid::new_v4().to_string(),
                    name: draft.name,
                    notes: draft.notes,
                    exercises: draft.exercises,
                    created_at,
                });
            }
            for mut log in batch.logs {
                if log.id.is_empty() {
                    log.id = Uuid::new_v4().to_string();
                }
                c.logs_mut(mode).push(log);
            }
            Ok(())
        })?;
        tracing::info!("Committed batch of {} documents", count);
        Ok(())
    }
}
