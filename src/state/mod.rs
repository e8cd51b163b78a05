//! Durable sync state — the mapping from task ids to remote issues.
//!
//! The store owns the persisted map behind an explicit load/use/save
//! lifecycle. It is constructed and injected into the orchestrator; nothing
//! here is process-global. Persistence format is a JSON array of records,
//! ordered by task id so saves are deterministic and diffable.

use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::parser::Task;

/// Errors from the state store. All of these are fatal for a sync run:
/// silent partial state is worse than stopping.
#[derive(Debug, Error)]
pub enum StateError {
    /// An operation was attempted before `load()`.
    #[error("sync state not loaded; call load() before use")]
    NotLoaded,
    /// The backing file exists but could not be read.
    #[error("failed to read state file {}: {source}", path.display())]
    Read {
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The backing file could not be written.
    #[error("failed to write state file {}: {source}", path.display())]
    Write {
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The backing file is not valid JSON of the expected shape.
    #[error("state file {} is corrupt: {source}", path.display())]
    Corrupt {
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },
    /// An imported record failed shape validation.
    #[error("invalid sync state record: {0}")]
    InvalidRecord(String),
}

/// The durable link between one task and one remote issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Task id this record belongs to.
    pub task_id: String,
    /// Issue number in the remote tracker.
    pub remote_issue_number: u64,
    /// When the task was last pushed to the tracker.
    pub last_synced: DateTime<Utc>,
    /// Content fingerprint at the time of the last sync.
    pub last_hash: String,
    /// Source file the task lived in at the time of the last sync.
    pub file_path: String,
}

/// Durable key-value store of [`SyncState`] records keyed by task id.
pub struct SyncStateStore {
    path: PathBuf,
    states: BTreeMap<String, SyncState>,
    loaded: bool,
}

impl SyncStateStore {
    /// Creates a store backed by the given file. Call [`load`](Self::load)
    /// before any other operation.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, states: BTreeMap::new(), loaded: false }
    }

    /// Reads the backing file into memory.
    ///
    /// A missing file is not an error — it initializes an empty store
    /// (first run). Anything else is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Read`] or [`StateError::Corrupt`] when the file
    /// exists but cannot be read or decoded.
    pub fn load(&mut self) -> Result<(), StateError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let records: Vec<SyncState> = serde_json::from_str(&content)
                    .map_err(|source| StateError::Corrupt { path: self.path.clone(), source })?;
                self.states = records.into_iter().map(|r| (r.task_id.clone(), r)).collect();
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet, starting empty");
                self.states.clear();
            }
            Err(source) => return Err(StateError::Read { path: self.path.clone(), source }),
        }
        self.loaded = true;
        Ok(())
    }

    /// Writes the full map to the backing file, creating parent directories
    /// as needed. Write-then-rename, so a crash mid-save leaves the previous
    /// file intact.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotLoaded`] before `load()`, or
    /// [`StateError::Write`] on I/O failure.
    pub fn save(&self) -> Result<(), StateError> {
        self.ensure_loaded()?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| StateError::Write { path: self.path.clone(), source })?;
        }
        let records: Vec<&SyncState> = self.states.values().collect();
        let json = serde_json::to_string_pretty(&records)
            .map_err(|source| StateError::Corrupt { path: self.path.clone(), source })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|source| StateError::Write { path: tmp.clone(), source })?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|source| StateError::Write { path: self.path.clone(), source })?;
        Ok(())
    }

    /// Looks up the record for a task id.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotLoaded`] before `load()`.
    pub fn get(&self, task_id: &str) -> Result<Option<&SyncState>, StateError> {
        self.ensure_loaded()?;
        Ok(self.states.get(task_id))
    }

    /// Inserts or replaces a record.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotLoaded`] before `load()`.
    pub fn upsert(&mut self, state: SyncState) -> Result<(), StateError> {
        self.ensure_loaded()?;
        self.states.insert(state.task_id.clone(), state);
        Ok(())
    }

    /// Whether a task must be pushed to the tracker: true when it has no
    /// record, its content fingerprint changed, or it moved to another file.
    /// A file move alone still counts — the issue body embeds the source
    /// location.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotLoaded`] before `load()`.
    pub fn needs_sync(&self, task: &Task, current_hash: &str) -> Result<bool, StateError> {
        self.ensure_loaded()?;
        Ok(match self.states.get(&task.id) {
            None => true,
            Some(state) => state.last_hash != current_hash || state.file_path != task.file_path,
        })
    }

    /// Removes and returns every record whose task id is absent from
    /// `current_ids`. The caller decides what to do with the matching
    /// remote issues.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotLoaded`] before `load()`.
    pub fn cleanup_orphaned_states(
        &mut self,
        current_ids: &HashSet<String>,
    ) -> Result<Vec<SyncState>, StateError> {
        self.ensure_loaded()?;
        let orphaned_ids: Vec<String> = self
            .states
            .keys()
            .filter(|id| !current_ids.contains(*id))
            .cloned()
            .collect();
        Ok(orphaned_ids.into_iter().filter_map(|id| self.states.remove(&id)).collect())
    }

    /// Serializes the full state to `path` for backup.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotLoaded`] before `load()`, or
    /// [`StateError::Write`] on I/O failure.
    pub fn export(&self, path: &Path) -> Result<(), StateError> {
        self.ensure_loaded()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| StateError::Write { path: path.to_path_buf(), source })?;
        }
        let records: Vec<&SyncState> = self.states.values().collect();
        let json = serde_json::to_string_pretty(&records)
            .map_err(|source| StateError::Corrupt { path: path.to_path_buf(), source })?;
        std::fs::write(path, json)
            .map_err(|source| StateError::Write { path: path.to_path_buf(), source })
    }

    /// Replaces the in-memory state with the records in `path`, validating
    /// each record's shape. Malformed records are rejected, never silently
    /// dropped. The store is marked loaded; call [`save`](Self::save) to
    /// persist the imported state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Read`], [`StateError::Corrupt`], or
    /// [`StateError::InvalidRecord`].
    pub fn import(&mut self, path: &Path) -> Result<usize, StateError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| StateError::Read { path: path.to_path_buf(), source })?;
        let records: Vec<SyncState> = serde_json::from_str(&content)
            .map_err(|source| StateError::Corrupt { path: path.to_path_buf(), source })?;
        for (idx, record) in records.iter().enumerate() {
            validate_record(idx, record)?;
        }
        let count = records.len();
        self.states = records.into_iter().map(|r| (r.task_id.clone(), r)).collect();
        self.loaded = true;
        Ok(count)
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotLoaded`] before `load()`.
    pub fn len(&self) -> Result<usize, StateError> {
        self.ensure_loaded()?;
        Ok(self.states.len())
    }

    /// Whether the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotLoaded`] before `load()`.
    pub fn is_empty(&self) -> Result<bool, StateError> {
        Ok(self.len()? == 0)
    }

    fn ensure_loaded(&self) -> Result<(), StateError> {
        if self.loaded {
            Ok(())
        } else {
            Err(StateError::NotLoaded)
        }
    }
}

fn validate_record(idx: usize, record: &SyncState) -> Result<(), StateError> {
    if record.task_id.trim().is_empty() {
        return Err(StateError::InvalidRecord(format!("record {idx}: empty taskId")));
    }
    if record.remote_issue_number == 0 {
        return Err(StateError::InvalidRecord(format!(
            "record {idx} ({}): remoteIssueNumber must be positive",
            record.task_id
        )));
    }
    if record.last_hash.trim().is_empty() {
        return Err(StateError::InvalidRecord(format!(
            "record {idx} ({}): empty lastHash",
            record.task_id
        )));
    }
    if record.file_path.trim().is_empty() {
        return Err(StateError::InvalidRecord(format!(
            "record {idx} ({}): empty filePath",
            record.task_id
        )));
    }
    Ok(())
}
