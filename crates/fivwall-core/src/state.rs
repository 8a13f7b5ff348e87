//! Local note store with change notification.
//!
//! The store is the single owner of the wall's persisted state. Every mutation
//! publishes the new state on a `watch` channel, which is what the sync
//! orchestrator subscribes to.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::models::{fingerprint, NewNote, Note, NoteId, NoteUpdate, Snapshot};
use crate::util::unix_millis_now;
use crate::{Error, Result};

const MAX_RECENT_SEARCHES: usize = 5;
const MAX_MERGED_RECENT_SEARCHES: usize = 10;

/// Synchronized portion of the application state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalState {
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub recent_searches: Vec<String>,
}

impl LocalState {
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.notes, &self.recent_searches)
    }

    #[must_use]
    pub fn to_snapshot(&self, timestamp: i64) -> Snapshot {
        Snapshot::new(self.notes.clone(), self.recent_searches.clone(), timestamp)
    }
}

impl From<Snapshot> for LocalState {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            notes: snapshot.notes,
            recent_searches: snapshot.recent_searches,
        }
    }
}

/// How imported notes combine with the existing wall.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportMode {
    /// Discard existing notes and searches
    Replace,
    /// Keep existing notes; colliding ids are regenerated
    Append,
}

/// Cheaply cloneable handle to the local note state.
#[derive(Clone)]
pub struct NoteStore {
    state: Arc<watch::Sender<LocalState>>,
}

impl Default for NoteStore {
    fn default() -> Self {
        Self::new(LocalState::default())
    }
}

impl NoteStore {
    #[must_use]
    pub fn new(initial: LocalState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            state: Arc::new(sender),
        }
    }

    /// Clone of the current state.
    pub fn current(&self) -> LocalState {
        self.state.borrow().clone()
    }

    pub fn note_count(&self) -> usize {
        self.state.borrow().notes.len()
    }

    /// Fingerprint of the current state without cloning it.
    pub fn fingerprint(&self) -> String {
        self.state.borrow().fingerprint()
    }

    /// Subscribe to change notifications; fires after each mutation.
    pub fn subscribe(&self) -> watch::Receiver<LocalState> {
        self.state.subscribe()
    }

    pub fn add_note(&self, new_note: NewNote) -> Note {
        let mut note = Note::from_new(new_note, 0, unix_millis_now());
        self.state.send_modify(|state| {
            note.z_index = i64::try_from(state.notes.len()).unwrap_or(i64::MAX - 1) + 1;
            state.notes.push(note.clone());
        });
        tracing::debug!(note_id = %note.id, "Added note");
        note
    }

    pub fn update_note(&self, id: &NoteId, update: NoteUpdate) -> Result<Note> {
        let now = unix_millis_now();
        let mut updated = None;
        self.state.send_if_modified(|state| {
            let Some(note) = state.notes.iter_mut().find(|note| &note.id == id) else {
                return false;
            };
            let touched = note.apply(update, now);
            updated = Some(note.clone());
            touched
        });
        updated.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub fn delete_note(&self, id: &NoteId) -> Result<()> {
        let removed = self.state.send_if_modified(|state| {
            let before = state.notes.len();
            state.notes.retain(|note| &note.id != id);
            state.notes.len() != before
        });
        if removed {
            Ok(())
        } else {
            Err(Error::NotFound(id.to_string()))
        }
    }

    /// Raise a note above every other note on the wall.
    pub fn bring_to_front(&self, id: &NoteId) -> Result<()> {
        let found = self.state.send_if_modified(|state| {
            let max_z = state
                .notes
                .iter()
                .map(|note| note.z_index)
                .max()
                .unwrap_or(0)
                .max(0);
            match state.notes.iter_mut().find(|note| &note.id == id) {
                Some(note) => {
                    note.z_index = max_z + 1;
                    true
                }
                None => false,
            }
        });
        if found {
            Ok(())
        } else {
            Err(Error::NotFound(id.to_string()))
        }
    }

    /// Record a search query, most recent first, without duplicates.
    pub fn add_recent_search(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        self.state.send_modify(|state| {
            state.recent_searches.retain(|existing| existing != query);
            state.recent_searches.insert(0, query.to_string());
            state.recent_searches.truncate(MAX_RECENT_SEARCHES);
        });
    }

    pub fn clear_recent_searches(&self) {
        self.state.send_modify(|state| state.recent_searches.clear());
    }

    /// Replace the whole state, e.g. with a pulled remote snapshot.
    pub fn replace(&self, state: LocalState) {
        self.state.send_replace(state);
    }

    pub fn clear_all(&self) {
        self.state.send_replace(LocalState::default());
    }

    /// Import an exported wall. Returns the number of imported notes.
    ///
    /// A payload without a usable `notes` array is rejected and leaves the
    /// current state untouched.
    pub fn import_json(&self, raw: &str, mode: ImportMode) -> Result<usize> {
        let imported = Snapshot::from_remote_bytes(raw.as_bytes(), unix_millis_now())
            .ok_or_else(|| {
                Error::InvalidInput("Invalid data format: expected a notes array".to_string())
            })?;
        let count = imported.notes.len();

        match mode {
            ImportMode::Replace => self.replace(imported.into()),
            ImportMode::Append => self.state.send_modify(|state| append_import(state, imported)),
        }

        tracing::info!(count, ?mode, "Imported notes");
        Ok(count)
    }

    /// Pretty-printed snapshot suitable for backup files.
    pub fn export_json(&self) -> Result<String> {
        let snapshot = self.current().to_snapshot(unix_millis_now());
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }
}

fn append_import(state: &mut LocalState, imported: Snapshot) {
    let mut existing_ids: HashSet<NoteId> =
        state.notes.iter().map(|note| note.id.clone()).collect();
    let offset = i64::try_from(state.notes.len()).unwrap_or(i64::MAX / 2);

    for mut note in imported.notes {
        if existing_ids.contains(&note.id) {
            note.id = NoteId::new();
        }
        existing_ids.insert(note.id.clone());
        note.z_index = offset.saturating_add(note.z_index);
        state.notes.push(note);
    }

    let mut seen = HashSet::new();
    let merged = state
        .recent_searches
        .iter()
        .chain(imported.recent_searches.iter())
        .filter(|query| seen.insert((*query).clone()))
        .take(MAX_MERGED_RECENT_SEARCHES)
        .cloned()
        .collect();
    state.recent_searches = merged;
}

/// On-disk form of the local state plus the last successful sync time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    #[serde(flatten)]
    pub state: LocalState,
    #[serde(default)]
    pub last_synced_at: Option<i64>,
}

impl StateFile {
    /// Load from `path`; a missing file yields an empty wall.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write via a sibling temp file so a crash never leaves a torn file.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, serialized)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }
}
