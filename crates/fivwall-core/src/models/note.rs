//! Note model

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A unique identifier for a note.
///
/// New notes get a UUID v7 (time-sortable); ids arriving through import or a
/// remote snapshot are kept verbatim, whatever their shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Create a new unique note ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A sticky note placed on the wall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    #[serde(default)]
    pub title: String,
    /// HTML content
    #[serde(default)]
    pub content: String,
    /// Hex code or palette class name
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Stacking order on the wall; higher is in front
    #[serde(default)]
    pub z_index: i64,
    /// Creation timestamp (Unix ms)
    #[serde(default)]
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    #[serde(default)]
    pub updated_at: i64,
}

impl Note {
    /// Build a note from user input, stamping id and timestamps.
    #[must_use]
    pub fn from_new(new_note: NewNote, z_index: i64, now_ms: i64) -> Self {
        Self {
            id: NoteId::new(),
            title: new_note.title,
            content: new_note.content,
            color: new_note.color,
            x: new_note.x,
            y: new_note.y,
            tags: new_note.tags,
            z_index,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Apply a partial update. Returns `true` when any field was provided.
    pub fn apply(&mut self, update: NoteUpdate, now_ms: i64) -> bool {
        let NoteUpdate {
            title,
            content,
            color,
            x,
            y,
            tags,
        } = update;
        let mut touched = false;

        if let Some(title) = title {
            self.title = title;
            touched = true;
        }
        if let Some(content) = content {
            self.content = content;
            touched = true;
        }
        if let Some(color) = color {
            self.color = color;
            touched = true;
        }
        if let Some(x) = x {
            self.x = x;
            touched = true;
        }
        if let Some(y) = y {
            self.y = y;
            touched = true;
        }
        if let Some(tags) = tags {
            self.tags = tags;
            touched = true;
        }

        if touched {
            self.updated_at = now_ms;
        }
        touched
    }

    /// First line of the title (or content when untitled), truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        let source = if self.title.trim().is_empty() {
            &self.content
        } else {
            &self.title
        };
        source
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .chars()
            .take(max_len)
            .collect()
    }
}

/// User-supplied fields for a new note
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub tags: Vec<String>,
}

/// Partial note update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub color: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub tags: Option<Vec<String>>,
}
