use std::io::{self, BufRead, IsTerminal, Read, Write};

use chrono::Utc;
use fivwall_core::state::{LocalState, StateFile};
use fivwall_core::{Note, NoteId};
use serde::Serialize;

use crate::error::CliError;
use crate::session::{ResolvedProfile, WallSession};

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub content: String,
    pub color: String,
    pub tags: Vec<String>,
    pub z_index: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
}

/// Read the state file without starting the sync engine.
pub fn load_local_state(resolved: &ResolvedProfile) -> Result<StateFile, CliError> {
    Ok(StateFile::load_from_path(&resolved.state_path)?)
}

/// Open the wall with sync resumed when a credential is stored.
pub async fn open_synced_session(resolved: &ResolvedProfile) -> Result<WallSession, CliError> {
    let session = WallSession::open(resolved)?;
    if session.restore().await {
        tracing::debug!(profile = %resolved.name, "Sync session resumed");
    }
    Ok(session)
}

/// Notes ordered topmost first, filtered by tag and free text.
pub fn filter_notes(
    state: &LocalState,
    tag: Option<&str>,
    query: Option<&str>,
    limit: usize,
) -> Vec<Note> {
    let tag = tag.map(|tag| tag.trim().trim_start_matches('#').to_lowercase());
    let query = query
        .map(|query| query.trim().to_lowercase())
        .filter(|query| !query.is_empty());

    let mut notes = state
        .notes
        .iter()
        .filter(|note| {
            tag.as_deref().is_none_or(|tag| {
                note.tags.iter().any(|candidate| candidate.to_lowercase() == tag)
            })
        })
        .filter(|note| query.as_deref().is_none_or(|query| note_matches(note, query)))
        .cloned()
        .collect::<Vec<_>>();
    notes.sort_by(|a, b| b.z_index.cmp(&a.z_index));
    notes.truncate(limit);
    notes
}

fn note_matches(note: &Note, query: &str) -> bool {
    note.title.to_lowercase().contains(query)
        || note.content.to_lowercase().contains(query)
        || note.tags.iter().any(|tag| tag.to_lowercase().contains(query))
}

/// Find a note by full id or unique id prefix.
pub fn resolve_note<'a>(notes: &'a [Note], query: &str) -> Result<&'a Note, CliError> {
    let query = normalize_note_identifier(query)?;
    let exact = NoteId::from(query.as_str());
    if let Some(note) = notes.iter().find(|note| note.id == exact) {
        return Ok(note);
    }

    let matches = notes
        .iter()
        .filter(|note| note.id.as_str().starts_with(&query))
        .collect::<Vec<_>>();
    match matches.as_slice() {
        [] => Err(CliError::NoteNotFound(query)),
        [note] => Ok(note),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|note| short_id(note))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let short_id = short_id(note);
            let preview = note_preview(note, 40);
            let relative_time = format_relative_time(note.updated_at, now_ms);
            let tags = render_tags(note);

            if tags.is_empty() {
                format!("{short_id:<13}  {preview:<40}  {relative_time}")
            } else {
                format!("{short_id:<13}  {preview:<40}  {relative_time:<10}  {tags}")
            }
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        preview: note_preview(note, 80),
        content: note.content.clone(),
        color: note.color.clone(),
        tags: note.tags.clone(),
        z_index: note.z_index,
        created_at: note.created_at,
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at, now_ms),
    }
}

fn short_id(note: &Note) -> String {
    note.id.as_str().chars().take(13).collect()
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let collapsed = note
        .title_preview(usize::MAX)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let mut truncated = collapsed
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn render_tags(note: &Note) -> String {
    note.tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    normalize_content(query).ok_or(CliError::EmptySearchQuery)
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    normalize_content(id).ok_or(CliError::EmptyNoteId)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

/// Ask a question on the terminal. `None` when stdin is not interactive.
pub fn prompt_line(question: &str) -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Ok(None);
    }

    print!("{question}");
    io::stdout().flush()?;
    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    Ok(normalize_content(&answer))
}
