use fivwall_core::models::NoteUpdate;
use fivwall_core::{Note, NoteId, NoteStore};

use crate::commands::common::{normalize_content, open_synced_session, resolve_note};
use crate::error::CliError;
use crate::session::ResolvedProfile;

pub struct EditArgs {
    pub id: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub color: Option<String>,
    pub tags: Vec<String>,
    pub clear_tags: bool,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub front: bool,
}

pub async fn run_edit(args: EditArgs, resolved: &ResolvedProfile) -> Result<(), CliError> {
    let update = build_note_update(&args)?;

    let session = open_synced_session(resolved).await?;
    let note_id = resolve_note(&session.store().current().notes, &args.id)?
        .id
        .clone();
    let note = apply_edit(session.store(), &note_id, update, args.front)?;
    session.finish().await?;

    println!("{}", note.id);
    Ok(())
}

/// Fields given on the command line; an empty `--title` or `--content` clears it.
pub fn build_note_update(args: &EditArgs) -> Result<NoteUpdate, CliError> {
    let tags = if args.clear_tags {
        Some(Vec::new())
    } else if args.tags.is_empty() {
        None
    } else {
        Some(
            args.tags
                .iter()
                .filter_map(|tag| normalize_content(tag.trim_start_matches('#')))
                .collect(),
        )
    };

    let update = NoteUpdate {
        title: args.title.as_deref().map(|title| title.trim().to_string()),
        content: args.content.as_deref().map(|content| content.trim().to_string()),
        color: args.color.as_deref().and_then(normalize_content),
        x: args.x,
        y: args.y,
        tags,
    };
    if update == NoteUpdate::default() && !args.front {
        return Err(CliError::NothingToEdit);
    }
    Ok(update)
}

/// Apply `update`, then raise the note when `front` is set.
pub fn apply_edit(
    store: &NoteStore,
    note_id: &NoteId,
    update: NoteUpdate,
    front: bool,
) -> Result<Note, CliError> {
    if update != NoteUpdate::default() {
        store.update_note(note_id, update)?;
    }
    if front {
        store.bring_to_front(note_id)?;
    }
    store
        .current()
        .notes
        .into_iter()
        .find(|note| &note.id == note_id)
        .ok_or_else(|| CliError::NoteNotFound(note_id.to_string()))
}
