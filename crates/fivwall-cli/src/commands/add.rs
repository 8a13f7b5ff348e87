use fivwall_core::models::NewNote;

use crate::commands::common::{normalize_content, open_synced_session, read_piped_stdin};
use crate::error::CliError;
use crate::session::ResolvedProfile;

pub struct AddArgs {
    pub title: Vec<String>,
    pub content: Option<String>,
    pub color: Option<String>,
    pub tags: Vec<String>,
    pub x: f64,
    pub y: f64,
}

pub async fn run_add(args: AddArgs, resolved: &ResolvedProfile) -> Result<(), CliError> {
    let piped = if args.content.is_none() {
        read_piped_stdin()?
    } else {
        None
    };
    let new_note = build_new_note(args, piped)?;

    let session = open_synced_session(resolved).await?;
    let note = session.store().add_note(new_note);
    session.finish().await?;

    println!("{}", note.id);
    Ok(())
}

pub fn build_new_note(args: AddArgs, piped_content: Option<String>) -> Result<NewNote, CliError> {
    let title = normalize_content(&args.title.join(" ")).unwrap_or_default();
    let content = args
        .content
        .as_deref()
        .and_then(normalize_content)
        .or(piped_content)
        .unwrap_or_default();
    if title.is_empty() && content.is_empty() {
        return Err(CliError::EmptyNote);
    }

    Ok(NewNote {
        title,
        content,
        color: args.color.unwrap_or_default(),
        x: args.x,
        y: args.y,
        tags: args
            .tags
            .iter()
            .filter_map(|tag| normalize_content(tag.trim_start_matches('#')))
            .collect(),
    })
}
