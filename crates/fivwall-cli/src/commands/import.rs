use std::path::Path;

use fivwall_core::state::ImportMode;
use fivwall_core::NoteStore;

use crate::cli::ImportModeArg;
use crate::commands::common::open_synced_session;
use crate::error::CliError;
use crate::session::ResolvedProfile;

pub async fn run_import(
    path: &Path,
    mode: Option<ImportModeArg>,
    resolved: &ResolvedProfile,
) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(path)?;
    let session = open_synced_session(resolved).await?;
    let count = import_into(session.store(), &raw, mode)?;
    session.finish().await?;
    println!("Imported {count} notes from {}", path.display());
    Ok(())
}

/// An empty wall is simply replaced; a non-empty one needs an explicit mode.
pub fn import_into(
    store: &NoteStore,
    raw: &str,
    mode: Option<ImportModeArg>,
) -> Result<usize, CliError> {
    let mode = match mode {
        Some(ImportModeArg::Replace) => ImportMode::Replace,
        Some(ImportModeArg::Append) => ImportMode::Append,
        None if store.note_count() == 0 => ImportMode::Replace,
        None => return Err(CliError::ImportModeRequired(store.note_count())),
    };
    Ok(store.import_json(raw, mode)?)
}
