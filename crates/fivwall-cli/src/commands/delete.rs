use crate::commands::common::{open_synced_session, resolve_note};
use crate::error::CliError;
use crate::session::ResolvedProfile;

pub async fn run_delete(id: &str, resolved: &ResolvedProfile) -> Result<(), CliError> {
    let session = open_synced_session(resolved).await?;
    let note_id = resolve_note(&session.store().current().notes, id)?.id.clone();

    session.store().delete_note(&note_id)?;
    session.finish().await?;
    println!("{note_id}");
    Ok(())
}
