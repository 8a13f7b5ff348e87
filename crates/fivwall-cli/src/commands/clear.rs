use crate::commands::common::{open_synced_session, prompt_line};
use crate::error::CliError;
use crate::session::ResolvedProfile;

pub async fn run_clear(yes: bool, resolved: &ResolvedProfile) -> Result<(), CliError> {
    let session = open_synced_session(resolved).await?;
    let count = session.store().note_count();

    if !yes {
        let question = format!("Delete all {count} notes and recent searches? [y/N] ");
        let confirmed = prompt_line(&question)?.is_some_and(|answer| is_confirmation(&answer));
        if !confirmed {
            session.finish().await?;
            return Err(CliError::ClearNotConfirmed);
        }
    }

    session.store().clear_all();
    session.finish().await?;
    println!("Cleared {count} notes.");
    Ok(())
}

pub fn is_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
