use chrono::Utc;
use fivwall_core::models::Credential;
use fivwall_core::sync::{
    PullOutcome, PushOutcome, StatusProjection, SyncSessionState, SyncStatus, SyncStatusView,
};

use crate::cli::SyncCommands;
use crate::commands::common::load_local_state;
use crate::error::CliError;
use crate::session::{ResolvedProfile, WallSession};

pub async fn run_sync(command: SyncCommands, resolved: &ResolvedProfile) -> Result<(), CliError> {
    match command {
        SyncCommands::Status { json } => run_sync_status(json, resolved),
        SyncCommands::Push => {
            let session = signed_in_session(resolved)?;
            let outcome = session.sync().flush().await;
            finish_and_report(session, &describe_push(outcome)).await
        }
        SyncCommands::Pull => {
            let session = signed_in_session(resolved)?;
            let outcome = session.sync().pull().await;
            let summary = describe_pull(outcome, session.store().note_count());
            finish_and_report(session, &summary).await
        }
        SyncCommands::Retry => {
            let session = signed_in_session(resolved)?;
            let outcome = StatusProjection::new(session.sync().clone()).retry().await;
            finish_and_report(session, &describe_push(outcome)).await
        }
    }
}

fn run_sync_status(as_json: bool, resolved: &ResolvedProfile) -> Result<(), CliError> {
    let file = load_local_state(resolved)?;
    let credential = resolved.stored_credential().unwrap_or_else(|error| {
        tracing::warn!("Could not read stored credential: {}", error);
        None
    });
    let view = SyncStatusView::from(&offline_session_state(
        credential.as_ref(),
        file.last_synced_at,
    ));

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("Profile:  {}", resolved.name);
    if let Some(email) = view.email.as_deref() {
        println!("Account:  {email}");
    }
    println!("Status:   {}", view.label(Utc::now().timestamp_millis()));
    println!("Notes:    {}", file.state.notes.len());
    println!("State:    {}", resolved.state_path.display());
    Ok(())
}

/// Session state as far as it can be known without the network.
pub fn offline_session_state(
    credential: Option<&Credential>,
    last_synced_at: Option<i64>,
) -> SyncSessionState {
    let Some(credential) = credential else {
        return SyncSessionState::default();
    };
    SyncSessionState {
        signed_in: true,
        profile: credential.profile.clone(),
        status: if last_synced_at.is_some() {
            SyncStatus::Synced
        } else {
            SyncStatus::Idle
        },
        last_synced_at,
        ..SyncSessionState::default()
    }
}

/// Signed-in session that has not talked to the remote yet.
fn signed_in_session(resolved: &ResolvedProfile) -> Result<WallSession, CliError> {
    let session = WallSession::open(resolved)?;
    if session.resume() {
        Ok(session)
    } else {
        Err(CliError::NotSignedIn)
    }
}

async fn finish_and_report(session: WallSession, summary: &str) -> Result<(), CliError> {
    let state = session.finish().await?;
    let view = SyncStatusView::from(&state);
    if view.status == SyncStatus::Error {
        return Err(CliError::SyncFailed(view.label(Utc::now().timestamp_millis())));
    }
    println!("{summary}");
    println!("{}", view.label(Utc::now().timestamp_millis()));
    Ok(())
}

pub const fn describe_push(outcome: PushOutcome) -> &'static str {
    match outcome {
        PushOutcome::Pushed => "Uploaded local notes to Google Drive.",
        PushOutcome::Unchanged => "Nothing new to upload.",
        PushOutcome::Failed => "Upload failed.",
        PushOutcome::Skipped => "Nothing to upload.",
    }
}

pub fn describe_pull(outcome: PullOutcome, note_count: usize) -> String {
    match outcome {
        PullOutcome::Replaced => format!("Downloaded {note_count} notes from Google Drive."),
        PullOutcome::KeptLocal => "Local notes are newer than Google Drive.".to_string(),
        PullOutcome::RemoteAbsent => "Google Drive has no FivWall data yet.".to_string(),
        PullOutcome::Failed => "Could not reach Google Drive; local notes kept.".to_string(),
        PullOutcome::Skipped => "Pull skipped.".to_string(),
    }
}
