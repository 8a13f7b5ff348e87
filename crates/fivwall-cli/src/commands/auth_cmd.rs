use chrono::DateTime;
use fivwall_core::config::ClientConfig;
use fivwall_core::models::{Profile, TokenGrant};
use fivwall_core::sync::{FirstContactChoice, LoginOutcome, PushOutcome};

use crate::cli::{AuthCommands, PreferSide};
use crate::commands::common::{normalize_content, prompt_line};
use crate::error::CliError;
use crate::session::{ResolvedProfile, WallSession};

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const OAUTH_SCOPES: &str = "https://www.googleapis.com/auth/drive.file https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/userinfo.profile";

pub async fn run_auth(command: AuthCommands, resolved: &ResolvedProfile) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { code, prefer } => run_login(code, prefer, resolved).await,
        AuthCommands::Status => {
            match resolved.stored_credential()? {
                Some(credential) => {
                    let email = credential
                        .profile
                        .as_ref()
                        .and_then(|profile| profile.email.as_deref())
                        .unwrap_or("(no email)");
                    let expires_at = DateTime::from_timestamp_millis(credential.expires_at)
                        .map_or_else(
                            || credential.expires_at.to_string(),
                            |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                        );
                    println!(
                        "Profile '{}' is signed in as {} (access token expires {})",
                        resolved.name, email, expires_at
                    );
                }
                None => println!("Profile '{}' is not signed in.", resolved.name),
            }
            Ok(())
        }
        AuthCommands::Logout => {
            let mut session = WallSession::open(resolved)?;
            let had_credential = session.resume();
            session.logout().await;
            session.finish().await?;
            if had_credential {
                println!("Signed out profile '{}'", resolved.name);
            } else {
                println!("Profile '{}' was not signed in.", resolved.name);
            }
            Ok(())
        }
    }
}

async fn run_login(
    code: Option<String>,
    prefer: Option<PreferSide>,
    resolved: &ResolvedProfile,
) -> Result<(), CliError> {
    let client_config = resolved.profile.client_config()?;
    let code = match code.as_deref().and_then(normalize_content) {
        Some(code) => code,
        None => prompt_for_code(resolved, &client_config)?,
    };

    let mut session = WallSession::open(resolved)?;
    let backend = session.sync().tokens().backend().clone();
    let grant = backend
        .exchange_code(&code, client_config.redirect_uri.as_deref())
        .await?;
    let profile = match backend.fetch_profile(&grant.access_token).await {
        Ok(profile) => profile,
        Err(error) => {
            tracing::warn!("Could not load Google profile: {}", error);
            None
        }
    };

    let message = complete_login(&mut session, grant, profile, prefer, ask_first_contact).await?;
    session.finish().await?;
    println!("{message}");
    Ok(())
}

/// Reconcile a fresh sign-in with the remote copy.
///
/// When both sides hold notes and no side was chosen, the session is
/// signed out again and neither side is modified.
pub async fn complete_login(
    session: &mut WallSession,
    grant: TokenGrant,
    profile: Option<Profile>,
    prefer: Option<PreferSide>,
    ask: impl FnOnce(usize, usize) -> Result<Option<PreferSide>, CliError>,
) -> Result<String, CliError> {
    let email = profile
        .as_ref()
        .and_then(|profile| profile.email.clone())
        .unwrap_or_else(|| "Google account".to_string());

    let outcome = session.sync().login(grant, profile).await?;
    let note_count = session.store().note_count();
    let message = match outcome {
        LoginOutcome::Idle => format!("Signed in as {email}. Nothing to sync yet."),
        LoginOutcome::PushedLocal => {
            format!("Signed in as {email}. Uploaded {note_count} local notes.")
        }
        LoginOutcome::PulledRemote => {
            format!("Signed in as {email}. Downloaded {note_count} notes.")
        }
        LoginOutcome::Deferred => {
            session.logout().await;
            return Err(CliError::ReconcileDeferred);
        }
        LoginOutcome::FirstContact {
            local_count,
            remote_count,
        } => {
            let choice = match prefer {
                Some(choice) => Some(choice),
                None => ask(local_count, remote_count)?,
            };
            let Some(choice) = choice else {
                session.logout().await;
                return Err(CliError::FirstContactUnresolved {
                    local: local_count,
                    remote: remote_count,
                });
            };
            resolve_first_contact(session, choice, &email).await
        }
    };
    Ok(message)
}

async fn resolve_first_contact(session: &WallSession, choice: PreferSide, email: &str) -> String {
    match choice {
        PreferSide::Pull => {
            session
                .sync()
                .resolve_first_contact(FirstContactChoice::Pull)
                .await;
            format!(
                "Signed in as {email}. Replaced local notes with {} notes from Google Drive.",
                session.store().note_count()
            )
        }
        PreferSide::Push => {
            match session
                .sync()
                .resolve_first_contact(FirstContactChoice::Push)
                .await
            {
                PushOutcome::Pushed | PushOutcome::Unchanged => format!(
                    "Signed in as {email}. Overwrote Google Drive with {} local notes.",
                    session.store().note_count()
                ),
                PushOutcome::Failed | PushOutcome::Skipped => {
                    let reason = session
                        .sync()
                        .session()
                        .last_error
                        .unwrap_or_else(|| "upload did not complete".to_string());
                    format!("Signed in as {email}, but the upload failed: {reason}")
                }
            }
        }
    }
}

fn ask_first_contact(local: usize, remote: usize) -> Result<Option<PreferSide>, CliError> {
    let question = format!(
        "This device has {local} notes and Google Drive has {remote}. Keep [push] local or [pull] remote? "
    );
    Ok(prompt_line(&question)?.and_then(|answer| parse_prefer_answer(&answer)))
}

pub fn parse_prefer_answer(answer: &str) -> Option<PreferSide> {
    match answer.trim().to_lowercase().as_str() {
        "push" | "local" => Some(PreferSide::Push),
        "pull" | "remote" => Some(PreferSide::Pull),
        _ => None,
    }
}

fn prompt_for_code(
    resolved: &ResolvedProfile,
    client_config: &ClientConfig,
) -> Result<String, CliError> {
    if let Some(client_id) = resolved.profile.google_client_id.as_deref() {
        println!("Open this URL to authorize FivWall:");
        println!("{}", authorization_url(client_id, client_config)?);
    }
    prompt_line("Authorization code: ")?
        .ok_or_else(|| CliError::Config("Pass --code or run in an interactive terminal".to_string()))
}

pub fn authorization_url(client_id: &str, client_config: &ClientConfig) -> Result<String, CliError> {
    let redirect_uri = client_config
        .redirect_uri
        .as_deref()
        .unwrap_or(client_config.auth_backend_url.as_str());
    reqwest::Url::parse_with_params(
        GOOGLE_AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", OAUTH_SCOPES),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map(String::from)
    .map_err(|error| CliError::Config(format!("Invalid authorization URL: {error}")))
}
