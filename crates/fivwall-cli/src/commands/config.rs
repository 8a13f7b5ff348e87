use std::env;
use std::path::PathBuf;

use fivwall_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;
use crate::session::CliContext;

pub fn run_config(command: ConfigCommands, context: &CliContext) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            auth_url,
            redirect_uri,
            client_id,
            no_activate,
        } => run_config_init(
            context.profile.as_deref(),
            ProfileValues {
                auth_url,
                redirect_uri,
                google_client_id: client_id,
                state_path: context.state_path.clone(),
            },
            no_activate,
        ),
    }
}

/// Values given on the command line; `None` keeps what the profile has.
#[derive(Debug, Default)]
pub struct ProfileValues {
    pub auth_url: Option<String>,
    pub redirect_uri: Option<String>,
    pub google_client_id: Option<String>,
    pub state_path: Option<PathBuf>,
}

pub fn run_config_init(
    profile_name: Option<&str>,
    values: ProfileValues,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load()?;
    let profile_name = config.resolve_profile_name(profile_name);

    let profile = config.profile_mut_or_default(&profile_name);
    merge_profile(profile, values, |name| env::var(name).ok());
    validate_profile_urls(profile)?;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save()?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );
    println!("Run `fivwall --profile {profile_name} auth login` to enable sync.");
    Ok(())
}

/// Explicit values win, then the environment, then what the profile already had.
pub fn merge_profile(
    profile: &mut CliProfile,
    values: ProfileValues,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(value) =
        normalize_text_option(values.auth_url).or_else(|| normalize_text_option(lookup("FIVWALL_AUTH_URL")))
    {
        profile.auth_url = Some(value.trim_end_matches('/').to_string());
    }
    if let Some(value) = normalize_text_option(values.redirect_uri)
        .or_else(|| normalize_text_option(lookup("FIVWALL_REDIRECT_URI")))
    {
        profile.redirect_uri = Some(value);
    }
    if let Some(value) = normalize_text_option(values.google_client_id)
        .or_else(|| normalize_text_option(lookup("FIVWALL_GOOGLE_CLIENT_ID")))
    {
        profile.google_client_id = Some(value);
    }
    if let Some(path) = values.state_path {
        profile.state_path = Some(path);
    }
}

pub fn validate_profile_urls(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.auth_url.as_deref() {
        if !is_http_url(url) {
            return Err(CliError::Config(
                "auth_url must include http:// or https://".to_string(),
            ));
        }
    }
    if let Some(url) = profile.redirect_uri.as_deref() {
        if !is_http_url(url) {
            return Err(CliError::Config(
                "redirect_uri must include http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}
