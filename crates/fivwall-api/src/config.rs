use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// `None` until both client id and secret are set; token routes answer 500 meanwhile
    pub google: Option<GoogleClientConfig>,
    pub google_token_url: String,
    /// Redirect URIs a client may ask for; the first one is the fallback
    pub allowed_redirect_uris: Vec<String>,
    pub http_timeout: Duration,
}

#[derive(Clone, PartialEq, Eq)]
pub struct GoogleClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for GoogleClientConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GoogleClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("google", &self.google)
            .field("google_token_url", &self.google_token_url)
            .field("allowed_redirect_uris", &self.allowed_redirect_uris)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "FIVWALL_API_BIND_ADDR", "127.0.0.1:8080");

        let google = parse_google_client(&lookup)?;

        let google_token_url =
            value_or_default(&lookup, "GOOGLE_TOKEN_URL", DEFAULT_GOOGLE_TOKEN_URL);
        if !is_http_url(&google_token_url) {
            return Err(ConfigError::Invalid(
                "GOOGLE_TOKEN_URL must start with http:// or https://".to_string(),
            ));
        }

        let allowed_redirect_uris = parse_redirect_uris(&lookup);
        if let Some(invalid) = allowed_redirect_uris.iter().find(|uri| !is_http_url(uri)) {
            return Err(ConfigError::Invalid(format!(
                "redirect URI '{invalid}' must start with http:// or https://"
            )));
        }

        let http_timeout_secs = value_or_default(&lookup, "GOOGLE_HTTP_TIMEOUT_SECS", "15")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "GOOGLE_HTTP_TIMEOUT_SECS must be an integer in [1, 120]".to_string(),
                )
            })?;
        if !(1..=120).contains(&http_timeout_secs) {
            return Err(ConfigError::Invalid(
                "GOOGLE_HTTP_TIMEOUT_SECS must be in [1, 120]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            google,
            google_token_url,
            allowed_redirect_uris,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}

fn parse_google_client(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<GoogleClientConfig>, ConfigError> {
    let client_id = optional_trimmed(&lookup, "GOOGLE_CLIENT_ID");
    let client_secret = optional_trimmed(&lookup, "GOOGLE_CLIENT_SECRET");

    match (client_id, client_secret) {
        (None, None) => Ok(None),
        (Some(client_id), Some(client_secret)) => Ok(Some(GoogleClientConfig {
            client_id,
            client_secret,
        })),
        (None, Some(_)) => Err(ConfigError::MissingVar("GOOGLE_CLIENT_ID")),
        (Some(_), None) => Err(ConfigError::MissingVar("GOOGLE_CLIENT_SECRET")),
    }
}

/// `GOOGLE_REDIRECT_URIS` (comma separated), else `APP_URL`, else localhost.
fn parse_redirect_uris(lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
    if let Some(list) = optional_trimmed(&lookup, "GOOGLE_REDIRECT_URIS") {
        let uris: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
            .map(str::to_string)
            .collect();
        if !uris.is_empty() {
            return uris;
        }
    }

    if let Some(app_url) = optional_trimmed(&lookup, "APP_URL") {
        return vec![app_url];
    }

    vec![
        "http://localhost:3000".to_string(),
        "https://localhost:3000".to_string(),
    ]
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
