use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, GoogleClientConfig};
use crate::error::AppError;

const DEFAULT_EXPIRES_IN_SECS: i64 = 3_600;

/// Exchanges authorization codes and refresh tokens against Google's token endpoint.
///
/// The client secret never leaves this process; callers only see the tokens.
#[derive(Debug, Clone)]
pub struct GoogleTokenBroker {
    client: reqwest::Client,
    config: Arc<AppConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

impl GoogleTokenBroker {
    pub fn new(config: Arc<AppConfig>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|error| {
                AppError::internal(format!("Failed to build HTTP client: {}", sanitize(&error)))
            })?;
        Ok(Self { client, config })
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ExchangedToken, AppError> {
        let client = self.client_config()?;
        let payload = self
            .request_token(
                &[
                    ("code", code),
                    ("client_id", client.client_id.as_str()),
                    ("client_secret", client.client_secret.as_str()),
                    ("redirect_uri", redirect_uri),
                    ("grant_type", "authorization_code"),
                ],
                "Token exchange failed",
            )
            .await?;

        let access_token = access_token_of(&payload)?;
        Ok(ExchangedToken {
            access_token,
            refresh_token: payload.refresh_token.filter(|value| !value.is_empty()),
            expires_in: payload.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, AppError> {
        let client = self.client_config()?;
        let payload = self
            .request_token(
                &[
                    ("refresh_token", refresh_token),
                    ("client_id", client.client_id.as_str()),
                    ("client_secret", client.client_secret.as_str()),
                    ("grant_type", "refresh_token"),
                ],
                "Token refresh failed",
            )
            .await?;

        Ok(RefreshedToken {
            access_token: access_token_of(&payload)?,
            expires_in: payload.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        })
    }

    fn client_config(&self) -> Result<&GoogleClientConfig, AppError> {
        self.config
            .google
            .as_ref()
            .ok_or_else(|| AppError::Config("Google OAuth not configured".to_string()))
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
        fallback_error: &str,
    ) -> Result<GoogleTokenResponse, AppError> {
        let response = self
            .client
            .post(&self.config.google_token_url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|error| {
                AppError::external(format!("Google token request failed: {}", sanitize(&error)))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let payload = serde_json::from_str::<GoogleTokenResponse>(&body).ok();

        if !status.is_success() {
            let payload = payload.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                error = payload.error.as_deref().unwrap_or("none"),
                body = %compact_body(&body),
                "Google rejected token request"
            );
            return Err(AppError::Rejected {
                error: payload
                    .error
                    .unwrap_or_else(|| fallback_error.to_string()),
                description: payload.error_description,
            });
        }

        payload.ok_or_else(|| {
            AppError::external(format!(
                "Google token response was not JSON: {}",
                compact_body(&body)
            ))
        })
    }
}

fn access_token_of(payload: &GoogleTokenResponse) -> Result<String, AppError> {
    payload
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::internal("No access token in response"))
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}

fn compact_body(body: &str) -> String {
    body.trim().chars().take(180).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_access_token_is_internal_error() {
        let payload = GoogleTokenResponse {
            access_token: Some("  ".to_string()),
            ..GoogleTokenResponse::default()
        };
        let err = access_token_of(&payload).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(err.to_string(), "No access token in response");
    }

    #[test]
    fn exchanged_token_serializes_null_refresh_token() {
        let token = ExchangedToken {
            access_token: "at".to_string(),
            refresh_token: None,
            expires_in: 3_600,
        };
        assert_eq!(
            serde_json::to_value(token).unwrap(),
            serde_json::json!({"access_token": "at", "refresh_token": null, "expires_in": 3600})
        );
    }

    #[test]
    fn compact_body_truncates() {
        let body = format!("  {}  ", "x".repeat(500));
        assert_eq!(compact_body(&body).len(), 180);
    }
}
