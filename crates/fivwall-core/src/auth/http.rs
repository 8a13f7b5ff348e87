use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{AuthBackend, AuthError, AuthResult};
use crate::config::ClientConfig;
use crate::models::{Profile, RefreshedToken, TokenGrant};
use crate::util::compact_text;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// [`AuthBackend`] backed by the FivWall authorization API.
///
/// Code exchange and refresh go through the API because they need the OAuth
/// client secret. Revocation and profile lookup talk to Google directly.
#[derive(Debug, Clone)]
pub struct HttpAuthBackend {
    auth_url: String,
    revoke_url: String,
    userinfo_url: String,
    client: Client,
}

impl HttpAuthBackend {
    pub fn new(config: &ClientConfig) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|_| AuthError::InvalidConfiguration("Auth endpoints must be http(s) URLs"))?;

        Ok(Self {
            auth_url: config.auth_backend_url.trim_end_matches('/').to_string(),
            revoke_url: config.revoke_url.clone(),
            userinfo_url: config.userinfo_url.clone(),
            client: Client::builder().timeout(HTTP_TIMEOUT).build()?,
        })
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> AuthResult<TokenGrant> {
        if code.trim().is_empty() {
            return Err(AuthError::Api("Authorization code is required".to_string()));
        }

        let payload = serde_json::json!({
            "code": code.trim(),
            "redirect_uri": redirect_uri,
        });
        let response = self
            .client
            .post(format!("{}/api/auth/google", self.auth_url))
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<TokenGrant>().await?)
    }

    async fn refresh_token(&self, refresh_token: &str) -> AuthResult<RefreshedToken> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let payload = serde_json::json!({
            "refresh_token": refresh_token,
        });
        let response = self
            .client
            .post(format!("{}/api/auth/google/refresh", self.auth_url))
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<RefreshedToken>().await?)
    }

    async fn revoke_token(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .client
            .post(&self.revoke_url)
            .query(&[("token", access_token)])
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await?;
        // Revoking an already dead token is fine.
        if !(response.status().is_success() || response.status() == StatusCode::BAD_REQUEST) {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }

    async fn fetch_profile(&self, access_token: &str) -> AuthResult<Option<Profile>> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Profile lookup failed");
            return Ok(None);
        }
        Ok(Some(response.json::<Profile>().await?))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<String>,
    description: Option<String>,
    error_description: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorResponse>(body) {
        let detail = payload.description.or(payload.error_description);
        match (payload.error, detail) {
            (Some(error), Some(detail)) => {
                return format!("{}: {} ({})", error.trim(), detail.trim(), status.as_u16());
            }
            (Some(message), None) | (None, Some(message)) => {
                return format!("{} ({})", message.trim(), status.as_u16());
            }
            (None, None) => {}
        }
    }

    let excerpt = compact_text(body);
    if excerpt.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{excerpt} ({})", status.as_u16())
    }
}
