use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::ORIGIN;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::google::{ExchangedToken, GoogleTokenBroker, RefreshedToken};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    broker: Arc<GoogleTokenBroker>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self, AppError> {
        Ok(Self {
            broker: Arc::new(GoogleTokenBroker::new(config.clone())?),
            config,
        })
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/auth/google", post(exchange_code))
        .route("/api/auth/google/refresh", post(refresh_token))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    google_configured: bool,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        google_configured: state.config.google.is_some(),
    })
}

#[derive(Debug, Deserialize)]
struct ExchangeRequest {
    code: Option<String>,
    redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: Option<String>,
}

async fn exchange_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<Json<ExchangedToken>, AppError> {
    let Ok(Json(request)) = payload else {
        return Err(AppError::bad_request("Missing or invalid authorization code"));
    };
    let code = non_empty(request.code)
        .ok_or_else(|| AppError::bad_request("Missing or invalid authorization code"))?;

    let origin = headers.get(ORIGIN).and_then(|value| value.to_str().ok());
    let redirect_uri = select_redirect_uri(
        request.redirect_uri.as_deref(),
        origin,
        &state.config.allowed_redirect_uris,
    )
    .ok_or_else(|| AppError::Config("No redirect URI configured".to_string()))?;

    let token = state.broker.exchange_code(&code, &redirect_uri).await?;
    tracing::info!(
        endpoint = "exchange",
        redirect_uri = %redirect_uri,
        refresh_token = token.refresh_token.is_some(),
        "Exchanged authorization code"
    );
    Ok(Json(token))
}

async fn refresh_token(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshedToken>, AppError> {
    let Ok(Json(request)) = payload else {
        return Err(AppError::bad_request("Missing or invalid refresh token"));
    };
    let refresh_token = non_empty(request.refresh_token)
        .ok_or_else(|| AppError::bad_request("Missing or invalid refresh token"))?;

    let token = state.broker.refresh(&refresh_token).await?;
    tracing::info!(endpoint = "refresh", expires_in = token.expires_in, "Refreshed access token");
    Ok(Json(token))
}

/// The client's redirect URI when allow-listed or equal to its origin, else the first allowed one.
pub fn select_redirect_uri(
    requested: Option<&str>,
    origin: Option<&str>,
    allowed: &[String],
) -> Option<String> {
    if let Some(requested) = requested.map(str::trim).filter(|value| !value.is_empty()) {
        if allowed.iter().any(|uri| uri == requested) || origin == Some(requested) {
            return Some(requested.to_string());
        }
        tracing::warn!(requested, "Redirect URI not allowed; using default");
    }
    allowed.first().cloned()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
