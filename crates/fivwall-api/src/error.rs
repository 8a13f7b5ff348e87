use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    /// Google refused the grant; its error code and description are passed through.
    #[error("{error}")]
    Rejected {
        error: String,
        description: Option<String>,
    },
    #[error("{0}")]
    Config(String),
    #[error("{0}")]
    External(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::External(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Rejected { .. } => StatusCode::BAD_REQUEST,
            Self::External(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), "{}", self);
        }
        let body = match self {
            Self::Rejected { error, description } => ErrorBody { error, description },
            other => ErrorBody {
                error: other.to_string(),
                description: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_variant() {
        assert_eq!(
            AppError::bad_request("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::external("x").status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::Config("x".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn rejected_body_carries_description() {
        let body = serde_json::to_value(ErrorBody {
            error: "invalid_grant".to_string(),
            description: Some("Bad Request".to_string()),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"error": "invalid_grant", "description": "Bad Request"})
        );

        let body = serde_json::to_value(ErrorBody {
            error: "Missing or invalid refresh token".to_string(),
            description: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"error": "Missing or invalid refresh token"})
        );
    }
}
