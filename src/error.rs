//! Caller-facing error taxonomy and its HTTP rendering.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::TokenError;
use crate::db::StoreError;
use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("{0}")]
    Authentication(String),
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Access denied")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Too many requests")]
    RateLimitExceeded { retry_after_secs: u64 },
    #[error("Model unavailable: {0}")]
    ModelUnavailable(LlmError),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: String,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Authentication(_) => "AUTH_ERROR",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            AppError::StoreUnavailable(_) => "INTERNAL_ERROR",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let (message, details) = match self {
            AppError::Validation { message, details } => (message.clone(), details.clone()),
            AppError::StoreUnavailable(cause) => (
                "Internal server error".to_string(),
                // Internal causes only leave the process in development builds.
                cfg!(debug_assertions).then(|| serde_json::json!({ "cause": cause })),
            ),
            AppError::ModelUnavailable(_) => {
                ("The assistant is temporarily unavailable".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        ErrorEnvelope {
            error: message,
            code: self.code(),
            details,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) | AppError::TokenExpired | AppError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::StoreUnavailable(cause) = self {
            error!(%cause, "Store failure while handling request");
        }

        let mut response = HttpResponse::build(self.status_code());
        if let AppError::TokenExpired | AppError::InvalidToken | AppError::Authentication(_) = self {
            response.insert_header(("WWW-Authenticate", "Bearer"));
        }
        if let AppError::RateLimitExceeded { retry_after_secs } = self {
            response.insert_header(("Retry-After", retry_after_secs.to_string()));
        }
        response.json(self.envelope())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SessionMissing(_) => AppError::NotFound("Session".to_string()),
            StoreError::Duplicate(id) => AppError::Conflict(format!("Session {} already exists", id)),
            StoreError::Unavailable(cause) => AppError::StoreUnavailable(cause),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Malformed(_)
            | TokenError::BadSignature
            | TokenError::UnsupportedAlgorithm(_)
            | TokenError::LifetimeOutOfRange => AppError::InvalidToken,
        }
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        AppError::ModelUnavailable(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::validation("bad").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("Session".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("dup".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::RateLimitExceeded { retry_after_secs: 3 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::StoreUnavailable("disk".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_failure_does_not_leak_cause_in_message() {
        let envelope = AppError::StoreUnavailable("IO Error: disk full".into()).envelope();
        assert_eq!(envelope.code, "INTERNAL_ERROR");
        assert_eq!(envelope.error, "Internal server error");
    }

    #[actix_web::test]
    async fn error_response_uses_uniform_envelope() {
        let response = AppError::NotFound("Session".into()).error_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["error"], "Session not found");
        assert!(json.get("details").is_none());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn token_errors_map_to_distinct_codes() {
        assert_eq!(AppError::from(TokenError::Expired).code(), "TOKEN_EXPIRED");
        assert_eq!(AppError::from(TokenError::BadSignature).code(), "INVALID_TOKEN");
    }
}
