//! Unified error handling for the RLS gate
//!
//! Identity and organization lookups raise typed errors; only the request
//! middleware turns them into HTTP responses through [`AppError::envelope`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Organization not found: {0}")]
    OrganizationNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Database or context failures raised while building an RLS decision
    #[error("RLS error ({code}): {message}")]
    Rls { code: &'static str, message: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn database(message: impl Into<String>) -> Self {
        AppError::Rls {
            code: "DATABASE_ERROR",
            message: message.into(),
        }
    }

    pub fn context(message: impl Into<String>) -> Self {
        AppError::Rls {
            code: "CONTEXT_ERROR",
            message: message.into(),
        }
    }

    /// Stable machine-readable code for the calling UI
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::OrganizationNotFound(_) => "ORGANIZATION_NOT_FOUND",
            AppError::UserNotFound(_) => "USER_NOT_FOUND",
            AppError::Rls { code, .. } => *code,
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::RateLimited => "RATE_LIMIT_EXCEEDED",
            AppError::Internal(_) => "AUTH_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::OrganizationNotFound(_) | AppError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Rls { .. } | AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Build the JSON error envelope. Unclassified errors never leak their message.
    pub fn envelope(&self) -> ErrorEnvelope {
        let error = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                "Authentication failed".to_string()
            }
            AppError::Rls { message, .. } => message.clone(),
            AppError::Unauthorized(msg)
            | AppError::OrganizationNotFound(msg)
            | AppError::UserNotFound(msg)
            | AppError::PermissionDenied(msg) => msg.clone(),
            AppError::RateLimited => "Rate limit exceeded".to_string(),
        };

        ErrorEnvelope::new(error, self.code(), self.status_code())
    }
}

/// Standard error body returned on every authorization failure
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub code: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>, code: impl Into<String>, status: StatusCode) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            status_code: status.as_u16(),
            details: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::UNAUTHORIZED);
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.envelope().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::Unauthorized("no token".into()), 401, "UNAUTHORIZED")]
    #[case(AppError::OrganizationNotFound("none".into()), 404, "ORGANIZATION_NOT_FOUND")]
    #[case(AppError::UserNotFound("gone".into()), 404, "USER_NOT_FOUND")]
    #[case(AppError::database("boom"), 403, "DATABASE_ERROR")]
    #[case(AppError::PermissionDenied("contacts".into()), 403, "PERMISSION_DENIED")]
    #[case(AppError::RateLimited, 429, "RATE_LIMIT_EXCEEDED")]
    #[case(AppError::Internal(anyhow::anyhow!("?")), 401, "AUTH_ERROR")]
    fn test_status_and_code_mapping(
        #[case] err: AppError,
        #[case] status: u16,
        #[case] code: &str,
    ) {
        assert_eq!(err.status_code().as_u16(), status);
        assert_eq!(err.code(), code);
        let envelope = err.envelope();
        assert_eq!(envelope.status_code, status);
        assert_eq!(envelope.code, code);
    }

    #[test]
    fn test_internal_error_message_is_generic() {
        let err: AppError = anyhow::anyhow!("connection string leaked").into();
        let envelope = err.envelope();
        assert_eq!(envelope.error, "Authentication failed");
    }

    #[test]
    fn test_envelope_serialization() {
        let envelope = ErrorEnvelope::new("Access forbidden", "RLS_ERROR", StatusCode::FORBIDDEN)
            .with_details(serde_json::json!("Insufficient permissions"));
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["error"], "Access forbidden");
        assert_eq!(value["code"], "RLS_ERROR");
        assert_eq!(value["statusCode"], 403);
        assert_eq!(value["details"], "Insufficient permissions");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_envelope_omits_empty_details() {
        let envelope = ErrorEnvelope::new("x", "Y", StatusCode::UNAUTHORIZED);
        let value = serde_json::to_value(&envelope).unwrap();
        assert!(value.get("details").is_none());
    }

    #[tokio::test]
    async fn test_into_response_uses_mapped_status() {
        let response = AppError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["code"], "RATE_LIMIT_EXCEEDED");
    }
}
