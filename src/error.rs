// HTTP API Error Types
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::pipeline::validation::FieldViolation;

/// Every failure a pipeline stage or route callback can raise.
///
/// Stages return these as plain values; the single mapping to a transport
/// status happens in [`ApiError::into_envelope`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 401 Unauthorized
    #[error("{0}")]
    Unauthorized(String),

    // 403 Forbidden
    #[error("{0}")]
    Forbidden(String),

    // 400 Bad Request
    #[error("{message}")]
    Validation {
        message: String,
        violations: Vec<FieldViolation>,
    },

    // 429 Too Many Requests
    #[error("Rate limit exceeded for policy '{policy}'")]
    RateLimited { policy: String, retry_after: Duration },

    // 404 Not Found
    #[error("{0}")]
    NotFound(String),

    // 500 Internal Server Error
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Normalized JSON shape of every failed call.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

const INTERNAL_MESSAGE: &str = "An internal error occurred while processing the request";

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        let message = match violations.len() {
            1 => "Request validation failed on 1 field".to_string(),
            n => format!("Request validation failed on {} fields", n),
        };
        ApiError::Validation { message, violations }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(anyhow::anyhow!(message.into()))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    /// Seconds a client should wait, rounded up so a sub-second wait never reads as 0.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ApiError::RateLimited { retry_after, .. } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(secs.max(1))
            }
            _ => None,
        }
    }

    /// Maps the failure to its status and client-safe envelope.
    ///
    /// Internal failures are logged here with their full chain; the client
    /// only ever sees [`INTERNAL_MESSAGE`].
    pub fn into_envelope(self) -> (StatusCode, ErrorEnvelope) {
        let status = self.status_code();
        let code = Some(self.error_code());

        let envelope = match &self {
            ApiError::Validation { message, violations } => ErrorEnvelope {
                error: message.clone(),
                code,
                details: Some(json!({ "violations": violations })),
            },
            ApiError::RateLimited { policy, .. } => ErrorEnvelope {
                error: self.to_string(),
                code,
                details: Some(json!({
                    "policy": policy,
                    "retry_after_seconds": self.retry_after_secs(),
                })),
            },
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "Unhandled failure while processing request");
                ErrorEnvelope {
                    error: INTERNAL_MESSAGE.to_string(),
                    code,
                    details: None,
                }
            }
            ApiError::Unauthorized(message) | ApiError::Forbidden(message) | ApiError::NotFound(message) => {
                ErrorEnvelope {
                    error: message.clone(),
                    code,
                    details: None,
                }
            }
        };

        (status, envelope)
    }
}

// Convert other error types to ApiError
impl From<crate::services::ServiceError> for ApiError {
    fn from(err: crate::services::ServiceError) -> Self {
        match err {
            crate::services::ServiceError::NotFound(msg) => ApiError::not_found(msg),
            crate::services::ServiceError::Unavailable(e) => ApiError::Internal(e.context("domain service unavailable")),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = self.retry_after_secs();
        let (status, envelope) = self.into_envelope();
        let mut response = (status, Json(envelope)).into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::validation(vec![]).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::internal("x").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let limited = ApiError::RateLimited {
            policy: "heavy".into(),
            retry_after: Duration::from_secs(3),
        };
        assert_eq!(limited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_internal_detail_is_withheld() {
        let err = ApiError::Internal(anyhow::anyhow!("connection refused to 10.0.0.4:5432"));
        let (status, envelope) = err.into_envelope();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.code, Some("INTERNAL"));
        assert!(!envelope.error.contains("10.0.0.4"));
        assert!(envelope.details.is_none());
    }

    #[test]
    fn test_validation_envelope_lists_violations() {
        let err = ApiError::validation(vec![
            FieldViolation::new("recipient_email", "required", "Field is required"),
            FieldViolation::new("message", "length", "Too long"),
        ]);
        let (_, envelope) = err.into_envelope();
        let body = serde_json::to_value(&envelope).unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["details"]["violations"].as_array().unwrap().len(), 2);
        assert_eq!(body["details"]["violations"][0]["field"], "recipient_email");
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let err = ApiError::RateLimited {
            policy: "general".into(),
            retry_after: Duration::from_millis(1500),
        };
        assert_eq!(err.retry_after_secs(), Some(2));

        let err = ApiError::RateLimited {
            policy: "general".into(),
            retry_after: Duration::ZERO,
        };
        assert_eq!(err.retry_after_secs(), Some(1));
    }

    #[test]
    fn test_rate_limited_response_has_retry_after_header() {
        let response = ApiError::RateLimited {
            policy: "heavy".into(),
            retry_after: Duration::from_secs(42),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
