use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use utoipa::ToSchema;

/// Whether error responses may carry internal detail. Enabled for
/// development builds only, set once at startup from the loaded config.
static EXPOSE_ERROR_DETAILS: AtomicBool = AtomicBool::new(false);

pub fn set_error_detail_exposure(enabled: bool) {
    EXPOSE_ERROR_DETAILS.store(enabled, Ordering::Relaxed);
}

fn expose_details() -> bool {
    EXPOSE_ERROR_DETAILS.load(Ordering::Relaxed)
}

/// Standard JSON error body returned by every handler
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "message": "Amount mismatch: expected 150.00, received 148.00",
    "details": null,
    "timestamp": "2025-11-02T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Bad Request", "Service Unavailable")
    #[schema(example = "Bad Request")]
    pub error: String,
    /// Human-readable error description
    #[schema(example = "Amount mismatch: expected 150.00, received 148.00")]
    pub message: String,
    /// Internal detail, populated in development builds only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Remediation hint for payment declines, localized
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "Check your card balance or try a different card")]
    pub suggestion: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    #[schema(example = "2025-11-02T10:30:00.000Z")]
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Amount mismatch: expected {expected}, received {submitted}")]
    AmountMismatch {
        expected: rust_decimal::Decimal,
        submitted: rust_decimal::Decimal,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment declined: {message}")]
    PaymentDeclined {
        code: String,
        message: String,
        suggestion: String,
    },

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    /// Wrap a string-based database error.
    pub fn db_error(message: impl Into<String>) -> Self {
        ServiceError::DatabaseError(DbErr::Custom(message.into()))
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // A failing database means the attempt is retryable infra
            // trouble, not a server bug
            Self::DatabaseError(_) | Self::DatabaseUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::AmountMismatch { .. }
            | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidStatusTransition { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PaymentDeclined { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::SerializationError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the message suitable for HTTP responses.
    /// Infra errors return generic messages to avoid leaking internals.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) | Self::DatabaseUnavailable(_) => {
                "Service temporarily unavailable, please try again later".to_string()
            }
            Self::SerializationError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            Self::ExternalServiceError(_) => {
                "Payment provider temporarily unavailable, please try again later".to_string()
            }
            Self::RateLimitExceeded { .. } => "Rate limit exceeded".to_string(),
            Self::PaymentDeclined { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }

    /// Internal detail attached to the response in development builds only.
    fn response_details(&self) -> Option<String> {
        if !expose_details() {
            return None;
        }
        match self {
            Self::DatabaseError(err) => Some(err.to_string()),
            Self::DatabaseUnavailable(msg)
            | Self::ExternalServiceError(msg)
            | Self::SerializationError(msg)
            | Self::InternalError(msg) => Some(msg.clone()),
            Self::PaymentDeclined { code, .. } => Some(format!("provider error code {}", code)),
            Self::Other(err) => Some(format!("{:#}", err)),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let suggestion = match &self {
            Self::PaymentDeclined { suggestion, .. } => Some(suggestion.clone()),
            _ => None,
        };

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.response_details(),
            suggestion,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let mut response = (status, Json(body)).into_response();

        if let Self::RateLimitExceeded { retry_after_secs } = self {
            if let Ok(value) = header::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
