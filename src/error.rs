//! Error handling
//!
//! Every failure a handler or the auth gate can produce maps to one
//! `AppError` variant, and every `AppError` renders the same JSON envelope:
//!
//! ```json
//! { "success": false, "message": "...", "code": "...", "errors": [...] }
//! ```
//!
//! Store failures are logged with their detail and rendered with a generic
//! message so nothing about the database leaks to the client.

use actix_web::{error::JsonPayloadError, error::ResponseError, http::StatusCode, HttpRequest, HttpResponse};
use thiserror::Error;

use crate::validators::{FieldError, ValidationErrors};

/// Why a request failed the auth gate
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized, you are not logged in")]
    MissingToken,
    #[error("Unauthorized, token expired or invalid")]
    InvalidSignature,
    #[error("Unauthorized, token expired or invalid")]
    Expired,
    #[error("Unauthorized, token expired or invalid")]
    Malformed,
    #[error("Unauthorized, token is revoked")]
    Revoked,
    #[error("Request Forbidden")]
    InsufficientRole,
}

impl AuthError {
    /// Stable reason tag used in log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "expired",
            AuthError::Malformed => "malformed",
            AuthError::Revoked => "revoked",
            AuthError::InsufficientRole => "insufficient_role",
        }
    }

    /// Whether the presented token is dead and the session cookie must go.
    pub fn clears_cookie(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidSignature | AuthError::Expired | AuthError::Malformed | AuthError::Revoked
        )
    }
}

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate entry: {0}")]
    UniqueViolation(String),
    #[error("Store operation timed out")]
    Timeout,
    #[error("Database unavailable: {0}")]
    Unavailable(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::CorruptRow(err.to_string())
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

/// Central error type for handlers and middleware
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid Credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Gone(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::Validation(err)
    }
}

/// Error envelope returned to clients
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: &'static str,
    pub error_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Auth(AuthError::MissingToken) => "UNAUTHORIZED",
            AppError::Auth(AuthError::Revoked) => "TOKEN_REVOKED",
            AppError::Auth(AuthError::InsufficientRole) => "FORBIDDEN",
            AppError::Auth(_) => "TOKEN_INVALID",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Gone(_) => "GONE",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Store(StoreError::Timeout) | AppError::Store(StoreError::Unavailable(_)) => {
                "SERVICE_UNAVAILABLE"
            }
            AppError::Store(_) => "DATABASE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message that is safe to show to the client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Store(StoreError::Timeout) | AppError::Store(StoreError::Unavailable(_)) => {
                "Service temporarily unavailable".to_string()
            }
            AppError::Store(_) | AppError::Config(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn to_response_body(&self, error_id: &str) -> ErrorResponse {
        let errors = match self {
            AppError::Validation(v) if !v.errors.is_empty() => Some(v.errors.clone()),
            _ => None,
        };

        ErrorResponse {
            success: false,
            message: self.public_message(),
            code: self.code(),
            error_id: error_id.to_string(),
            errors,
        }
    }

    fn log_error(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::InvalidCredentials => {
                tracing::warn!(error_id = error_id, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, reason = e.reason(), "Authentication error");
            }
            AppError::Store(e) => {
                tracing::error!(error_id = error_id, error = %e, "Store error");
            }
            AppError::Config(msg) | AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
            other => {
                tracing::info!(error_id = error_id, code = other.code(), error = %other, "Request rejected");
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Auth(AuthError::InsufficientRole) => StatusCode::FORBIDDEN,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Store(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&error_id);

        HttpResponse::build(self.status_code()).json(self.to_response_body(&error_id))
    }
}

/// Turns actix JSON extraction failures into the standard envelope.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let detail = match &err {
        JsonPayloadError::ContentType => "Content-Type must be application/json".to_string(),
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            "Request body is too large".to_string()
        }
        _ => "Request body must be a valid JSON object".to_string(),
    };

    AppError::Validation(ValidationErrors::body(detail)).into()
}
