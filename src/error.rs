//! Error types for Murmur
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Every handler returns this type. The message of client-facing variants
/// is sent back verbatim; server-side variants are reduced to a generic
/// message and logged.
#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced user, post or notification does not exist (404)
    #[error("{0}")]
    NotFound(String),

    /// Actor referenced itself in a follow (400)
    #[error("You cannot follow yourself")]
    SelfReference,

    /// Validation error (400)
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid session, or actor does not own the resource (401)
    #[error("Unauthorized")]
    Unauthorized,

    /// Duplicate unique field (409)
    #[error("{0}")]
    Conflict(String),

    /// Session signature verification failed (401)
    #[error("Invalid signature")]
    InvalidSignature,

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Media storage error (500)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hashing/signing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn user_not_found() -> Self {
        Self::NotFound("User not found".to_string())
    }

    pub fn post_not_found() -> Self {
        Self::NotFound("Post not found".to_string())
    }

    /// Short label used for the error metric
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::SelfReference => "self_reference",
            AppError::Validation(_) => "validation",
            AppError::Unauthorized => "unauthorized",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidSignature => "invalid_signature",
            AppError::Database(_) => "database",
            AppError::Storage(_) => "storage",
            AppError::Config(_) => "config",
            AppError::Encryption(_) => "encryption",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SelfReference | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized | AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Config(_)
            | AppError::Encryption(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        // Surface one field message, picking fields in name order so the
        // same input always reports the same error.
        let fields: std::collections::BTreeMap<_, _> = err.field_errors().into_iter().collect();
        let message = fields
            .values()
            .flat_map(|errors| errors.iter())
            .find_map(|error| error.message.as_ref().map(ToString::to_string))
            .unwrap_or_else(|| err.to_string());
        AppError::Validation(message)
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status();
        let error_message = match &self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Internal(_) | AppError::Encryption(_) => "Internal server error".to_string(),
            AppError::Storage(msg) | AppError::Config(msg) => msg.clone(),
            _ => self.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.kind()])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct PasswordForm {
        #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
        password: String,
    }

    #[derive(Validate)]
    struct SignupForm {
        #[validate(length(min = 1, message = "Username is required"))]
        username: String,
        #[validate(email(message = "Invalid email"))]
        email: String,
        #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
        password: String,
    }

    #[test]
    fn status_codes_follow_error_taxonomy() {
        assert_eq!(
            AppError::user_not_found().into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::SelfReference.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Conflict("Username already exists".to_string())
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Storage("upload failed".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_errors_keep_field_message() {
        let form = PasswordForm {
            password: "12345".to_string(),
        };
        let error: AppError = form.validate().unwrap_err().into();
        assert!(matches!(
            error,
            AppError::Validation(message) if message == "Password must be at least 6 characters"
        ));
    }

    #[test]
    fn validation_errors_pick_fields_in_name_order() {
        for _ in 0..32 {
            let form = SignupForm {
                username: String::new(),
                email: "not-an-email".to_string(),
                password: "123".to_string(),
            };
            let error: AppError = form.validate().unwrap_err().into();
            assert!(matches!(error, AppError::Validation(message) if message == "Invalid email"));
        }
    }
}
