//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
///
/// Domain errors from the core crate convert into these; the API layer maps
/// them to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request payload too large.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Business rule violation.
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// The service is not configured for the requested operation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// External service rejected the request; retrying will not help.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// External service is temporarily unavailable; the caller may retry.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The operation was cancelled or timed out before completion.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::PayloadTooLarge(_) => 413,
            Self::BusinessRule(_) => 422,
            Self::Configuration(_) | Self::Unavailable(_) => 503,
            Self::ExternalService(_) => 502,
            Self::Cancelled(_) => 504,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Cancelled(_) => "CANCELLED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may retry the same request later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Cancelled(_))
    }
}
