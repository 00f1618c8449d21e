//! # API Error Type
//!
//! Unified error type for HTTP handlers and services.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Shopdesk                               │
//! │                                                                         │
//! │  ValidationError ──► CoreError ──┐                                      │
//! │                                  ├──► ApiError { code, message }        │
//! │  sqlx::Error ──────► DbError ────┘            │                         │
//! │                                               ▼                         │
//! │                                   IntoResponse: status + JSON body      │
//! │                                                                         │
//! │  HTTP/1.1 400 Bad Request                                               │
//! │  { "code": "INSUFFICIENT_STOCK",                                        │
//! │    "message": "Insufficient stock for SKU-1: available 3, ..." }        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! INTERNAL errors never leak their detail: it is logged, and the client
//! gets a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shopdesk_core::{CoreError, ValidationError};
use shopdesk_db::DbError;

/// Result alias used by services and handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned to HTTP clients.
///
/// ```json
/// { "code": "NOT_FOUND", "message": "Product not found: 4f1c..." }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Wrong username or password (401)
    InvalidCredentials,

    /// Bad, expired or wrong-type token (401)
    InvalidToken,

    /// Missing identity or no permitted role (403)
    Forbidden,

    /// Not enough stock for an order or sale line (400)
    InsufficientStock,

    /// Operation not allowed in the current state (400)
    InvalidOperation,

    /// Input validation failed (400)
    ValidationError,

    /// Duplicate value or concurrent modification (409)
    Conflict,

    /// A downstream dependency (SMTP, PayPal) is unavailable (503)
    ServiceUnavailable,

    /// Anything else (500)
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InvalidCredentials | ErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::InsufficientStock
            | ErrorCode::InvalidOperation
            | ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn invalid_credentials() -> Self {
        ApiError::new(ErrorCode::InvalidCredentials, "Invalid username or password")
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::InvalidToken, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Forbidden, message)
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::InvalidOperation, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Creates an internal error. The message is logged, never returned.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();

        let body = if self.code == ErrorCode::Internal {
            tracing::error!(error = %self.message, "Request failed");
            ApiError::new(ErrorCode::Internal, "Internal server error")
        } else {
            self
        };

        (status, Json(body)).into_response()
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            e @ DbError::UniqueViolation { .. } => ApiError::new(ErrorCode::Conflict, e.to_string()),
            e @ DbError::VersionConflict { .. } => ApiError::new(ErrorCode::Conflict, e.to_string()),
            DbError::ConstraintViolation(message) => {
                tracing::warn!(%message, "Constraint violation");
                ApiError::validation("Value violates a data constraint")
            }
            DbError::PoolExhausted => ApiError::unavailable("Database is busy"),
            other => ApiError::internal(other.to_string()),
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::OrderNotFound(id) => ApiError::not_found("Order", &id),
            CoreError::SaleNotFound(id) => ApiError::not_found("Sale", &id),
            e @ CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, e.to_string())
            }
            e @ CoreError::InvalidTransition { .. } => ApiError::invalid_operation(e.to_string()),
            CoreError::InvalidOperation(message) => ApiError::invalid_operation(message),
            e @ CoreError::InvalidPaymentAmount { .. } => ApiError::validation(e.to_string()),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_of(ApiError::not_found("Product", "x")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ApiError::invalid_credentials()), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ApiError::invalid_token("bad")), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ApiError::forbidden("no")), StatusCode::FORBIDDEN);
        assert_eq!(status_of(ApiError::validation("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ApiError::invalid_operation("no")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ApiError::unavailable("smtp")), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(ApiError::internal("boom")), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_core_error_mapping() {
        let err: ApiError = CoreError::InsufficientStock {
            sku: "SKU-1".to_string(),
            available: 3,
            requested: 5,
            shortfall: 2,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert!(err.message.contains("short by 2"));

        let err: ApiError = CoreError::InvalidTransition {
            from: "COMPLETED".to_string(),
            to: "PENDING".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
    }

    #[test]
    fn test_db_error_mapping() {
        let err: ApiError = DbError::duplicate("sku", "SKU-1").into();
        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(err.message, "Duplicate sku: 'SKU-1' already exists");

        let err: ApiError = DbError::conflict("UserLoyalty", "l-1").into();
        assert_eq!(err.code, ErrorCode::Conflict);

        let err: ApiError = DbError::QueryFailed("syntax".to_string()).into();
        assert_eq!(err.code, ErrorCode::Internal);
    }
}
