//! # API Error Type
//!
//! Unified error type for coordinator operations.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Mesa                                   │
//! │                                                                         │
//! │  BookingService::create(..)                                             │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Validation? ─── ValidationError ──────────────┐                │  │
//! │  │         │                                       │                │  │
//! │  │         ▼                                       ▼                │  │
//! │  │  Lifecycle?  ─── CoreError::SlotUnavailable ── ApiError ───────►│  │
//! │  │         │                                       ▲                │  │
//! │  │         ▼                                       │                │  │
//! │  │  Storage?    ─── DbError::QueryFailed ──────────┘                │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  { "code": "CONFLICT", "message": "No table available for 4 ..." }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Infrastructure details are logged and replaced by a generic message.

use serde::Serialize;

use crate::config::ConfigError;
use mesa_core::{CoreError, ValidationError};
use mesa_db::DbError;

/// Error returned by every coordinator operation.
///
/// ## Serialization
/// ```json
/// {
///   "code": "ALREADY_CANCELLED",
///   "message": "Reservation ALC-M1X2Y3-AB12 is already cancelled"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
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
    /// No reservation with that code (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// The slot filled up, or the guest already holds it (409).
    /// The user may retry with another slot.
    Conflict,

    /// Cancelling twice (409)
    AlreadyCancelled,

    /// Inventory or schedule configuration is invalid
    ConfigError,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal error (500)
    Internal,
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

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Conflict, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, .. } => {
                tracing::error!("Unique constraint violated: {}", field);
                ApiError::conflict("Reservation could not be stored, please retry")
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::CorruptRow { id, reason } => {
                tracing::error!(id = %id, "Corrupt reservation row: {}", reason);
                ApiError::new(ErrorCode::DatabaseError, "Stored reservation is unreadable")
            }
            DbError::Serialization(e) => {
                tracing::error!("Serialization failed: {}", e);
                ApiError::internal("Could not encode reservation")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts lifecycle errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::SlotUnavailable { .. } => ApiError::conflict(message),
            CoreError::DuplicateBooking { .. } => ApiError::conflict(message),
            CoreError::ServiceClosed { .. } => ApiError::validation(message),
            CoreError::ReservationNotFound(code) => ApiError::not_found("Reservation", &code),
            CoreError::AlreadyCancelled(_) => ApiError::new(ErrorCode::AlreadyCancelled, message),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = Result<T, ApiError>;
