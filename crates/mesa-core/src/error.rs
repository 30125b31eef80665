//! # Error Types
//!
//! Domain-specific error types for mesa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mesa-core errors (this file)                                          │
//! │  ├── ConfigError      - Bad inventory/schedule at load time (fatal)    │
//! │  ├── CoreError        - Booking lifecycle outcomes                     │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  mesa-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  App errors                                                            │
//! │  └── ApiError         - What callers see (serialized)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A resolver finding no free table is NOT an error: it is
//! [`Resolution::Unavailable`](crate::resolver::Resolution). It only becomes
//! [`CoreError::SlotUnavailable`] when a commit is refused.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

// =============================================================================
// Config Error
// =============================================================================

/// Inventory or schedule configuration is invalid.
///
/// Raised while building a [`TableInventory`](crate::inventory::TableInventory)
/// or [`ServiceSchedule`](crate::schedule::ServiceSchedule). The process must
/// refuse to serve when this happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A table or combination declares a capacity of zero.
    #[error("{id} must have a positive capacity")]
    NonPositiveCapacity { id: String },

    /// Two tables, two combinations, or a table and a combination share an id.
    #[error("Duplicate unit id: {0}")]
    DuplicateId(String),

    /// A combination references a physical table that does not exist.
    #[error("Combination {combination} references unknown table {table}")]
    UnknownComponent { combination: String, table: String },

    /// A combination lists the same table more than once.
    #[error("Combination {combination} lists table {table} more than once")]
    DuplicateComponent { combination: String, table: String },

    /// A combination joins fewer than two distinct tables.
    #[error("Combination {0} must join at least two distinct tables")]
    TooFewComponents(String),

    /// An identifier is empty.
    #[error("Unit ids must not be empty")]
    EmptyId,

    /// The configured seat limit is zero.
    #[error("Seat limit must be positive")]
    InvalidSeatLimit,

    /// A schedule entry could not be parsed or is duplicated.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
}

/// Convenience type alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Core Error
// =============================================================================

/// Booking lifecycle errors.
///
/// These are typed outcomes surfaced to callers, never swallowed.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No seating assignment could be committed for the slot.
    ///
    /// ## When This Occurs
    /// ```text
    /// probe: 14:00, party 4 → available
    ///      │
    ///      ▼ (another booking commits first)
    /// commit: re-resolve → Unavailable
    ///      │
    ///      ▼
    /// SlotUnavailable { date, time, party_size: 4 }
    /// ```
    /// Retryable by the user with another slot.
    #[error("No table available for {party_size} on {date} at {time}")]
    SlotUnavailable {
        date: NaiveDate,
        time: NaiveTime,
        party_size: u32,
    },

    /// The slot is not served on that date (closed dinner, unknown time).
    #[error("{date} at {time} is not a bookable service slot")]
    ServiceClosed { date: NaiveDate, time: NaiveTime },

    /// No active reservation with that code.
    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    /// The reservation exists but was already cancelled.
    #[error("Reservation {0} is already cancelled")]
    AlreadyCancelled(String),

    /// The same guest already holds a confirmed reservation for this slot.
    #[error("A confirmed reservation for {email} already exists on {date} at {time}")]
    DuplicateBooking {
        email: String,
        date: NaiveDate,
        time: NaiveTime,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before resolution runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid email, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Date or time lies in the past.
    #[error("{field} cannot be in the past")]
    InPast { field: String },

    /// Group too large for online booking.
    #[error("Groups larger than {max} must book by phone")]
    PartyTooLarge { max: u32 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
