//! # Repository Module
//!
//! Database repository implementations for Mesa.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BookingService                                                         │
//! │       │                                                                 │
//! │       │  db.reservations().list_confirmed(date)                         │
//! │       ▼                                                                 │
//! │  ReservationRepository                                                  │
//! │  ├── list_confirmed / list_confirmed_at                                 │
//! │  ├── insert_checked   (read slot + insert, one transaction)             │
//! │  ├── update_checked   (read row + neighbours + update)                  │
//! │  ├── cancel           (hard delete + audit copy)                        │
//! │  └── list / day_stats                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ReservationRepository`](reservation::ReservationRepository) - Reservations and seating outcome
//! - [`AuditRepository`](audit::AuditRepository) - Change history

pub mod audit;
pub mod reservation;
