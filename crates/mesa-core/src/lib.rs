//! # mesa-core: Table Assignment and Availability Engine
//!
//! This crate is the **heart** of Mesa. It decides whether a party can be
//! seated at a slot, which physical tables the seating consumes, and what
//! the day's availability grid looks like. It performs no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mesa Architecture                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              apps/reservations (BookingService, CLI)            │   │
//! │  │    slots ──► check ──► book ──► cancel ──► update ──► verify    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ mesa-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌─────────────┐  │   │
//! │  │  │ inventory │  │ occupancy │  │ resolver  │  │ availability│  │   │
//! │  │  │  tables   │─►│ snapshot  │─►│ smallest  │─►│  per-slot   │  │   │
//! │  │  │  combos   │  │ per slot  │  │ fit first │  │  grid       │  │   │
//! │  │  └───────────┘  └───────────┘  └───────────┘  └─────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    mesa-db (Database Layer)                     │   │
//! │  │           SQLite reservations, audit log, migrations            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`inventory`] - Physical tables, combinations, bookable units
//! - [`occupancy`] - Per-slot occupied tables, double-booking detection
//! - [`resolver`] - Greedy smallest-fit assignment
//! - [`schedule`] - Service times and the closed dinner day
//! - [`availability`] - Dry-run resolution across a date's slots
//! - [`types`] - Reservation records and shared value types
//! - [`validation`] - Booking request rules
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Recompute, never cache**: occupancy is rebuilt from reservation
//!    records on every call
//! 2. **Injected inventory**: the resolver works on whatever inventory it is
//!    handed, so tests use small synthetic floor plans
//! 3. **Unavailable is a value**: only commit-time refusals are errors
//!
//! ## Example Usage
//!
//! ```rust
//! use mesa_core::inventory::house_inventory;
//! use mesa_core::occupancy::OccupancySnapshot;
//! use mesa_core::resolver::{Resolver, SeatingRequest};
//! use mesa_core::types::{parse_time, SlotKey};
//! use chrono::NaiveDate;
//!
//! let inventory = house_inventory();
//! let slot = SlotKey::new(
//!     NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
//!     parse_time("14:00").unwrap(),
//! );
//!
//! let resolution = Resolver::new(&inventory)
//!     .resolve(SeatingRequest::new(4), &OccupancySnapshot::empty(slot));
//!
//! // Smallest free unit seating four is the first 4-top
//! assert_eq!(resolution.assignment().unwrap().unit_id, "m5");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod error;
pub mod inventory;
pub mod occupancy;
pub mod resolver;
pub mod schedule;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use availability::{AvailabilityAggregator, DayAvailability, SlotAvailability};
pub use error::{ConfigError, CoreError, CoreResult, ValidationError};
pub use inventory::{Combination, PhysicalTable, TableInventory, UnitKind};
pub use occupancy::{OccupancySnapshot, TableConflict};
pub use resolver::{Assignment, Resolution, Resolver, SeatingRequest, UnavailableReason};
pub use schedule::{ScheduleConfig, ServicePeriod, ServiceSchedule};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Party size used to probe a slot when the caller gives none.
///
/// Answers "is this slot open at all", not "is there room for my group".
pub const DEFAULT_PROBE_PARTY_SIZE: u32 = 1;

/// Largest group accepted online.
pub const MAX_PARTY_ONLINE: u32 = 10;

/// How far ahead a booking may be made.
pub const MAX_ADVANCE_DAYS: u32 = 30;

/// Maximum covers per slot.
pub const DEFAULT_SEAT_LIMIT: u32 = 50;
