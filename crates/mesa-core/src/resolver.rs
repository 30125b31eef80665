//! # Assignment Resolver
//!
//! Decides whether a party can be seated at a slot and which physical
//! tables the seating consumes.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Candidates   tables with cap ≥ party  +  combinations with cap ≥ party│
//! │                  (restricted to the preferred location, if any)          │
//! │  2. Free         table:       id ∉ occupancy                             │
//! │                  combination: EVERY component ∉ occupancy                │
//! │  3. Pick         smallest capacity; ties → tables before combinations,   │
//! │                  then declaration order                                  │
//! │  4. Answer       Assigned(unit, tables)  or  Unavailable(reason)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Greedy and single-pass: there is no backtracking and no attempt at a
//! globally optimal packing. Two combinations sharing a component can make
//! the resolver refuse a request some other choice order would have seated.
//!
//! `Unavailable` is a normal outcome. The resolver never fails on a valid
//! inventory.

use serde::Serialize;

use crate::inventory::{TableInventory, UnitKind};
use crate::occupancy::OccupancySnapshot;
use crate::types::Location;

// =============================================================================
// Request / Outcome
// =============================================================================

/// What the resolver is asked to seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatingRequest {
    pub party_size: u32,
    pub location: Option<Location>,
}

impl SeatingRequest {
    pub fn new(party_size: u32) -> Self {
        SeatingRequest {
            party_size,
            location: None,
        }
    }

    pub fn at(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }
}

/// The winning unit and the physical tables it consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub unit_id: String,
    pub kind: UnitKind,
    pub capacity: u32,
    pub tables: Vec<String>,
}

/// Why no assignment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// Party size was zero.
    EmptyParty,
    /// No unit in the inventory is large enough.
    NoUnitLargeEnough,
    /// Large-enough units exist but every one has an occupied table.
    AllCandidatesOccupied,
    /// The slot already seats its configured maximum of covers.
    SeatLimitReached,
}

/// Result of a resolver run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Resolution {
    Assigned(Assignment),
    Unavailable { reason: UnavailableReason },
}

impl Resolution {
    pub fn is_available(&self) -> bool {
        matches!(self, Resolution::Assigned(_))
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            Resolution::Assigned(a) => Some(a),
            Resolution::Unavailable { .. } => None,
        }
    }

    pub fn into_assignment(self) -> Option<Assignment> {
        match self {
            Resolution::Assigned(a) => Some(a),
            Resolution::Unavailable { .. } => None,
        }
    }

    fn unavailable(reason: UnavailableReason) -> Self {
        Resolution::Unavailable { reason }
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Stateless resolver over an injected inventory.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    inventory: &'a TableInventory,
}

impl<'a> Resolver<'a> {
    pub fn new(inventory: &'a TableInventory) -> Self {
        Resolver { inventory }
    }

    /// Resolves one request against one slot's occupancy.
    pub fn resolve(&self, request: SeatingRequest, occupancy: &OccupancySnapshot) -> Resolution {
        if request.party_size == 0 {
            return Resolution::unavailable(UnavailableReason::EmptyParty);
        }

        if let Some(limit) = self.inventory.seat_limit() {
            if occupancy.seats().saturating_add(request.party_size) > limit {
                return Resolution::unavailable(UnavailableReason::SeatLimitReached);
            }
        }

        let candidates = self
            .inventory
            .units_capable_of(request.party_size, request.location);

        if candidates.is_empty() {
            return Resolution::unavailable(UnavailableReason::NoUnitLargeEnough);
        }

        // Candidates arrive in priority order, so the first free one wins
        match candidates.into_iter().find(|u| u.is_free(occupancy)) {
            Some(unit) => Resolution::Assigned(Assignment {
                unit_id: unit.id().to_string(),
                kind: unit.kind(),
                capacity: unit.capacity(),
                tables: unit.tables().into_iter().map(str::to_string).collect(),
            }),
            None => Resolution::unavailable(UnavailableReason::AllCandidatesOccupied),
        }
    }

    /// Dry run: only the yes/no answer.
    pub fn is_available(&self, request: SeatingRequest, occupancy: &OccupancySnapshot) -> bool {
        self.resolve(request, occupancy).is_available()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
