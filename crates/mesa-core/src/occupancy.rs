//! # Occupancy Snapshot
//!
//! The set of physical tables consumed at one (date, time) slot.
//!
//! ## Derivation
//! ```text
//! confirmed reservations ──► filter (date, time) ──► union consumed_tables
//!                                                          │
//!                                                          ▼
//!                                               OccupancySnapshot
//! ```
//!
//! A snapshot is never stored or cached. It is rebuilt from reservation
//! records on every query, so cancelling a booking restores every
//! combination that depended on its tables without any repair step.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveTime;
use serde::Serialize;

use crate::types::{hhmm, Reservation, SlotKey};

/// Physical tables occupied at one slot, plus the covers already seated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancySnapshot {
    slot: SlotKey,
    tables: BTreeSet<String>,
    seats: u32,
}

impl OccupancySnapshot {
    /// An empty snapshot for a slot with no bookings.
    pub fn empty(slot: SlotKey) -> Self {
        OccupancySnapshot {
            slot,
            tables: BTreeSet::new(),
            seats: 0,
        }
    }

    /// Replays every confirmed reservation matching `slot`.
    ///
    /// Reservations for other slots and cancelled records are ignored, so
    /// callers may pass a whole day's list.
    pub fn build<'a, I>(slot: SlotKey, reservations: I) -> Self
    where
        I: IntoIterator<Item = &'a Reservation>,
    {
        let mut snapshot = OccupancySnapshot::empty(slot);
        for r in reservations {
            if r.is_confirmed() && r.slot() == slot {
                snapshot.seats += r.party_size;
                snapshot
                    .tables
                    .extend(r.consumed_tables.iter().cloned());
            }
        }
        snapshot
    }

    pub fn slot(&self) -> SlotKey {
        self.slot
    }

    #[inline]
    pub fn is_occupied(&self, table_id: &str) -> bool {
        self.tables.contains(table_id)
    }

    /// Occupied table ids in sorted order.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    pub fn occupied_count(&self) -> usize {
        self.tables.len()
    }

    /// Covers already seated at this slot.
    pub fn seats(&self) -> u32 {
        self.seats
    }

    /// Marks tables as taken, as if another booking had committed.
    pub fn occupy<I, S>(&mut self, tables: I, party_size: u32)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.extend(tables.into_iter().map(Into::into));
        self.seats += party_size;
    }
}

// =============================================================================
// Double-Booking Detection
// =============================================================================

/// A physical table consumed by more than one confirmed reservation at the
/// same slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableConflict {
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub table: String,
    pub codes: Vec<String>,
}

/// Finds every (time, table) consumed twice among confirmed reservations.
///
/// An empty result means the disjointness invariant holds for the input.
pub fn find_conflicts<'a, I>(reservations: I) -> Vec<TableConflict>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    let mut holders: BTreeMap<(SlotKey, &str), Vec<String>> = BTreeMap::new();

    for r in reservations.into_iter().filter(|r| r.is_confirmed()) {
        for table in &r.consumed_tables {
            holders
                .entry((r.slot(), table.as_str()))
                .or_default()
                .push(r.code.clone());
        }
    }

    holders
        .into_iter()
        .filter(|(_, codes)| codes.len() > 1)
        .map(|((slot, table), codes)| TableConflict {
            time: slot.time,
            table: table.to_string(),
            codes,
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_time, Contact, LocationPreference, ReservationStatus};
    use chrono::{NaiveDate, Utc};

    fn booking(code: &str, time: &str, tables: &[&str], party: u32) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: code.to_lowercase(),
            code: code.to_string(),
            contact: Contact {
                first_name: "Ana".to_string(),
                last_name: "Ruiz".to_string(),
                email: format!("{}@example.com", code.to_lowercase()),
                phone: "612345678".to_string(),
            },
            date: NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
            time: parse_time(time).unwrap(),
            party_size: party,
            preference: LocationPreference::Indiferente,
            occasion: None,
            allergies: None,
            comments: None,
            assigned_unit: tables[0].to_string(),
            consumed_tables: tables.iter().map(|t| t.to_string()).collect(),
            status: ReservationStatus::Confirmed,
            created_at: now,
            updated_at: now,
        }
    }

    fn slot(time: &str) -> SlotKey {
        SlotKey::new(
            NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
            parse_time(time).unwrap(),
        )
    }

    #[test]
    fn test_build_filters_by_slot() {
        let list = vec![
            booking("A", "14:00", &["m1", "m2"], 4),
            booking("B", "14:00", &["m5"], 3),
            booking("C", "14:30", &["m6"], 2),
        ];
        let snap = OccupancySnapshot::build(slot("14:00"), &list);

        assert!(snap.is_occupied("m1"));
        assert!(snap.is_occupied("m2"));
        assert!(snap.is_occupied("m5"));
        assert!(!snap.is_occupied("m6"));
        assert_eq!(snap.seats(), 7);
        assert_eq!(snap.occupied_count(), 3);
    }

    #[test]
    fn test_cancelled_records_are_ignored() {
        let mut cancelled = booking("A", "14:00", &["m1"], 2);
        cancelled.status = ReservationStatus::Cancelled;
        let snap = OccupancySnapshot::build(slot("14:00"), &[cancelled]);
        assert!(!snap.is_occupied("m1"));
        assert_eq!(snap.seats(), 0);
    }

    #[test]
    fn test_find_conflicts() {
        let list = vec![
            booking("A", "14:00", &["m3", "m5"], 6),
            booking("B", "14:00", &["m11", "m3"], 8),
            booking("C", "14:30", &["m3"], 2),
        ];
        let conflicts = find_conflicts(&list);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].table, "m3");
        assert_eq!(conflicts[0].codes, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_no_conflicts_when_disjoint() {
        let list = vec![
            booking("A", "14:00", &["m1", "m2"], 4),
            booking("B", "14:00", &["m3"], 2),
        ];
        assert!(find_conflicts(&list).is_empty());
    }
}
