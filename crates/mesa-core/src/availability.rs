//! # Slot Availability
//!
//! Dry-run resolution across every service slot of a date.
//!
//! ## Flow
//! ```text
//! reservations(date) ─┬─► snapshot(13:00) ─► resolve ─► disponible
//!                     ├─► snapshot(13:30) ─► resolve ─► disponible
//!                     │         ...
//!                     └─► snapshot(22:30) ─► resolve ─► disponible
//!                                         (forced false on the closed dinner day)
//! ```
//!
//! Nothing is committed and nothing is cached: two calls with no write in
//! between return identical results.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::inventory::TableInventory;
use crate::occupancy::OccupancySnapshot;
use crate::resolver::{Resolver, SeatingRequest};
use crate::schedule::{ServicePeriod, ServiceSchedule};
use crate::types::{hhmm, Location, Reservation, SlotKey};
use crate::DEFAULT_PROBE_PARTY_SIZE;

/// Availability of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SlotAvailability {
    #[serde(rename = "hora", with = "hhmm")]
    #[ts(as = "String")]
    pub time: NaiveTime,

    #[serde(rename = "turno")]
    pub period: ServicePeriod,

    #[serde(rename = "disponible")]
    pub available: bool,
}

/// Availability grid for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DayAvailability {
    #[ts(as = "String")]
    pub date: NaiveDate,

    /// Dinner is not served on this date.
    pub dinner_closed: bool,

    pub slots: Vec<SlotAvailability>,
}

impl DayAvailability {
    /// Times still bookable.
    pub fn open_times(&self) -> impl Iterator<Item = NaiveTime> + '_ {
        self.slots.iter().filter(|s| s.available).map(|s| s.time)
    }
}

/// Runs the resolver in dry-run mode over a schedule.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityAggregator<'a> {
    inventory: &'a TableInventory,
    schedule: &'a ServiceSchedule,
    probe_party_size: u32,
}

impl<'a> AvailabilityAggregator<'a> {
    pub fn new(inventory: &'a TableInventory, schedule: &'a ServiceSchedule) -> Self {
        AvailabilityAggregator {
            inventory,
            schedule,
            probe_party_size: DEFAULT_PROBE_PARTY_SIZE,
        }
    }

    /// Party size used when the caller does not give one.
    ///
    /// Probing with the smallest size only answers "is anything left at
    /// all". Callers that care about a specific group must pass its size.
    pub fn with_probe_party_size(mut self, size: u32) -> Self {
        self.probe_party_size = size.max(1);
        self
    }

    /// Availability of every slot on `date`.
    ///
    /// `reservations` may hold the whole day; each slot only sees its own.
    pub fn slots_for_date(
        &self,
        date: NaiveDate,
        party_size: Option<u32>,
        location: Option<Location>,
        reservations: &[Reservation],
    ) -> DayAvailability {
        let request = SeatingRequest::new(party_size.unwrap_or(self.probe_party_size)).at(location);
        let resolver = Resolver::new(self.inventory);
        let dinner_closed = self.schedule.is_dinner_closed(date);

        let slots = self
            .schedule
            .slots()
            .map(|(time, period)| {
                let available = if period == ServicePeriod::Dinner && dinner_closed {
                    false
                } else {
                    let snapshot = OccupancySnapshot::build(SlotKey::new(date, time), reservations);
                    resolver.is_available(request, &snapshot)
                };
                SlotAvailability {
                    time,
                    period,
                    available,
                }
            })
            .collect();

        DayAvailability {
            date,
            dinner_closed,
            slots,
        }
    }

    /// Yes/no for a single slot. Unknown or closed slots are never available.
    pub fn check(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        party_size: u32,
        location: Option<Location>,
        reservations: &[Reservation],
    ) -> bool {
        if !self.schedule.is_open(date, time) {
            return false;
        }
        let snapshot = OccupancySnapshot::build(SlotKey::new(date, time), reservations);
        Resolver::new(self.inventory).is_available(SeatingRequest::new(party_size).at(location), &snapshot)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{house_inventory, PhysicalTable};
    use crate::types::{parse_time, Contact, LocationPreference, ReservationStatus};
    use chrono::Utc;

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 15).unwrap()
    }

    fn sunday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 20).unwrap()
    }

    fn booking(date: NaiveDate, time: &str, tables: &[&str], party: u32) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: format!("{}-{}", time, tables.join("+")),
            code: format!("ALC-{}", tables.join("")),
            contact: Contact {
                first_name: "Luis".to_string(),
                last_name: "Gil".to_string(),
                email: "luis@example.com".to_string(),
                phone: "612345678".to_string(),
            },
            date,
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

    #[test]
    fn test_full_grid_on_empty_day() {
        let inventory = house_inventory();
        let schedule = ServiceSchedule::default();
        let agg = AvailabilityAggregator::new(&inventory, &schedule);

        let day = agg.slots_for_date(tuesday(), None, None, &[]);
        assert!(!day.dinner_closed);
        assert_eq!(day.slots.len(), 12);
        assert!(day.slots.iter().all(|s| s.available));
    }

    #[test]
    fn test_sunday_dinner_forced_closed() {
        let inventory = house_inventory();
        let schedule = ServiceSchedule::default();
        let agg = AvailabilityAggregator::new(&inventory, &schedule);

        let day = agg.slots_for_date(sunday(), Some(2), None, &[]);
        assert!(day.dinner_closed);
        for slot in &day.slots {
            match slot.period {
                ServicePeriod::Lunch => assert!(slot.available),
                ServicePeriod::Dinner => assert!(!slot.available),
            }
        }
        assert!(!agg.check(sunday(), parse_time("21:00").unwrap(), 2, None, &[]));
    }

    #[test]
    fn test_party_size_changes_answer() {
        let inventory = TableInventory::new(
            vec![
                PhysicalTable::new("a", 2, Location::Interior),
                PhysicalTable::new("b", 4, Location::Interior),
            ],
            vec![],
        )
        .unwrap();
        let schedule = ServiceSchedule::default();
        let agg = AvailabilityAggregator::new(&inventory, &schedule);
        let reservations = vec![booking(tuesday(), "14:00", &["b"], 4)];

        let any_party = agg.slots_for_date(tuesday(), None, None, &reservations);
        let four = agg.slots_for_date(tuesday(), Some(4), None, &reservations);

        let at = |day: &DayAvailability, t: &str| {
            day.slots
                .iter()
                .find(|s| s.time == parse_time(t).unwrap())
                .map(|s| s.available)
        };
        assert_eq!(at(&any_party, "14:00"), Some(true));
        assert_eq!(at(&four, "14:00"), Some(false));
        assert_eq!(at(&four, "14:30"), Some(true));
    }

    #[test]
    fn test_recomputation_is_idempotent() {
        let inventory = house_inventory();
        let schedule = ServiceSchedule::default();
        let agg = AvailabilityAggregator::new(&inventory, &schedule);
        let reservations = vec![
            booking(tuesday(), "13:00", &["m13"], 8),
            booking(tuesday(), "21:00", &["m8", "m9"], 7),
        ];

        let first = agg.slots_for_date(tuesday(), Some(8), None, &reservations);
        let second = agg.slots_for_date(tuesday(), Some(8), None, &reservations);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_time_is_unavailable() {
        let inventory = house_inventory();
        let schedule = ServiceSchedule::default();
        let agg = AvailabilityAggregator::new(&inventory, &schedule);
        assert!(!agg.check(tuesday(), parse_time("17:00").unwrap(), 2, None, &[]));
        assert!(agg.check(tuesday(), parse_time("14:00").unwrap(), 2, None, &[]));
    }

    #[test]
    fn test_slot_json_shape() {
        let slot = SlotAvailability {
            time: parse_time("20:30").unwrap(),
            period: ServicePeriod::Dinner,
            available: true,
        };
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "hora": "20:30", "turno": "cena", "disponible": true })
        );
    }
}
