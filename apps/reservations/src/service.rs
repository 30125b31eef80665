//! # Booking Service
//!
//! The reservation lifecycle coordinator: availability queries, create,
//! update and cancel, plus the admin reads.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create(request)                                                        │
//! │     │                                                                   │
//! │     ├── validate + sanitize (mesa_core::validation)                     │
//! │     ├── slot open? ── no ──► ServiceClosed                              │
//! │     ├── SlotLocks::acquire(date, time)                                  │
//! │     └── insert_checked ─┬─ duplicate email? ──► DuplicateBooking        │
//! │                         ├─ snapshot from the rows just read             │
//! │                         ├─ Resolver::resolve ── Unavailable ──► Conflict│
//! │                         └─ INSERT + audit, COMMIT                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A client's earlier "available" answer is never trusted: every commit
//! re-resolves against the rows read inside its own transaction while the
//! slot lock is held. Reads take no lock.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{ApiError, ApiResult};
use crate::locks::SlotLocks;
use mesa_core::occupancy::find_conflicts;
use mesa_core::types::hhmm;
use mesa_core::validation::{
    generate_code, sanitize_text, validate_code, validate_new_reservation, validate_party_size,
    validate_search_query, validate_update, BookingLimits,
};
use mesa_core::{
    AvailabilityAggregator, CoreError, DayAvailability, LocationPreference, NewReservation,
    OccupancySnapshot, Reservation, ReservationStatus, ReservationUpdate, Resolution, Resolver,
    SeatingRequest, ServicePeriod, ServiceSchedule, TableConflict, TableInventory,
    DEFAULT_PROBE_PARTY_SIZE,
};
use mesa_db::{CancelOutcome, Database, Page, ReservationFilter, SlotStats};

/// Source of the local wall-clock time used for "not in the past" checks.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

// =============================================================================
// Responses
// =============================================================================

/// Returned by a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub reservation_id: String,
    pub code: String,
    /// Table or combination granted.
    pub unit: String,
    /// Physical tables it consumes.
    pub tables: Vec<String>,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub party_size: u32,
}

impl From<&Reservation> for Confirmation {
    fn from(r: &Reservation) -> Self {
        Confirmation {
            reservation_id: r.id.clone(),
            code: r.code.clone(),
            unit: r.assigned_unit.clone(),
            tables: r.consumed_tables.clone(),
            date: r.date,
            time: r.time,
            party_size: r.party_size,
        }
    }
}

/// Bookings and covers for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStats {
    pub date: NaiveDate,
    pub reservations: u32,
    pub covers: u32,
    pub lunch_covers: u32,
    pub dinner_covers: u32,
    pub slots: Vec<SlotStats>,
}

// =============================================================================
// Service
// =============================================================================

/// Coordinates the resolver with the reservations store.
///
/// Cheap to clone: the inventory and schedule are shared read-only, and
/// clones share one set of slot locks.
#[derive(Clone)]
pub struct BookingService {
    db: Database,
    inventory: Arc<TableInventory>,
    schedule: Arc<ServiceSchedule>,
    limits: BookingLimits,
    probe_party_size: u32,
    locks: SlotLocks,
    clock: Clock,
}

impl std::fmt::Debug for BookingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingService")
            .field("tables", &self.inventory.tables().len())
            .field("combinations", &self.inventory.combinations().len())
            .field("limits", &self.limits)
            .field("probe_party_size", &self.probe_party_size)
            .finish_non_exhaustive()
    }
}

impl BookingService {
    pub fn new(db: Database, inventory: TableInventory, schedule: ServiceSchedule) -> Self {
        BookingService {
            db,
            inventory: Arc::new(inventory),
            schedule: Arc::new(schedule),
            limits: BookingLimits::default(),
            probe_party_size: DEFAULT_PROBE_PARTY_SIZE,
            locks: SlotLocks::new(),
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    /// Builds the service from a validated configuration.
    pub fn from_config(db: Database, config: &EngineConfig) -> ApiResult<Self> {
        let inventory = config.build_inventory()?;
        let schedule = config.build_schedule()?;

        info!(
            tables = inventory.tables().len(),
            combinations = inventory.combinations().len(),
            seats = inventory.total_seats(),
            seat_limit = ?inventory.seat_limit(),
            "Inventory loaded"
        );

        Ok(BookingService::new(db, inventory, schedule)
            .with_limits(config.booking.limits())
            .with_probe_party_size(config.booking.default_probe_party_size))
    }

    pub fn with_limits(mut self, limits: BookingLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_probe_party_size(mut self, size: u32) -> Self {
        self.probe_party_size = size.max(1);
        self
    }

    /// Replaces the wall clock.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn inventory(&self) -> &TableInventory {
        &self.inventory
    }

    pub fn schedule(&self) -> &ServiceSchedule {
        &self.schedule
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn aggregator(&self) -> AvailabilityAggregator<'_> {
        AvailabilityAggregator::new(&self.inventory, &self.schedule)
            .with_probe_party_size(self.probe_party_size)
    }

    // =========================================================================
    // Availability
    // =========================================================================

    /// Availability grid for every service slot on `date`.
    ///
    /// Without `party_size` the grid only answers whether anything is left
    /// in each slot.
    pub async fn slots_for_date(
        &self,
        date: NaiveDate,
        party_size: Option<u32>,
        preference: LocationPreference,
    ) -> ApiResult<DayAvailability> {
        if let Some(size) = party_size {
            validate_party_size(size, self.limits.max_party_online)?;
        }

        let reservations = self.db.reservations().list_confirmed(date).await?;
        let day = self
            .aggregator()
            .slots_for_date(date, party_size, preference.filter(), &reservations);

        debug!(
            date = %date,
            party_size = ?party_size,
            open = day.open_times().count(),
            "Computed availability grid"
        );
        Ok(day)
    }

    /// Yes/no for one slot and party size.
    pub async fn check(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        party_size: u32,
        preference: LocationPreference,
    ) -> ApiResult<bool> {
        validate_party_size(party_size, self.limits.max_party_online)?;

        let reservations = self.db.reservations().list_confirmed_at(date, time).await?;
        let available = self
            .aggregator()
            .check(date, time, party_size, preference.filter(), &reservations);

        debug!(date = %date, time = %time, party_size, available, "Checked availability");
        Ok(available)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Validates, resolves and stores a new reservation.
    ///
    /// ## Errors
    /// - `VALIDATION_ERROR`: bad input or a closed slot
    /// - `CONFLICT`: no unit free at commit time, or the guest already
    ///   holds this slot
    pub async fn create(&self, request: NewReservation) -> ApiResult<Confirmation> {
        let now = (self.clock)();
        let request = validate_new_reservation(&request, &self.limits, &self.schedule, now)?;
        let slot = request.slot();

        if !self.schedule.is_open(slot.date, slot.time) {
            return Err(CoreError::ServiceClosed {
                date: slot.date,
                time: slot.time,
            }
            .into());
        }

        let _guard = self.locks.acquire(slot).await;

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let code = reservation_code(&id, created_at);
        let resolver = Resolver::new(&self.inventory);
        let seating = SeatingRequest::new(request.party_size).at(request.preference.filter());
        let email = request.contact.email_normalized();

        let record = self
            .db
            .reservations()
            .insert_checked(slot.date, slot.time, |existing| -> ApiResult<Reservation> {
                if existing.iter().any(|r| r.contact.email_normalized() == email) {
                    return Err(CoreError::DuplicateBooking {
                        email: email.clone(),
                        date: slot.date,
                        time: slot.time,
                    }
                    .into());
                }

                let snapshot = OccupancySnapshot::build(slot, existing);
                let assignment = match resolver.resolve(seating, &snapshot) {
                    Resolution::Assigned(assignment) => assignment,
                    Resolution::Unavailable { reason } => {
                        warn!(
                            date = %slot.date,
                            time = %slot.time,
                            party_size = request.party_size,
                            ?reason,
                            "Commit refused, no unit free"
                        );
                        return Err(CoreError::SlotUnavailable {
                            date: slot.date,
                            time: slot.time,
                            party_size: request.party_size,
                        }
                        .into());
                    }
                };

                Ok(Reservation {
                    id: id.to_string(),
                    code: code.clone(),
                    contact: request.contact.clone(),
                    date: slot.date,
                    time: slot.time,
                    party_size: request.party_size,
                    preference: request.preference,
                    occasion: request.occasion.clone(),
                    allergies: request.allergies.clone(),
                    comments: request.comments.clone(),
                    assigned_unit: assignment.unit_id,
                    consumed_tables: assignment.tables,
                    status: ReservationStatus::Confirmed,
                    created_at,
                    updated_at: created_at,
                })
            })
            .await?;

        info!(
            code = %record.code,
            date = %record.date,
            time = %record.time,
            party_size = record.party_size,
            unit = %record.assigned_unit,
            "Reservation created"
        );
        Ok(Confirmation::from(&record))
    }

    /// Cancels a reservation and releases its tables.
    ///
    /// ## Errors
    /// - `NOT_FOUND`: no reservation ever had this code
    /// - `ALREADY_CANCELLED`: cancelled earlier
    pub async fn cancel(&self, code: &str, reason: Option<&str>) -> ApiResult<Reservation> {
        let code = validate_code(code)?;
        let reason = sanitize_text(reason, "reason", 500)?;

        // Serialize with writers of the same slot when the row still exists
        let existing = self.db.reservations().get_by_code(&code).await?;
        let _guard = match existing {
            Some(ref r) => Some(self.locks.acquire(r.slot()).await),
            None => None,
        };

        match self.db.reservations().cancel(&code, reason.as_deref()).await? {
            CancelOutcome::Cancelled(record) => {
                info!(
                    code = %record.code,
                    date = %record.date,
                    time = %record.time,
                    tables = ?record.consumed_tables,
                    "Reservation cancelled"
                );
                Ok(record)
            }
            CancelOutcome::AlreadyCancelled => Err(CoreError::AlreadyCancelled(code).into()),
            CancelOutcome::NotFound => Err(CoreError::ReservationNotFound(code).into()),
        }
    }

    /// Applies a partial update.
    ///
    /// Descriptive fields change in place. A new party size or location
    /// preference is re-resolved against the other reservations of the same
    /// slot: the current unit is kept while it still fits, otherwise a new
    /// one is assigned, otherwise the update is refused with `CONFLICT` and
    /// nothing changes.
    pub async fn update(&self, code: &str, update: ReservationUpdate) -> ApiResult<Reservation> {
        let code = validate_code(code)?;
        if update.is_empty() {
            return Err(ApiError::validation("Nothing to update"));
        }
        let update = validate_update(&update, &self.limits)?;

        let Some(existing) = self.db.reservations().get_by_code(&code).await? else {
            return Err(self.missing(code).await);
        };
        let _guard = self.locks.acquire(existing.slot()).await;

        debug!(code = %code, fields = ?update.changed_fields(), "Updating reservation");

        let inventory: &TableInventory = &self.inventory;
        let updated = self
            .db
            .reservations()
            .update_checked(&code, |mut current, others| -> ApiResult<Reservation> {
                if let Some(ref email) = update.email {
                    let email = mesa_core::normalize_email(email);
                    if others.iter().any(|r| r.contact.email_normalized() == email) {
                        return Err(CoreError::DuplicateBooking {
                            email,
                            date: current.date,
                            time: current.time,
                        }
                        .into());
                    }
                }

                let party_size = update.party_size.unwrap_or(current.party_size);
                let preference = update.preference.unwrap_or(current.preference);
                let reseat = party_size != current.party_size || preference != current.preference;

                if reseat {
                    let snapshot = OccupancySnapshot::build(current.slot(), others);
                    let (unit, tables) =
                        reseat_unit(inventory, &current, party_size, preference, &snapshot)?;
                    if unit != current.assigned_unit {
                        info!(
                            code = %current.code,
                            from = %current.assigned_unit,
                            to = %unit,
                            party_size,
                            "Reservation reassigned"
                        );
                    }
                    current.assigned_unit = unit;
                    current.consumed_tables = tables;
                    current.party_size = party_size;
                }

                current.apply_details(&update, Utc::now());
                Ok(current)
            })
            .await?;

        updated.ok_or_else(|| CoreError::ReservationNotFound(code).into())
    }

    /// Active reservation by code.
    pub async fn get(&self, code: &str) -> ApiResult<Reservation> {
        let code = validate_code(code)?;
        match self.db.reservations().get_by_code(&code).await? {
            Some(r) => Ok(r),
            None => Err(self.missing(code).await),
        }
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// Paginated listing with date, status and free-text filters.
    pub async fn list(&self, mut filter: ReservationFilter) -> ApiResult<Page<Reservation>> {
        if let Some(ref query) = filter.search {
            filter.search = Some(validate_search_query(query)?);
        }
        Ok(self.db.reservations().list(&filter).await?)
    }

    /// Confirmed bookings and covers for a date, split by service.
    pub async fn day_stats(&self, date: NaiveDate) -> ApiResult<DayStats> {
        let slots = self.db.reservations().day_stats(date).await?;

        let mut stats = DayStats {
            date,
            reservations: 0,
            covers: 0,
            lunch_covers: 0,
            dinner_covers: 0,
            slots: Vec::new(),
        };
        for slot in &slots {
            stats.reservations += slot.reservations;
            stats.covers += slot.covers;
            match self.schedule.period_of(slot.time) {
                Some(ServicePeriod::Lunch) => stats.lunch_covers += slot.covers,
                Some(ServicePeriod::Dinner) => stats.dinner_covers += slot.covers,
                None => {}
            }
        }
        stats.slots = slots;
        Ok(stats)
    }

    /// Replays every confirmed reservation of `date` and reports any table
    /// consumed twice at the same time. Empty means consistent.
    pub async fn verify(&self, date: NaiveDate) -> ApiResult<Vec<TableConflict>> {
        let reservations = self.db.reservations().list_confirmed(date).await?;
        let conflicts = find_conflicts(&reservations);

        if conflicts.is_empty() {
            debug!(date = %date, checked = reservations.len(), "No double bookings");
        } else {
            warn!(date = %date, conflicts = conflicts.len(), "Double-booked tables found");
        }
        Ok(conflicts)
    }

    /// NotFound or AlreadyCancelled for a code with no active row.
    async fn missing(&self, code: String) -> ApiError {
        match self.db.reservations().was_cancelled(&code).await {
            Ok(true) => CoreError::AlreadyCancelled(code).into(),
            Ok(false) => CoreError::ReservationNotFound(code).into(),
            Err(e) => e.into(),
        }
    }
}

/// Picks the unit for a changed party size or preference.
///
/// `snapshot` must exclude the reservation's own tables.
fn reseat_unit(
    inventory: &TableInventory,
    current: &Reservation,
    party_size: u32,
    preference: LocationPreference,
    snapshot: &OccupancySnapshot,
) -> ApiResult<(String, Vec<String>)> {
    let refused = || -> ApiError {
        CoreError::SlotUnavailable {
            date: current.date,
            time: current.time,
            party_size,
        }
        .into()
    };

    if let Some(limit) = inventory.seat_limit() {
        if snapshot.seats().saturating_add(party_size) > limit {
            return Err(refused());
        }
    }

    let location = preference.filter();
    let kept = inventory.unit(&current.assigned_unit).filter(|unit| {
        unit.capacity() >= party_size
            && location.map_or(true, |l| unit.location() == l)
            && unit.is_free(snapshot)
    });
    if let Some(unit) = kept {
        return Ok((
            unit.id().to_string(),
            unit.tables().into_iter().map(str::to_string).collect(),
        ));
    }

    let request = SeatingRequest::new(party_size).at(location);
    match Resolver::new(inventory).resolve(request, snapshot) {
        Resolution::Assigned(a) => Ok((a.unit_id, a.tables)),
        Resolution::Unavailable { .. } => Err(refused()),
    }
}

/// `ALC-<base36 millis>-<4 chars>`, entropy taken from the row id.
fn reservation_code(id: &Uuid, at: DateTime<Utc>) -> String {
    let bytes = id.as_bytes();
    let entropy = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let millis = u64::try_from(at.timestamp_millis()).unwrap_or(0);
    generate_code(millis, entropy)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use mesa_core::inventory::house_inventory;
    use mesa_core::types::{format_time, parse_time};
    use mesa_core::{Combination, Contact, Location, PhysicalTable};
    use mesa_db::DbConfig;
    use std::collections::HashSet;

    // Monday 2026-09-14, 10:00 local
    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 9, 14)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 15).unwrap()
    }

    fn sunday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 20).unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        parse_time(s).unwrap()
    }

    fn table(id: &str, capacity: u32, location: Location) -> PhysicalTable {
        PhysicalTable::new(id, capacity, location)
    }

    fn combo(id: &str, components: &[&str], capacity: u32, location: Location) -> Combination {
        Combination::new(id, components, capacity, location)
    }

    fn inventory(tables: Vec<PhysicalTable>, combos: Vec<Combination>) -> TableInventory {
        TableInventory::new(tables, combos).unwrap()
    }

    async fn service(inventory: TableInventory) -> BookingService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        BookingService::new(db, inventory, ServiceSchedule::default()).with_clock(now)
    }

    fn request(guest: u32, date: NaiveDate, time: &str, party_size: u32) -> NewReservation {
        NewReservation {
            contact: Contact {
                first_name: "Lucía".to_string(),
                last_name: "García".to_string(),
                email: format!("guest{}@example.com", guest),
                phone: "612 345 678".to_string(),
            },
            date,
            time: t(time),
            party_size,
            preference: LocationPreference::Indiferente,
            occasion: None,
            allergies: None,
            comments: None,
        }
    }

    fn slot_flag(day: &DayAvailability, time: &str) -> bool {
        day.slots
            .iter()
            .find(|s| s.time == t(time))
            .map(|s| s.available)
            .unwrap()
    }

    async fn assert_disjoint(svc: &BookingService, date: NaiveDate) {
        assert!(svc.verify(date).await.unwrap().is_empty());

        let all = svc.database().reservations().list_confirmed(date).await.unwrap();
        let mut seen = HashSet::new();
        for r in &all {
            for table in &r.consumed_tables {
                assert!(seen.insert((r.time, table.clone())), "{} double-booked", table);
            }
        }
    }

    #[tokio::test]
    async fn test_combination_round_trip() {
        let svc = service(inventory(
            vec![table("m1", 2, Location::Interior), table("m2", 2, Location::Interior)],
            vec![combo("c1", &["m1", "m2"], 4, Location::Interior)],
        ))
        .await;

        let booked = svc.create(request(1, tuesday(), "14:00", 4)).await.unwrap();
        assert_eq!(booked.unit, "c1");
        assert_eq!(booked.tables, vec!["m1", "m2"]);
        assert!(booked.code.starts_with("ALC-"));

        let any = LocationPreference::Indiferente;
        assert!(!svc.check(tuesday(), t("14:00"), 4, any).await.unwrap());
        let grid = svc.slots_for_date(tuesday(), Some(4), any).await.unwrap();
        assert!(!slot_flag(&grid, "14:00"));
        assert!(slot_flag(&grid, "14:30"));

        svc.cancel(&booked.code, None).await.unwrap();

        assert!(svc.check(tuesday(), t("14:00"), 4, any).await.unwrap());
        let grid = svc.slots_for_date(tuesday(), Some(4), any).await.unwrap();
        assert!(slot_flag(&grid, "14:00"));
    }

    #[tokio::test]
    async fn test_direct_booking_breaks_combination() {
        let svc = service(inventory(
            vec![table("m8", 4, Location::Terraza), table("m9", 4, Location::Terraza)],
            vec![combo("c3", &["m8", "m9"], 8, Location::Terraza)],
        ))
        .await;
        let any = LocationPreference::Indiferente;

        let small = svc.create(request(1, tuesday(), "21:00", 4)).await.unwrap();
        assert_eq!(small.unit, "m8");

        assert!(!svc.check(tuesday(), t("21:00"), 8, any).await.unwrap());
        assert!(svc.check(tuesday(), t("21:00"), 4, any).await.unwrap());

        svc.cancel(&small.code, None).await.unwrap();
        assert!(svc.check(tuesday(), t("21:00"), 8, any).await.unwrap());
    }

    #[tokio::test]
    async fn test_shared_component_breaks_every_combination() {
        let svc = service(inventory(
            vec![
                table("t1", 2, Location::Interior),
                table("t2", 2, Location::Interior),
                table("t3", 2, Location::Interior),
            ],
            vec![
                combo("j1", &["t1", "t2"], 4, Location::Interior),
                combo("j2", &["t2", "t3"], 4, Location::Interior),
            ],
        ))
        .await;
        let any = LocationPreference::Indiferente;

        let first = svc.create(request(1, tuesday(), "13:30", 2)).await.unwrap();
        let second = svc.create(request(2, tuesday(), "13:30", 2)).await.unwrap();
        assert_eq!((first.unit.as_str(), second.unit.as_str()), ("t1", "t2"));

        // t2 sits in both combinations
        assert!(!svc.check(tuesday(), t("13:30"), 4, any).await.unwrap());

        svc.cancel(&second.code, None).await.unwrap();
        assert!(svc.check(tuesday(), t("13:30"), 4, any).await.unwrap());

        let big = svc.create(request(3, tuesday(), "13:30", 4)).await.unwrap();
        assert_eq!(big.unit, "j2");
        assert_disjoint(&svc, tuesday()).await;
    }

    #[tokio::test]
    async fn test_smallest_fit_order() {
        let svc = service(inventory(
            vec![
                table("a", 2, Location::Interior),
                table("b", 2, Location::Interior),
                table("t4", 4, Location::Interior),
                table("t6", 6, Location::Interior),
                table("t8", 8, Location::Interior),
            ],
            vec![combo("j4", &["a", "b"], 4, Location::Interior)],
        ))
        .await;

        let mut units = Vec::new();
        for guest in 1..=4 {
            let c = svc.create(request(guest, tuesday(), "20:00", 4)).await.unwrap();
            units.push(c.unit);
        }
        assert_eq!(units, vec!["t4", "j4", "t6", "t8"]);

        let err = svc.create(request(5, tuesday(), "20:00", 4)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_closed_dinner_weekday() {
        let svc = service(house_inventory()).await;

        let grid = svc
            .slots_for_date(sunday(), None, LocationPreference::Indiferente)
            .await
            .unwrap();
        assert!(grid.dinner_closed);
        for slot in &grid.slots {
            assert_eq!(slot.available, slot.period == ServicePeriod::Lunch, "{:?}", slot);
        }
        assert_eq!(grid.slots.len(), 12);

        let err = svc.create(request(1, sunday(), "21:00", 2)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        assert!(!svc
            .check(sunday(), t("21:00"), 2, LocationPreference::Indiferente)
            .await
            .unwrap());
        assert!(svc.create(request(1, sunday(), "14:00", 2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_seat_limit_boundary() {
        let tables = ["t1", "t2", "t3", "t4", "t5"]
            .iter()
            .map(|id| table(id, 2, Location::Interior))
            .collect();
        let svc = service(inventory(tables, vec![]).with_seat_limit(6).unwrap()).await;
        let any = LocationPreference::Indiferente;

        for (guest, party) in [(1, 2), (2, 2), (3, 1)] {
            svc.create(request(guest, tuesday(), "14:00", party)).await.unwrap();
        }
        // 5 of 6 seated
        assert!(svc.check(tuesday(), t("14:00"), 1, any).await.unwrap());
        assert!(!svc.check(tuesday(), t("14:00"), 2, any).await.unwrap());

        svc.create(request(4, tuesday(), "14:00", 1)).await.unwrap();
        // Exactly at the limit
        assert!(!svc.check(tuesday(), t("14:00"), 1, any).await.unwrap());
        let grid = svc.slots_for_date(tuesday(), None, any).await.unwrap();
        assert!(!slot_flag(&grid, "14:00"));

        let err = svc.create(request(5, tuesday(), "14:00", 1)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_tables_stay_disjoint_across_operations() {
        let svc = service(house_inventory()).await;
        let mut codes = Vec::new();

        for (guest, party) in [2, 4, 6, 8, 3, 2, 5, 8, 8, 7].into_iter().enumerate() {
            let guest = u32::try_from(guest).unwrap();
            match svc.create(request(guest, tuesday(), "21:30", party)).await {
                Ok(c) => codes.push(c.code),
                Err(e) => assert_eq!(e.code, ErrorCode::Conflict),
            }
            assert_disjoint(&svc, tuesday()).await;
        }

        for code in codes.iter().step_by(2) {
            svc.cancel(code, Some("plans changed")).await.unwrap();
            assert_disjoint(&svc, tuesday()).await;
        }

        for guest in 20..26 {
            let _ = svc.create(request(guest, tuesday(), "21:30", 4)).await;
            assert_disjoint(&svc, tuesday()).await;
        }
    }

    #[tokio::test]
    async fn test_availability_is_idempotent() {
        let svc = service(house_inventory()).await;
        svc.create(request(1, tuesday(), "14:00", 8)).await.unwrap();
        svc.create(request(2, tuesday(), "20:30", 6)).await.unwrap();

        let any = LocationPreference::Indiferente;
        let first = svc.slots_for_date(tuesday(), Some(6), any).await.unwrap();
        let second = svc.slots_for_date(tuesday(), Some(6), any).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_creates_never_overbook() {
        let svc = service(inventory(
            vec![table("t1", 2, Location::Interior), table("t2", 2, Location::Interior)],
            vec![],
        ))
        .await;

        let handles: Vec<_> = (0..6)
            .map(|guest| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.create(request(guest, tuesday(), "14:00", 2)).await })
            })
            .collect();

        let mut booked = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => booked += 1,
                Err(e) => assert_eq!(e.code, ErrorCode::Conflict),
            }
        }
        assert_eq!(booked, 2);
        assert_disjoint(&svc, tuesday()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_across_slots_on_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("reservations.db")))
            .await
            .unwrap();
        let svc = BookingService::new(db, house_inventory(), ServiceSchedule::default())
            .with_clock(now);
        let times: Vec<NaiveTime> = svc.schedule().slots().map(|(time, _)| time).collect();
        assert_eq!(times.len(), 12);

        // Four parties of two per slot, all slots at once
        let handles: Vec<_> = (0..48u32)
            .map(|guest| {
                let svc = svc.clone();
                let time = format_time(times[guest as usize % times.len()]);
                tokio::spawn(async move { svc.create(request(guest, tuesday(), &time, 2)).await })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(result.is_ok(), "{:?}", result.err());
        }

        assert_eq!(svc.day_stats(tuesday()).await.unwrap().reservations, 48);
        assert_disjoint(&svc, tuesday()).await;
        svc.database().close().await;
    }

    #[tokio::test]
    async fn test_duplicate_booking_rejected() {
        let svc = service(house_inventory()).await;
        svc.create(request(1, tuesday(), "14:00", 2)).await.unwrap();

        let mut again = request(1, tuesday(), "14:00", 3);
        again.contact.email = "  GUEST1@example.com".to_string();
        let err = svc.create(again).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);

        // Same guest, another slot
        assert!(svc.create(request(1, tuesday(), "15:00", 2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_twice_and_unknown() {
        let svc = service(house_inventory()).await;
        let booked = svc.create(request(1, tuesday(), "14:00", 2)).await.unwrap();

        let cancelled = svc.cancel(&booked.code.to_lowercase(), None).await.unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert_eq!(cancelled.consumed_tables, booked.tables);

        let err = svc.cancel(&booked.code, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyCancelled);

        let err = svc.get(&booked.code).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyCancelled);

        let err = svc.cancel("ALC-NOPE-0000", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = svc.cancel("not-a-code", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_update_reassigns_when_party_grows() {
        let svc = service(house_inventory()).await;
        let booked = svc.create(request(1, tuesday(), "14:00", 2)).await.unwrap();
        assert_eq!(booked.unit, "m1");

        let grown = svc
            .update(
                &booked.code,
                ReservationUpdate {
                    party_size: Some(4),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(grown.party_size, 4);
        assert_eq!(grown.assigned_unit, "m5");
        assert_eq!(grown.consumed_tables, vec!["m5"]);

        // m1 is free again
        let next = svc.create(request(2, tuesday(), "14:00", 2)).await.unwrap();
        assert_eq!(next.unit, "m1");

        // Shrinking keeps the current unit
        let shrunk = svc
            .update(
                &booked.code,
                ReservationUpdate {
                    party_size: Some(3),
                    comments: Some("<b>window</b>".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(shrunk.assigned_unit, "m5");
        assert_eq!(shrunk.comments.as_deref(), Some("&lt;b&gt;window&lt;&#x2F;b&gt;"));
        assert_disjoint(&svc, tuesday()).await;
    }

    #[tokio::test]
    async fn test_update_can_use_own_tables() {
        let svc = service(inventory(
            vec![table("t1", 2, Location::Interior), table("t2", 2, Location::Interior)],
            vec![combo("j1", &["t1", "t2"], 4, Location::Interior)],
        ))
        .await;
        let booked = svc.create(request(1, tuesday(), "14:00", 2)).await.unwrap();
        assert_eq!(booked.unit, "t1");

        let grown = svc
            .update(
                &booked.code,
                ReservationUpdate {
                    party_size: Some(4),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(grown.assigned_unit, "j1");
        assert_eq!(grown.consumed_tables, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_update_refused_leaves_record_untouched() {
        let svc = service(inventory(vec![table("t1", 2, Location::Interior)], vec![])).await;
        let booked = svc.create(request(1, tuesday(), "14:00", 2)).await.unwrap();

        let err = svc
            .update(
                &booked.code,
                ReservationUpdate {
                    party_size: Some(4),
                    comments: Some("bringing friends".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);

        let stored = svc.get(&booked.code).await.unwrap();
        assert_eq!(stored.party_size, 2);
        assert_eq!(stored.assigned_unit, "t1");
        assert!(stored.comments.is_none());

        let err = svc
            .update(&booked.code, ReservationUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_location_preference_filters_units() {
        let svc = service(house_inventory()).await;
        let mut req = request(1, tuesday(), "20:00", 3);
        req.preference = LocationPreference::Terraza;

        let booked = svc.create(req).await.unwrap();
        assert_eq!(booked.unit, "m8");
    }

    #[tokio::test]
    async fn test_validation_rejections() {
        let svc = service(house_inventory()).await;

        let too_big = svc.create(request(1, tuesday(), "14:00", 11)).await.unwrap_err();
        assert_eq!(too_big.code, ErrorCode::ValidationError);

        let past = NaiveDate::from_ymd_opt(2026, 9, 13).unwrap();
        let err = svc.create(request(1, past, "14:00", 2)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let off_schedule = svc.create(request(1, tuesday(), "17:00", 2)).await.unwrap_err();
        assert_eq!(off_schedule.code, ErrorCode::ValidationError);

        let mut bad_phone = request(1, tuesday(), "14:00", 2);
        bad_phone.contact.phone = "12".to_string();
        assert_eq!(svc.create(bad_phone).await.unwrap_err().code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_day_stats_split_by_service() {
        let svc = service(house_inventory()).await;
        svc.create(request(1, tuesday(), "13:30", 2)).await.unwrap();
        svc.create(request(2, tuesday(), "13:30", 4)).await.unwrap();
        svc.create(request(3, tuesday(), "21:00", 5)).await.unwrap();

        let stats = svc.day_stats(tuesday()).await.unwrap();
        assert_eq!(stats.reservations, 3);
        assert_eq!(stats.covers, 11);
        assert_eq!(stats.lunch_covers, 6);
        assert_eq!(stats.dinner_covers, 5);
        assert_eq!(stats.slots.len(), 2);
    }

    #[tokio::test]
    async fn test_list_and_get() {
        let svc = service(house_inventory()).await;
        let first = svc.create(request(1, tuesday(), "13:00", 2)).await.unwrap();
        svc.create(request(2, tuesday(), "20:00", 2)).await.unwrap();

        let got = svc.get(&first.code).await.unwrap();
        assert_eq!(got.id, first.reservation_id);
        assert_eq!(got.contact.phone, "612345678");

        let page = svc
            .list(ReservationFilter {
                date: Some(tuesday()),
                search: Some(" guest2 ".to_string()),
                page: 1,
                per_page: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].time, t("20:00"));
    }
}
