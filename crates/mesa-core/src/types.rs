//! # Domain Types
//!
//! Reservation records and the small value types shared by every module.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  Reservation    │   │    SlotKey      │   │    Location     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  date           │   │  Interior       │       │
//! │  │  code (ALC-..)  │   │  time (HH:MM)   │   │  Terraza        │       │
//! │  │  party_size     │   └─────────────────┘   │  Other          │       │
//! │  │  assigned_unit  │                          └─────────────────┘       │
//! │  │  consumed_tables│   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  status         │   │ReservationStatus│   │LocationPreference│      │
//! │  └─────────────────┘   │  Confirmed      │   │  Interior       │       │
//! │                        │  Cancelled      │   │  Terraza        │       │
//! │                        └─────────────────┘   │  Indiferente    │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! - `id`: UUID v4 - immutable, used for database relations
//! - `code`: `ALC-XXXX-XXXX` - what the guest quotes to look up or cancel

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// Time Formatting
// =============================================================================

/// Parses a slot time written as `HH:MM`.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Formats a slot time as `HH:MM`.
pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parses a service date written as `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Serde adapter storing `NaiveTime` as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time '{}', expected HH:MM", raw)))
    }
}

// =============================================================================
// Slot Key
// =============================================================================

/// A (date, time) pair: the unit of contention for bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl SlotKey {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        SlotKey { date, time }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, format_time(self.time))
    }
}

// =============================================================================
// Location
// =============================================================================

/// Where a physical table or combination sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Interior,
    Terraza,
    Other,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Interior => write!(f, "interior"),
            Location::Terraza => write!(f, "terraza"),
            Location::Other => write!(f, "other"),
        }
    }
}

/// The guest's seating preference.
///
/// `Indiferente` means no location filter is applied when resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LocationPreference {
    Interior,
    Terraza,
    #[default]
    Indiferente,
}

impl LocationPreference {
    /// Returns the location filter the resolver should apply.
    pub fn filter(&self) -> Option<Location> {
        match self {
            LocationPreference::Interior => Some(Location::Interior),
            LocationPreference::Terraza => Some(Location::Terraza),
            LocationPreference::Indiferente => None,
        }
    }
}

impl FromStr for LocationPreference {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "interior" => Ok(LocationPreference::Interior),
            "terraza" => Ok(LocationPreference::Terraza),
            "" | "indiferente" => Ok(LocationPreference::Indiferente),
            _ => Err(ValidationError::NotAllowed {
                field: "location".to_string(),
                allowed: vec![
                    "interior".to_string(),
                    "terraza".to_string(),
                    "indiferente".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// Reservation Status
// =============================================================================

/// Lifecycle state of a reservation.
///
/// ```text
/// requested ──► Confirmed ──► Cancelled (terminal)
/// ```
/// A request only becomes a record once it is confirmed, so `requested`
/// never appears in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[default]
    Confirmed,
    Cancelled,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Confirmed => write!(f, "confirmed"),
            ReservationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// =============================================================================
// Contact
// =============================================================================

/// Guest contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Contact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl Contact {
    /// Canonical email used for duplicate detection.
    pub fn email_normalized(&self) -> String {
        normalize_email(&self.email)
    }
}

/// Lowercases and trims an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// =============================================================================
// Reservation
// =============================================================================

/// A confirmed (or cancelled) reservation with its seating outcome.
///
/// `consumed_tables` is exactly the set of physical tables the assignment
/// took: the table itself for a direct booking, every component for a
/// combination. Occupancy snapshots are rebuilt from this field alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reservation {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Guest-facing reservation code.
    pub code: String,

    pub contact: Contact,

    #[ts(as = "String")]
    pub date: NaiveDate,

    #[serde(with = "hhmm")]
    #[ts(as = "String")]
    pub time: NaiveTime,

    pub party_size: u32,

    pub preference: LocationPreference,

    pub occasion: Option<String>,
    pub allergies: Option<String>,
    pub comments: Option<String>,

    /// Id of the table or combination granted.
    pub assigned_unit: String,

    /// Physical table ids consumed by the assignment.
    pub consumed_tables: Vec<String>,

    pub status: ReservationStatus,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// The (date, time) this reservation occupies.
    #[inline]
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.date, self.time)
    }

    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }

    /// Moves a confirmed reservation to `Cancelled`.
    ///
    /// Cancelling twice is an error; there is no way back to `Confirmed`.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status == ReservationStatus::Cancelled {
            return Err(CoreError::AlreadyCancelled(self.code.clone()));
        }
        self.status = ReservationStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Applies descriptive field changes. Party size is handled by the caller
    /// because it may require a new seating assignment.
    pub fn apply_details(&mut self, update: &ReservationUpdate, now: DateTime<Utc>) {
        if let Some(ref v) = update.first_name {
            self.contact.first_name = v.clone();
        }
        if let Some(ref v) = update.last_name {
            self.contact.last_name = v.clone();
        }
        if let Some(ref v) = update.email {
            self.contact.email = v.clone();
        }
        if let Some(ref v) = update.phone {
            self.contact.phone = v.clone();
        }
        if let Some(v) = update.preference {
            self.preference = v;
        }
        if let Some(ref v) = update.occasion {
            self.occasion = Some(v.clone());
        }
        if let Some(ref v) = update.allergies {
            self.allergies = Some(v.clone());
        }
        if let Some(ref v) = update.comments {
            self.comments = Some(v.clone());
        }
        self.updated_at = now;
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Input for creating a reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReservation {
    pub contact: Contact,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub party_size: u32,
    #[serde(default)]
    pub preference: LocationPreference,
    #[serde(default)]
    pub occasion: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl NewReservation {
    #[inline]
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.date, self.time)
    }
}

/// Partial update of an existing reservation.
///
/// Date and time cannot be changed: moving a booking means cancelling it
/// and creating a new one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservationUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub party_size: Option<u32>,
    pub preference: Option<LocationPreference>,
    pub occasion: Option<String>,
    pub allergies: Option<String>,
    pub comments: Option<String>,
}

impl ReservationUpdate {
    /// Returns true when no field is set.
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.party_size.is_none()
            && self.preference.is_none()
            && self.occasion.is_none()
            && self.allergies.is_none()
            && self.comments.is_none()
    }

    /// Names of the fields being changed, for audit logs.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.first_name.is_some() {
            fields.push("first_name");
        }
        if self.last_name.is_some() {
            fields.push("last_name");
        }
        if self.email.is_some() {
            fields.push("email");
        }
        if self.phone.is_some() {
            fields.push("phone");
        }
        if self.party_size.is_some() {
            fields.push("party_size");
        }
        if self.preference.is_some() {
            fields.push("preference");
        }
        if self.occasion.is_some() {
            fields.push("occasion");
        }
        if self.allergies.is_some() {
            fields.push("allergies");
        }
        if self.comments.is_some() {
            fields.push("comments");
        }
        fields
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
