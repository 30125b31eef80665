//! # Validation Module
//!
//! Input rules for booking requests, checked before the resolver runs.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Caller (CLI / web form)                                       │
//! │  └── Type validation (parsing, deserialization)                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Party size, date window, service times                             │
//! │  ├── Contact fields                                                     │
//! │  └── Free text escaping, occasion whitelist                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  └── NOT NULL / UNIQUE / CHECK constraints                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every validator is pure. Anything that depends on "now" takes it as an
//! argument so tests can pin the clock.
//!
//! ## Usage
//! ```rust
//! use mesa_core::validation::{validate_party_size, validate_phone};
//!
//! assert!(validate_party_size(4, 10).is_ok());
//! assert_eq!(validate_phone("612 34 56 78").unwrap(), "612345678");
//! ```

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::ValidationError;
use crate::schedule::ServiceSchedule;
use crate::types::{normalize_email, NewReservation, ReservationUpdate};
use crate::{MAX_ADVANCE_DAYS, MAX_PARTY_ONLINE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Occasions the booking form offers.
pub const OCCASIONS: &[&str] = &[
    "cumpleanos",
    "aniversario",
    "negocios",
    "familia",
    "romantica",
    "otra",
];

/// Prefix of every reservation code.
pub const CODE_PREFIX: &str = "ALC-";

/// Limits applied to online bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingLimits {
    pub max_party_online: u32,
    pub max_advance_days: u32,
}

impl Default for BookingLimits {
    fn default() -> Self {
        BookingLimits {
            max_party_online: MAX_PARTY_ONLINE,
            max_advance_days: MAX_ADVANCE_DAYS,
        }
    }
}

// =============================================================================
// Booking Validators
// =============================================================================

/// Validates the number of guests.
///
/// ## Rules
/// - At least 1
/// - At most `max` (bigger groups must phone the restaurant)
pub fn validate_party_size(party_size: u32, max: u32) -> ValidationResult<()> {
    if party_size == 0 {
        return Err(ValidationError::OutOfRange {
            field: "party_size".to_string(),
            min: 1,
            max: i64::from(max),
        });
    }
    if party_size > max {
        return Err(ValidationError::PartyTooLarge { max });
    }
    Ok(())
}

/// Validates the booking date against today's date.
///
/// ## Rules
/// - Not before `today`
/// - Not more than `max_advance_days` after `today`
pub fn validate_date(date: NaiveDate, today: NaiveDate, max_advance_days: u32) -> ValidationResult<()> {
    if date < today {
        return Err(ValidationError::InPast {
            field: "date".to_string(),
        });
    }
    let latest = today + Duration::days(i64::from(max_advance_days));
    if date > latest {
        return Err(ValidationError::OutOfRange {
            field: "date".to_string(),
            min: 0,
            max: i64::from(max_advance_days),
        });
    }
    Ok(())
}

/// Validates the booking time.
///
/// ## Rules
/// - Must be one of the schedule's service slots
/// - For a booking today, the slot must not have started yet
pub fn validate_time(
    date: NaiveDate,
    time: NaiveTime,
    schedule: &ServiceSchedule,
    now: NaiveDateTime,
) -> ValidationResult<()> {
    if schedule.period_of(time).is_none() {
        let allowed = schedule
            .slots()
            .map(|(t, _)| crate::types::format_time(t))
            .collect();
        return Err(ValidationError::NotAllowed {
            field: "time".to_string(),
            allowed,
        });
    }
    if date == now.date() && time < now.time() {
        return Err(ValidationError::InPast {
            field: "time".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Contact Validators
// =============================================================================

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == ' ' || "áéíóúÁÉÍÓÚñÑüÜ'-().".contains(c)
}

/// Validates a first or last name.
///
/// ## Rules
/// - 2 to 50 characters after trimming
/// - Letters (including Spanish accents), digits, spaces, `' - ( ) .`
///
/// ## Returns
/// The trimmed name.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();
    let len = name.chars().count();

    if len == 0 {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if len > 50 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 50,
        });
    }
    if len < 2 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 2,
            max: 50,
        });
    }
    if !name.chars().all(is_name_char) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "contains characters that are not allowed".to_string(),
        });
    }

    Ok(name.to_string())
}

/// Validates an email address.
///
/// ## Returns
/// `(display, normalized)`: the trimmed address as typed, and the lowercase
/// form used to detect duplicate bookings.
pub fn validate_email(email: &str) -> ValidationResult<(String, String)> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }
    if email.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: 100,
        });
    }

    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "expected name@domain.tld".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let well_formed = !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .rsplit_once('.')
            .map_or(false, |(host, tld)| !host.is_empty() && tld.len() >= 2);
    if !well_formed {
        return Err(invalid());
    }

    Ok((email.to_string(), normalize_email(email)))
}

/// Validates a phone number.
///
/// ## Rules
/// - Spaces, dashes, dots and parentheses are stripped
/// - An optional leading `+`
/// - 9 to 15 digits
///
/// ## Returns
/// The cleaned number.
pub fn validate_phone(phone: &str) -> ValidationResult<String> {
    let cleaned: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && !"-.()".contains(*c))
        .collect();

    if cleaned.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "only digits are allowed".to_string(),
        });
    }
    if !(9..=15).contains(&digits.len()) {
        return Err(ValidationError::OutOfRange {
            field: "phone".to_string(),
            min: 9,
            max: 15,
        });
    }

    Ok(cleaned)
}

// =============================================================================
// Free Text
// =============================================================================

/// Escapes HTML-significant characters in guest-supplied text.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.trim().chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            '\\' => out.push_str("&#x5C;"),
            '`' => out.push_str("&#96;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes optional free text, dropping it when blank.
pub fn sanitize_text(text: Option<&str>, field: &str, max: usize) -> ValidationResult<Option<String>> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(Some(escape_html(text)))
}

/// Keeps the occasion only when it is one the form offers.
///
/// Unknown values are dropped rather than rejected, matching what the
/// booking form has always done.
pub fn normalize_occasion(occasion: Option<&str>) -> Option<String> {
    occasion
        .map(|o| o.trim().to_lowercase())
        .filter(|o| OCCASIONS.contains(&o.as_str()))
}

/// Validates a search query for the admin listing.
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Reservation Codes
// =============================================================================

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

/// Builds a guest-facing code: `ALC-<millis base36>-<4 chars>`.
///
/// The caller supplies both inputs so the function stays deterministic.
pub fn generate_code(timestamp_millis: u64, entropy: u32) -> String {
    let suffix = to_base36(u64::from(entropy) % 36u64.pow(4));
    format!("{}{}-{:0>4}", CODE_PREFIX, to_base36(timestamp_millis), suffix)
}

/// Validates a reservation code as typed by a guest.
///
/// ## Returns
/// The code trimmed and uppercased.
pub fn validate_code(code: &str) -> ValidationResult<String> {
    let code = code.trim().to_uppercase();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }
    if code.len() > 30 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 30,
        });
    }
    let body = code.strip_prefix(CODE_PREFIX).unwrap_or("");
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: format!("expected {}XXXX-XXXX", CODE_PREFIX),
        });
    }

    Ok(code)
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates and sanitizes a whole booking request.
///
/// Returns the cleaned request: trimmed names, normalised phone, escaped
/// free text, whitelisted occasion.
pub fn validate_new_reservation(
    request: &NewReservation,
    limits: &BookingLimits,
    schedule: &ServiceSchedule,
    now: NaiveDateTime,
) -> ValidationResult<NewReservation> {
    let mut clean = request.clone();

    clean.contact.first_name = validate_name("first_name", &request.contact.first_name)?;
    clean.contact.last_name = validate_name("last_name", &request.contact.last_name)?;
    clean.contact.email = validate_email(&request.contact.email)?.0;
    clean.contact.phone = validate_phone(&request.contact.phone)?;

    validate_date(request.date, now.date(), limits.max_advance_days)?;
    validate_time(request.date, request.time, schedule, now)?;
    validate_party_size(request.party_size, limits.max_party_online)?;

    clean.occasion = normalize_occasion(request.occasion.as_deref());
    clean.allergies = sanitize_text(request.allergies.as_deref(), "allergies", 500)?;
    clean.comments = sanitize_text(request.comments.as_deref(), "comments", 500)?;

    Ok(clean)
}

/// Validates the fields present in a partial update.
pub fn validate_update(
    update: &ReservationUpdate,
    limits: &BookingLimits,
) -> ValidationResult<ReservationUpdate> {
    let mut clean = update.clone();

    if let Some(ref v) = update.first_name {
        clean.first_name = Some(validate_name("first_name", v)?);
    }
    if let Some(ref v) = update.last_name {
        clean.last_name = Some(validate_name("last_name", v)?);
    }
    if let Some(ref v) = update.email {
        clean.email = Some(validate_email(v)?.0);
    }
    if let Some(ref v) = update.phone {
        clean.phone = Some(validate_phone(v)?);
    }
    if let Some(n) = update.party_size {
        validate_party_size(n, limits.max_party_online)?;
    }
    if update.occasion.is_some() {
        clean.occasion = normalize_occasion(update.occasion.as_deref());
    }
    if update.allergies.is_some() {
        clean.allergies = sanitize_text(update.allergies.as_deref(), "allergies", 500)?;
    }
    if update.comments.is_some() {
        clean.comments = sanitize_text(update.comments.as_deref(), "comments", 500)?;
    }

    Ok(clean)
}

// =============================================================================
// Unit Tests
// =============================================================================
