//! # Reservation Repository
//!
//! Storage for confirmed reservations and their seating outcome.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert_checked(slot, decide)                                           │
//! │     BEGIN IMMEDIATE                                                     │
//! │     ├── SELECT confirmed rows at (date, time)                           │
//! │     ├── decide(rows)  ── Err ──► ROLLBACK, error returned               │
//! │     ├── INSERT reservation                                              │
//! │     ├── INSERT audit CREATE                                             │
//! │     COMMIT                                                              │
//! │                                                                         │
//! │  update_checked(code, apply)                                            │
//! │     BEGIN IMMEDIATE ── SELECT row ── SELECT other rows at its slot      │
//! │           ── apply ── UPDATE ── audit UPDATE ── COMMIT                  │
//! │                                                                         │
//! │  cancel(code)                                                           │
//! │     BEGIN IMMEDIATE ── SELECT row ── DELETE ── audit CANCEL ── COMMIT   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The capacity check and the insert share one transaction that holds the
//! write lock from its first statement, so what the decision saw is what
//! the commit writes against. Callers that also hold
//! a per-slot lock get full serialization per (date, time).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, AuditAction, AuditRepository};
use mesa_core::types::{format_time, parse_date, parse_time};
use mesa_core::{Contact, LocationPreference, Reservation, ReservationStatus};

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, code,
        first_name, last_name, email, phone,
        date, time, party_size,
        location, occasion, allergies, comments,
        assigned_unit, consumed_tables,
        status, created_at, updated_at
    FROM reservations
"#;

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct ReservationRow {
    id: String,
    code: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    date: String,
    time: String,
    party_size: i64,
    location: LocationPreference,
    occasion: Option<String>,
    allergies: Option<String>,
    comments: Option<String>,
    assigned_unit: String,
    consumed_tables: String,
    status: ReservationStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = DbError;

    fn try_from(row: ReservationRow) -> DbResult<Self> {
        let date = parse_date(&row.date)
            .ok_or_else(|| DbError::corrupt(&row.id, format!("bad date '{}'", row.date)))?;
        let time = parse_time(&row.time)
            .ok_or_else(|| DbError::corrupt(&row.id, format!("bad time '{}'", row.time)))?;
        let party_size = u32::try_from(row.party_size)
            .map_err(|_| DbError::corrupt(&row.id, format!("bad party size {}", row.party_size)))?;
        let consumed_tables: Vec<String> = serde_json::from_str(&row.consumed_tables)
            .map_err(|e| DbError::corrupt(&row.id, format!("bad consumed_tables: {}", e)))?;

        Ok(Reservation {
            id: row.id,
            code: row.code,
            contact: Contact {
                first_name: row.first_name,
                last_name: row.last_name,
                email: row.email,
                phone: row.phone,
            },
            date,
            time,
            party_size,
            preference: row.location,
            occasion: row.occasion,
            allergies: row.allergies,
            comments: row.comments,
            assigned_unit: row.assigned_unit,
            consumed_tables,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_reservations(rows: Vec<ReservationRow>) -> DbResult<Vec<Reservation>> {
    rows.into_iter().map(Reservation::try_from).collect()
}

// =============================================================================
// Listing Types
// =============================================================================

/// Filter for the admin listing.
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub date: Option<NaiveDate>,
    pub status: Option<ReservationStatus>,
    /// Matched against code, names, email and phone.
    pub search: Option<String>,
    /// 1-based.
    pub page: u32,
    pub per_page: u32,
}

impl ReservationFilter {
    fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, 100))
    }

    fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Confirmed bookings and covers at one time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStats {
    #[serde(with = "mesa_core::types::hhmm")]
    pub time: NaiveTime,
    pub reservations: u32,
    pub covers: u32,
}

/// Outcome of a cancellation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// Row removed; the returned record carries status `Cancelled`.
    Cancelled(Reservation),
    /// The code was cancelled earlier.
    AlreadyCancelled,
    /// No reservation ever had this code.
    NotFound,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for reservation database operations.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    pool: SqlitePool,
}

impl ReservationRepository {
    /// Creates a new ReservationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReservationRepository { pool }
    }

    /// Write transaction that holds the database write lock from the start.
    ///
    /// A deferred `BEGIN` upgrades on first write and fails with
    /// `SQLITE_BUSY` if another writer committed after our read.
    async fn begin_write(&self) -> DbResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Every confirmed reservation on a date, ordered by time then creation.
    pub async fn list_confirmed(&self, date: NaiveDate) -> DbResult<Vec<Reservation>> {
        let sql = format!(
            "{} WHERE date = ?1 AND status = 'confirmed' ORDER BY time ASC, created_at ASC, rowid ASC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(date.to_string())
            .fetch_all(&self.pool)
            .await?;

        debug!(date = %date, count = rows.len(), "Loaded confirmed reservations");
        into_reservations(rows)
    }

    /// Confirmed reservations at one slot.
    pub async fn list_confirmed_at(&self, date: NaiveDate, time: NaiveTime) -> DbResult<Vec<Reservation>> {
        let mut conn = self.pool.acquire().await?;
        confirmed_at(&mut conn, date, time, None).await
    }

    /// Gets a reservation by its guest-facing code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Reservation>> {
        let mut conn = self.pool.acquire().await?;
        by_code(&mut conn, code).await
    }

    /// Reads the slot and inserts a reservation in one transaction.
    ///
    /// `decide` sees every confirmed reservation at `(date, time)` and
    /// returns the record to insert, or an error that aborts the whole
    /// transaction. Nothing is written unless `decide` succeeds.
    pub async fn insert_checked<F, E>(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        decide: F,
    ) -> Result<Reservation, E>
    where
        F: FnOnce(&[Reservation]) -> Result<Reservation, E>,
        E: From<DbError>,
    {
        let mut tx = self.begin_write().await?;

        let existing = confirmed_at(&mut tx, date, time, None).await?;
        let record = decide(&existing)?;

        debug!(
            code = %record.code,
            date = %record.date,
            time = %format_time(record.time),
            party_size = record.party_size,
            unit = %record.assigned_unit,
            "Inserting reservation"
        );

        insert_row(&mut tx, &record).await?;
        let after = serde_json::to_value(&record).map_err(DbError::from)?;
        audit::write_entry(&mut tx, &record.code, AuditAction::Create, None, Some(&after)).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(code = %record.code, unit = %record.assigned_unit, "Reservation stored");
        Ok(record)
    }

    /// Reads a reservation and its slot neighbours, applies a change and
    /// writes it back in one transaction.
    ///
    /// `apply` receives the current record and every OTHER confirmed
    /// reservation at the same slot. Returns `Ok(None)` when the code does
    /// not exist.
    pub async fn update_checked<F, E>(&self, code: &str, apply: F) -> Result<Option<Reservation>, E>
    where
        F: FnOnce(Reservation, &[Reservation]) -> Result<Reservation, E>,
        E: From<DbError>,
    {
        let mut tx = self.begin_write().await?;

        let Some(current) = by_code(&mut tx, code).await? else {
            return Ok(None);
        };
        let others = confirmed_at(&mut tx, current.date, current.time, Some(&current.id)).await?;

        let before = serde_json::to_value(&current).map_err(DbError::from)?;
        let updated = apply(current, &others)?;
        let after = serde_json::to_value(&updated).map_err(DbError::from)?;

        sqlx::query(
            r#"
            UPDATE reservations SET
                first_name = ?2,
                last_name = ?3,
                email = ?4,
                email_normalized = ?5,
                phone = ?6,
                party_size = ?7,
                location = ?8,
                occasion = ?9,
                allergies = ?10,
                comments = ?11,
                assigned_unit = ?12,
                consumed_tables = ?13,
                updated_at = ?14
            WHERE id = ?1
            "#,
        )
        .bind(&updated.id)
        .bind(&updated.contact.first_name)
        .bind(&updated.contact.last_name)
        .bind(&updated.contact.email)
        .bind(updated.contact.email_normalized())
        .bind(&updated.contact.phone)
        .bind(i64::from(updated.party_size))
        .bind(updated.preference)
        .bind(&updated.occasion)
        .bind(&updated.allergies)
        .bind(&updated.comments)
        .bind(&updated.assigned_unit)
        .bind(serde_json::to_string(&updated.consumed_tables).map_err(DbError::from)?)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        audit::write_entry(&mut tx, &updated.code, AuditAction::Update, Some(&before), Some(&after))
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(code = %updated.code, unit = %updated.assigned_unit, "Reservation updated");
        Ok(Some(updated))
    }

    /// Cancels a reservation: hard delete plus a `CANCEL` audit copy.
    ///
    /// Once the row is gone its tables drop out of every later snapshot.
    pub async fn cancel(&self, code: &str, reason: Option<&str>) -> DbResult<CancelOutcome> {
        let mut tx = self.begin_write().await?;

        let Some(mut record) = by_code(&mut tx, code).await? else {
            drop(tx);
            return if self.was_cancelled(code).await? {
                Ok(CancelOutcome::AlreadyCancelled)
            } else {
                Ok(CancelOutcome::NotFound)
            };
        };

        if record.status == ReservationStatus::Cancelled {
            return Ok(CancelOutcome::AlreadyCancelled);
        }

        sqlx::query("DELETE FROM reservations WHERE id = ?1")
            .bind(&record.id)
            .execute(&mut *tx)
            .await?;

        record.status = ReservationStatus::Cancelled;
        record.updated_at = Utc::now();

        let mut before = serde_json::to_value(&record)?;
        if let (Some(obj), Some(reason)) = (before.as_object_mut(), reason) {
            obj.insert("cancel_reason".to_string(), serde_json::Value::from(reason));
        }
        audit::write_entry(&mut tx, &record.code, AuditAction::Cancel, Some(&before), None).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            code = %record.code,
            tables = ?record.consumed_tables,
            "Reservation cancelled, tables released"
        );
        Ok(CancelOutcome::Cancelled(record))
    }

    /// True when the audit log shows this code was cancelled.
    pub async fn was_cancelled(&self, code: &str) -> DbResult<bool> {
        AuditRepository::new(self.pool.clone())
            .has_action(code, AuditAction::Cancel)
            .await
    }

    /// Paginated admin listing.
    pub async fn list(&self, filter: &ReservationFilter) -> DbResult<Page<Reservation>> {
        let date = filter.date.map(|d| d.to_string());
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        // Unset filters bind NULL and match everything
        let predicate = r#"
            WHERE (?1 IS NULL OR date = ?1)
              AND (?2 IS NULL OR status = ?2)
              AND (?3 IS NULL
                   OR lower(code) LIKE ?3
                   OR lower(first_name) LIKE ?3
                   OR lower(last_name) LIKE ?3
                   OR email_normalized LIKE ?3
                   OR phone LIKE ?3)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM reservations {}", predicate))
            .bind(&date)
            .bind(filter.status)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "{} {} ORDER BY date ASC, time ASC, created_at ASC, rowid ASC LIMIT ?4 OFFSET ?5",
            SELECT_COLUMNS, predicate
        );
        let rows = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(&date)
            .bind(filter.status)
            .bind(&search)
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: into_reservations(rows)?,
            total: u64::try_from(total).unwrap_or(0),
            page: filter.page.max(1),
            per_page: filter.per_page.clamp(1, 100),
        })
    }

    /// Confirmed bookings and covers per time on a date.
    pub async fn day_stats(&self, date: NaiveDate) -> DbResult<Vec<SlotStats>> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT time, COUNT(*), COALESCE(SUM(party_size), 0)
            FROM reservations
            WHERE date = ?1 AND status = 'confirmed'
            GROUP BY time
            ORDER BY time ASC
            "#,
        )
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(time, count, covers)| {
                Ok(SlotStats {
                    time: parse_time(&time)
                        .ok_or_else(|| DbError::corrupt(date.to_string(), format!("bad time '{}'", time)))?,
                    reservations: u32::try_from(count).unwrap_or(u32::MAX),
                    covers: u32::try_from(covers).unwrap_or(u32::MAX),
                })
            })
            .collect()
    }
}

// =============================================================================
// Connection-Level Helpers
// =============================================================================
// Shared by pool reads and transactional writes.

async fn confirmed_at(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    time: NaiveTime,
    exclude_id: Option<&str>,
) -> DbResult<Vec<Reservation>> {
    let sql = format!(
        "{} WHERE date = ?1 AND time = ?2 AND status = 'confirmed' AND (?3 IS NULL OR id <> ?3) \
         ORDER BY created_at ASC, rowid ASC",
        SELECT_COLUMNS
    );
    let rows = sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(date.to_string())
        .bind(format_time(time))
        .bind(exclude_id)
        .fetch_all(&mut *conn)
        .await?;
    into_reservations(rows)
}

async fn by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<Reservation>> {
    let sql = format!("{} WHERE code = ?1", SELECT_COLUMNS);
    let row = sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(Reservation::try_from).transpose()
}

async fn insert_row(conn: &mut SqliteConnection, r: &Reservation) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO reservations (
            id, code,
            first_name, last_name, email, email_normalized, phone,
            date, time, party_size,
            location, occasion, allergies, comments,
            assigned_unit, consumed_tables,
            status, created_at, updated_at
        ) VALUES (
            ?1, ?2,
            ?3, ?4, ?5, ?6, ?7,
            ?8, ?9, ?10,
            ?11, ?12, ?13, ?14,
            ?15, ?16,
            ?17, ?18, ?19
        )
        "#,
    )
    .bind(&r.id)
    .bind(&r.code)
    .bind(&r.contact.first_name)
    .bind(&r.contact.last_name)
    .bind(&r.contact.email)
    .bind(r.contact.email_normalized())
    .bind(&r.contact.phone)
    .bind(r.date.to_string())
    .bind(format_time(r.time))
    .bind(i64::from(r.party_size))
    .bind(r.preference)
    .bind(&r.occasion)
    .bind(&r.allergies)
    .bind(&r.comments)
    .bind(&r.assigned_unit)
    .bind(serde_json::to_string(&r.consumed_tables)?)
    .bind(r.status)
    .bind(r.created_at)
    .bind(r.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
