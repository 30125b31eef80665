//! # Audit Repository
//!
//! Append-only history of reservation changes.
//!
//! Entries are written inside the same transaction as the change they
//! describe. A cancelled reservation lives on only here: the active row is
//! hard-deleted and its last state is kept as the `CANCEL` entry's
//! `before_data`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

/// Table name recorded for reservation entries.
pub const RESERVATIONS_TABLE: &str = "reservations";

/// What happened to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Update,
    Cancel,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Cancel => "CANCEL",
        }
    }
}

/// One row of `audit_logs`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub table_name: String,
    /// Reservation code.
    pub record_id: String,
    pub action: String,
    pub before_data: Option<String>,
    pub after_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Appends an entry on an open connection or transaction.
pub(crate) async fn write_entry(
    conn: &mut SqliteConnection,
    record_id: &str,
    action: AuditAction,
    before: Option<&serde_json::Value>,
    after: Option<&serde_json::Value>,
) -> DbResult<()> {
    debug!(record_id = %record_id, action = action.as_str(), "Writing audit entry");

    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, table_name, record_id, action, before_data, after_data, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(RESERVATIONS_TABLE)
    .bind(record_id)
    .bind(action.as_str())
    .bind(before.map(|v| v.to_string()))
    .bind(after.map(|v| v.to_string()))
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(())
}

/// Read access to the audit log.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Every entry for a reservation code, oldest first.
    pub async fn for_record(&self, record_id: &str) -> DbResult<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, table_name, record_id, action, before_data, after_data, created_at
            FROM audit_logs
            WHERE table_name = ?1 AND record_id = ?2
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(RESERVATIONS_TABLE)
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// True when at least one entry with `action` exists for the record.
    pub async fn has_action(&self, record_id: &str, action: AuditAction) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM audit_logs
            WHERE table_name = ?1 AND record_id = ?2 AND action = ?3
            "#,
        )
        .bind(RESERVATIONS_TABLE)
        .bind(record_id)
        .bind(action.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }
}
