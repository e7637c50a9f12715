//! Database operations for the `sync_runs` ledger.

use chrono::{DateTime, Utc};
use gscdb_core::{SyncStatus, TriggerSource};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `sync_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    pub window_days: i32,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sources_synced: i32,
    pub total_rows: i64,
    /// Newline-joined error messages; empty when the run had none.
    pub errors: String,
}

/// Final counters written when a run ends.
#[derive(Debug, Clone)]
pub struct RunOutcome<'a> {
    pub sources_synced: i32,
    pub total_rows: i64,
    pub errors: &'a str,
    pub status: SyncStatus,
}

const SYNC_RUN_COLUMNS: &str = "id, public_id, trigger_source, window_days, status, started_at, \
     completed_at, sources_synced, total_rows, errors";

/// Appends a new run in `running` status with `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_sync_run(
    pool: &PgPool,
    trigger_source: TriggerSource,
    window_days: i32,
) -> Result<SyncRunRow, DbError> {
    let row = sqlx::query_as::<_, SyncRunRow>(&format!(
        "INSERT INTO sync_runs (public_id, trigger_source, window_days, status) \
         VALUES ($1, $2, $3, 'running') \
         RETURNING {SYNC_RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(trigger_source.as_str())
    .bind(window_days)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Finalizes a `running` run with its outcome and `completed_at = NOW()`.
///
/// A run can be finalized exactly once; finalized rows are never touched again.
///
/// # Errors
///
/// Returns [`DbError::NonTerminalStatus`] if `outcome.status` is `running`,
/// [`DbError::InvalidSyncRunTransition`] if the run is missing or already
/// finalized, or [`DbError::Sqlx`] if the update fails.
pub async fn finalize_sync_run(
    pool: &PgPool,
    id: i64,
    outcome: &RunOutcome<'_>,
) -> Result<(), DbError> {
    if outcome.status == SyncStatus::Running {
        return Err(DbError::NonTerminalStatus(outcome.status.as_str()));
    }

    let result = sqlx::query(
        "UPDATE sync_runs \
         SET status = $1, completed_at = NOW(), sources_synced = $2, total_rows = $3, \
             errors = $4 \
         WHERE id = $5 AND status = 'running'",
    )
    .bind(outcome.status.as_str())
    .bind(outcome.sources_synced)
    .bind(outcome.total_rows)
    .bind(outcome.errors)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSyncRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_sync_run(pool: &PgPool, id: i64) -> Result<SyncRunRow, DbError> {
    sqlx::query_as::<_, SyncRunRow>(&format!(
        "SELECT {SYNC_RUN_COLUMNS} FROM sync_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_runs(pool: &PgPool, limit: i64) -> Result<Vec<SyncRunRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncRunRow>(&format!(
        "SELECT {SYNC_RUN_COLUMNS} FROM sync_runs ORDER BY id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
