//! Database operations for the `sources` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `sources` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRow {
    pub id: i64,
    pub site_url: String,
    pub permission_level: String,
    pub registered_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Registers a source by its unique `site_url`, or refreshes its permission
/// level if it already exists. Returns the stable source `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_source(
    pool: &PgPool,
    site_url: &str,
    permission_level: &str,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO sources (site_url, permission_level) \
         VALUES ($1, $2) \
         ON CONFLICT (site_url) DO UPDATE SET \
             permission_level = EXCLUDED.permission_level \
         RETURNING id",
    )
    .bind(site_url)
    .bind(permission_level)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Stamps `last_synced_at = NOW()` for a source.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no source has the given `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn mark_synced(pool: &PgPool, source_id: i64) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE sources SET last_synced_at = NOW() WHERE id = $1")
        .bind(source_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Fetches a single source by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_source(pool: &PgPool, source_id: i64) -> Result<SourceRow, DbError> {
    sqlx::query_as::<_, SourceRow>(
        "SELECT id, site_url, permission_level, registered_at, last_synced_at \
         FROM sources \
         WHERE id = $1",
    )
    .bind(source_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns every registered source ordered by `site_url`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sources(pool: &PgPool) -> Result<Vec<SourceRow>, DbError> {
    let rows = sqlx::query_as::<_, SourceRow>(
        "SELECT id, site_url, permission_level, registered_at, last_synced_at \
         FROM sources \
         ORDER BY site_url",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
