//! Writes fetched rows into the store and rebuilds derived rollups.

use chrono::NaiveDate;
use gscdb_client::SearchRow;
use gscdb_db::{recompute_rollup, record_facts, DbError, NewFact};
use sqlx::PgPool;

/// Tags `rows` with `date` and upserts them as facts for `source_id`.
///
/// Returns the number of rows written. Rollups are stale until [`rebuild`]
/// runs for the source.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub async fn reconcile_day(
    pool: &PgPool,
    source_id: i64,
    date: NaiveDate,
    rows: &[SearchRow],
) -> Result<u64, DbError> {
    let facts: Vec<NewFact> = rows.iter().map(|row| to_fact(row, date)).collect();
    let written = record_facts(pool, source_id, &facts).await?;
    tracing::debug!(source_id, %date, rows = written, "reconciled day");
    Ok(written)
}

/// Recomputes every daily rollup for `source_id` from its current facts.
///
/// # Errors
///
/// Returns [`DbError`] if the recompute transaction fails.
pub async fn rebuild(pool: &PgPool, source_id: i64) -> Result<u64, DbError> {
    let days = recompute_rollup(pool, source_id).await?;
    tracing::debug!(source_id, days, "rebuilt rollups");
    Ok(days)
}

fn to_fact(row: &SearchRow, date: NaiveDate) -> NewFact {
    NewFact {
        keyword: row.keyword.clone(),
        page: row.page.clone(),
        fact_date: date,
        clicks: to_count(row.clicks),
        impressions: to_count(row.impressions),
        ctr: finite_or_zero(row.ctr),
        position: finite_or_zero(row.position),
    }
}

/// API counts arrive as JSON numbers; anything negative or non-finite is 0.
#[allow(clippy::cast_possible_truncation)]
fn to_count(value: f64) -> i64 {
    if value.is_finite() && value > 0.0 {
        value.round() as i64
    } else {
        0
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
