//! Daily rollups derived from `search_facts`.

use chrono::NaiveDate;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `daily_rollups` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyRollupRow {
    pub source_id: i64,
    pub rollup_date: NaiveDate,
    pub total_clicks: i64,
    pub total_impressions: i64,
    /// Impression-weighted mean position; 0 when there were no impressions.
    pub avg_position: f64,
    /// `total_clicks / total_impressions`; 0 when there were no impressions.
    pub avg_ctr: f64,
    pub keyword_count: i64,
}

/// Re-derives every daily rollup for `source_id` from its current facts.
///
/// Runs in one transaction: rollup rows for dates that no longer have facts
/// are removed, then every `(source_id, date)` group is written over any
/// existing rollup. Returns the number of rollup rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either statement fails; nothing is applied.
pub async fn recompute_rollup(pool: &PgPool, source_id: i64) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM daily_rollups r \
         WHERE r.source_id = $1 \
           AND NOT EXISTS ( \
               SELECT 1 FROM search_facts f \
               WHERE f.source_id = r.source_id AND f.fact_date = r.rollup_date)",
    )
    .bind(source_id)
    .execute(&mut *tx)
    .await?;

    let written = sqlx::query(
        "INSERT INTO daily_rollups \
             (source_id, rollup_date, total_clicks, total_impressions, \
              avg_position, avg_ctr, keyword_count) \
         SELECT source_id, fact_date, \
                SUM(clicks)::BIGINT, \
                SUM(impressions)::BIGINT, \
                COALESCE(SUM(position * impressions) / NULLIF(SUM(impressions), 0)::float8, 0), \
                COALESCE(SUM(clicks)::float8 / NULLIF(SUM(impressions), 0)::float8, 0), \
                COUNT(DISTINCT keyword) \
         FROM search_facts \
         WHERE source_id = $1 \
         GROUP BY source_id, fact_date \
         ON CONFLICT (source_id, rollup_date) DO UPDATE SET \
             total_clicks      = EXCLUDED.total_clicks, \
             total_impressions = EXCLUDED.total_impressions, \
             avg_position      = EXCLUDED.avg_position, \
             avg_ctr           = EXCLUDED.avg_ctr, \
             keyword_count     = EXCLUDED.keyword_count",
    )
    .bind(source_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok(written)
}

/// Returns all rollups for a source ordered by date.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_rollups(pool: &PgPool, source_id: i64) -> Result<Vec<DailyRollupRow>, DbError> {
    let rows = sqlx::query_as::<_, DailyRollupRow>(
        "SELECT source_id, rollup_date, total_clicks, total_impressions, avg_position, \
                avg_ctr, keyword_count \
         FROM daily_rollups \
         WHERE source_id = $1 \
         ORDER BY rollup_date",
    )
    .bind(source_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
