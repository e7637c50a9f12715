use sqlx::PgPool;

use super::{SourceOverviewRow, TrendPointRow};
use crate::{days_ago, DbError};

/// Totals for every registered source over the trailing `days` window,
/// including sources with no data yet. Ordered by clicks descending.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn overview(pool: &PgPool, days: u32) -> Result<Vec<SourceOverviewRow>, DbError> {
    let rows = sqlx::query_as::<_, SourceOverviewRow>(
        "SELECT s.id AS source_id, s.site_url, s.last_synced_at, \
                COALESCE(SUM(r.total_clicks), 0)::BIGINT AS clicks, \
                COALESCE(SUM(r.total_impressions), 0)::BIGINT AS impressions, \
                COALESCE(SUM(r.total_clicks)::float8 \
                         / NULLIF(SUM(r.total_impressions), 0)::float8, 0) AS ctr, \
                COALESCE(SUM(r.avg_position * r.total_impressions) \
                         / NULLIF(SUM(r.total_impressions), 0)::float8, 0) AS avg_position, \
                COALESCE(MAX(r.keyword_count), 0)::BIGINT AS keyword_count \
         FROM sources s \
         LEFT JOIN daily_rollups r ON r.source_id = s.id AND r.rollup_date >= $1 \
         GROUP BY s.id, s.site_url, s.last_synced_at \
         ORDER BY clicks DESC, s.site_url",
    )
    .bind(days_ago(days))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Daily series for one source, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn source_trends(
    pool: &PgPool,
    source_id: i64,
    days: u32,
) -> Result<Vec<TrendPointRow>, DbError> {
    let rows = sqlx::query_as::<_, TrendPointRow>(
        "SELECT rollup_date, total_clicks, total_impressions, avg_position, avg_ctr, \
                keyword_count \
         FROM daily_rollups \
         WHERE source_id = $1 AND rollup_date >= $2 \
         ORDER BY rollup_date",
    )
    .bind(source_id)
    .bind(days_ago(days))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Daily series summed across all sources, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn all_trends(pool: &PgPool, days: u32) -> Result<Vec<TrendPointRow>, DbError> {
    let rows = sqlx::query_as::<_, TrendPointRow>(
        "SELECT rollup_date, \
                SUM(total_clicks)::BIGINT AS total_clicks, \
                SUM(total_impressions)::BIGINT AS total_impressions, \
                COALESCE(SUM(avg_position * total_impressions) \
                         / NULLIF(SUM(total_impressions), 0)::float8, 0) AS avg_position, \
                COALESCE(SUM(total_clicks)::float8 \
                         / NULLIF(SUM(total_impressions), 0)::float8, 0) AS avg_ctr, \
                SUM(keyword_count)::BIGINT AS keyword_count \
         FROM daily_rollups \
         WHERE rollup_date >= $1 \
         GROUP BY rollup_date \
         ORDER BY rollup_date",
    )
    .bind(days_ago(days))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
