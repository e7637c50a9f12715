use std::cmp::Ordering;

use sqlx::PgPool;

use super::{KeywordFilters, KeywordMetricsRow, MoverRow, Movers};
use crate::{days_ago, DbError};

/// Movement smaller than this many positions is treated as noise.
const MIN_POSITION_CHANGE: f64 = 1.0;

// Per-(source, keyword) aggregation over `fact_date >= $1`, optionally limited
// to one source via `$2`.
const KEYWORD_WINDOW_CTE: &str = "WITH kw AS ( \
         SELECT f.source_id, f.keyword, \
                (ARRAY_AGG(f.page ORDER BY f.impressions DESC, f.page))[1] AS page, \
                SUM(f.clicks)::BIGINT AS clicks, \
                SUM(f.impressions)::BIGINT AS impressions, \
                COALESCE(SUM(f.clicks)::float8 / NULLIF(SUM(f.impressions), 0)::float8, 0) AS ctr, \
                COALESCE(SUM(f.position * f.impressions) \
                         / NULLIF(SUM(f.impressions), 0)::float8, 0) AS avg_position \
         FROM search_facts f \
         WHERE f.fact_date >= $1 \
           AND ($2::BIGINT IS NULL OR f.source_id = $2) \
         GROUP BY f.source_id, f.keyword) ";

/// Keywords whose weighted position sits inside `[min_position, max_position]`:
/// close enough to page one to be worth pushing. Ordered by impressions.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_opportunities(
    pool: &PgPool,
    filters: &KeywordFilters,
) -> Result<Vec<KeywordMetricsRow>, DbError> {
    let rows = sqlx::query_as::<_, KeywordMetricsRow>(&format!(
        "{KEYWORD_WINDOW_CTE} \
         SELECT kw.source_id, s.site_url, kw.keyword, kw.page, kw.clicks, kw.impressions, \
                kw.ctr, kw.avg_position \
         FROM kw \
         JOIN sources s ON s.id = kw.source_id \
         WHERE kw.avg_position >= $3 AND kw.avg_position <= $4 \
         ORDER BY kw.impressions DESC, kw.keyword \
         LIMIT $5"
    ))
    .bind(days_ago(filters.days))
    .bind(filters.source_id)
    .bind(filters.min_position)
    .bind(filters.max_position)
    .bind(filters.limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// High-impression keywords with a click-through rate at or below `max_ctr`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_low_ctr(
    pool: &PgPool,
    filters: &KeywordFilters,
) -> Result<Vec<KeywordMetricsRow>, DbError> {
    let rows = sqlx::query_as::<_, KeywordMetricsRow>(&format!(
        "{KEYWORD_WINDOW_CTE} \
         SELECT kw.source_id, s.site_url, kw.keyword, kw.page, kw.clicks, kw.impressions, \
                kw.ctr, kw.avg_position \
         FROM kw \
         JOIN sources s ON s.id = kw.source_id \
         WHERE kw.impressions >= $3 AND kw.ctr <= $4 \
         ORDER BY kw.impressions DESC, kw.keyword \
         LIMIT $5"
    ))
    .bind(days_ago(filters.days))
    .bind(filters.source_id)
    .bind(filters.min_impressions)
    .bind(filters.max_ctr)
    .bind(filters.limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Compares the trailing `days` window with the `days` window immediately
/// before it, per `(source, keyword)`.
///
/// Only keywords present in both windows whose weighted position moved by
/// more than one place are returned. Winners are sorted by improvement
/// (largest first), losers by decline (largest drop first); each list holds
/// at most `limit` rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_movers(
    pool: &PgPool,
    days: u32,
    source_id: Option<i64>,
    limit: usize,
) -> Result<Movers, DbError> {
    let current_start = days_ago(days);
    let previous_start = days_ago(days.saturating_mul(2));

    let rows = sqlx::query_as::<_, MoverRow>(
        "WITH current_window AS ( \
             SELECT source_id, keyword, \
                    COALESCE(SUM(position * impressions) \
                             / NULLIF(SUM(impressions), 0)::float8, 0) AS avg_position, \
                    SUM(clicks)::BIGINT AS clicks, \
                    SUM(impressions)::BIGINT AS impressions \
             FROM search_facts \
             WHERE fact_date >= $1 \
               AND ($3::BIGINT IS NULL OR source_id = $3) \
             GROUP BY source_id, keyword), \
         previous_window AS ( \
             SELECT source_id, keyword, \
                    COALESCE(SUM(position * impressions) \
                             / NULLIF(SUM(impressions), 0)::float8, 0) AS avg_position, \
                    SUM(clicks)::BIGINT AS clicks \
             FROM search_facts \
             WHERE fact_date >= $2 AND fact_date < $1 \
               AND ($3::BIGINT IS NULL OR source_id = $3) \
             GROUP BY source_id, keyword) \
         SELECT c.source_id, s.site_url, c.keyword, \
                c.avg_position AS current_position, \
                p.avg_position AS previous_position, \
                p.avg_position - c.avg_position AS position_change, \
                c.clicks AS current_clicks, \
                p.clicks AS previous_clicks, \
                c.clicks - p.clicks AS click_change, \
                c.impressions AS current_impressions \
         FROM current_window c \
         JOIN previous_window p ON p.source_id = c.source_id AND p.keyword = c.keyword \
         JOIN sources s ON s.id = c.source_id \
         WHERE ABS(p.avg_position - c.avg_position) > $4",
    )
    .bind(current_start)
    .bind(previous_start)
    .bind(source_id)
    .bind(MIN_POSITION_CHANGE)
    .fetch_all(pool)
    .await?;

    Ok(split_movers(rows, limit))
}

/// Partitions mover rows into sorted, capped winner and loser lists.
fn split_movers(rows: Vec<MoverRow>, limit: usize) -> Movers {
    let (mut winners, mut losers): (Vec<MoverRow>, Vec<MoverRow>) = rows
        .into_iter()
        .partition(|r| r.position_change > 0.0);

    winners.sort_by(|a, b| {
        b.position_change
            .partial_cmp(&a.position_change)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    losers.sort_by(|a, b| {
        a.position_change
            .partial_cmp(&b.position_change)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });

    winners.truncate(limit);
    losers.truncate(limit);

    Movers { winners, losers }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mover(keyword: &str, previous: f64, current: f64) -> MoverRow {
        MoverRow {
            source_id: 1,
            site_url: "https://example.com/".to_string(),
            keyword: keyword.to_string(),
            current_position: current,
            previous_position: previous,
            position_change: previous - current,
            current_clicks: 0,
            previous_clicks: 0,
            click_change: 0,
            current_impressions: 0,
        }
    }

    #[test]
    fn winners_sorted_by_largest_improvement() {
        let rows = vec![mover("a", 10.0, 7.0), mover("b", 15.0, 5.0), mover("c", 9.0, 6.5)];
        let movers = split_movers(rows, 10);
        let order: Vec<&str> = movers.winners.iter().map(|r| r.keyword.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert!(movers.losers.is_empty());
    }

    #[test]
    fn losers_sorted_by_largest_drop() {
        let rows = vec![mover("a", 3.0, 6.0), mover("b", 2.0, 12.0)];
        let movers = split_movers(rows, 10);
        let order: Vec<&str> = movers.losers.iter().map(|r| r.keyword.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert!(movers.winners.is_empty());
    }

    #[test]
    fn each_side_is_capped_independently() {
        let rows = vec![
            mover("w1", 20.0, 5.0),
            mover("w2", 20.0, 10.0),
            mover("w3", 20.0, 15.0),
            mover("l1", 5.0, 20.0),
        ];
        let movers = split_movers(rows, 2);
        assert_eq!(movers.winners.len(), 2);
        assert_eq!(movers.losers.len(), 1);
    }
}
