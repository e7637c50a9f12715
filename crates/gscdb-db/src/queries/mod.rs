//! Read-model queries used by `gscdb-server` dashboard endpoints.
//!
//! All windows are trailing and anchored to the current UTC date. Weighted
//! averages fall back to 0 when the impression denominator is 0.

mod keywords;
mod trends;

use chrono::{DateTime, NaiveDate, Utc};

pub use keywords::{list_low_ctr, list_movers, list_opportunities};
pub use trends::{all_trends, overview, source_trends};

/// Per-source totals over a trailing window.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceOverviewRow {
    pub source_id: i64,
    pub site_url: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub clicks: i64,
    pub impressions: i64,
    pub ctr: f64,
    pub avg_position: f64,
    /// Largest single-day distinct keyword count in the window.
    pub keyword_count: i64,
}

/// Aggregated metrics for one `(source, keyword)` pair.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeywordMetricsRow {
    pub source_id: i64,
    pub site_url: String,
    pub keyword: String,
    /// The page with the most impressions for this keyword in the window.
    pub page: String,
    pub clicks: i64,
    pub impressions: i64,
    pub ctr: f64,
    pub avg_position: f64,
}

/// Position and click movement for one keyword between two equal windows.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MoverRow {
    pub source_id: i64,
    pub site_url: String,
    pub keyword: String,
    pub current_position: f64,
    pub previous_position: f64,
    /// `previous_position - current_position`; positive means the keyword moved up.
    pub position_change: f64,
    pub current_clicks: i64,
    pub previous_clicks: i64,
    pub click_change: i64,
    pub current_impressions: i64,
}

/// Winners (improved position) and losers (dropped position).
#[derive(Debug, Clone, Default)]
pub struct Movers {
    pub winners: Vec<MoverRow>,
    pub losers: Vec<MoverRow>,
}

/// One day of a trend series.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrendPointRow {
    pub rollup_date: NaiveDate,
    pub total_clicks: i64,
    pub total_impressions: i64,
    pub avg_position: f64,
    pub avg_ctr: f64,
    pub keyword_count: i64,
}

/// Shared filters for keyword-level queries.
///
/// Each query reads only the fields that apply to it.
#[derive(Debug, Clone)]
pub struct KeywordFilters {
    pub days: u32,
    pub source_id: Option<i64>,
    pub min_position: f64,
    pub max_position: f64,
    pub min_impressions: i64,
    pub max_ctr: f64,
    pub limit: i64,
}

impl Default for KeywordFilters {
    fn default() -> Self {
        Self {
            days: 28,
            source_id: None,
            min_position: 8.0,
            max_position: 20.0,
            min_impressions: 100,
            max_ctr: 0.02,
            limit: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_filter_defaults_target_near_page_one() {
        let filters = KeywordFilters::default();
        assert_eq!(filters.days, 28);
        assert!((filters.min_position - 8.0).abs() < f64::EPSILON);
        assert!((filters.max_position - 20.0).abs() < f64::EPSILON);
        assert_eq!(filters.min_impressions, 100);
        assert!((filters.max_ctr - 0.02).abs() < f64::EPSILON);
        assert!(filters.source_id.is_none());
    }
}
