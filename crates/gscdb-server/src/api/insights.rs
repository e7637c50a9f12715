//! Read-only analytics endpoints over facts and rollups.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use gscdb_db::{KeywordFilters, KeywordMetricsRow, MoverRow, SourceOverviewRow, TrendPointRow};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    map_db_error, normalize_days, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta,
};

const DEFAULT_KEYWORD_DAYS: u32 = 28;
const DEFAULT_MOVER_DAYS: u32 = 7;
const DEFAULT_TREND_DAYS: u32 = 90;
const DEFAULT_KEYWORD_LIMIT: i64 = 200;
const DEFAULT_MOVER_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct OverviewQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(super) struct OverviewItem {
    source_id: i64,
    site_url: String,
    last_synced_at: Option<DateTime<Utc>>,
    clicks: i64,
    impressions: i64,
    ctr: f64,
    avg_position: f64,
    keyword_count: i64,
}

#[derive(Debug, Serialize, PartialEq)]
pub(super) struct OverviewTotals {
    sources: usize,
    clicks: i64,
    impressions: i64,
    ctr: f64,
    avg_position: f64,
}

#[derive(Debug, Serialize)]
pub(super) struct OverviewData {
    days: u32,
    totals: OverviewTotals,
    sources: Vec<OverviewItem>,
}

impl From<SourceOverviewRow> for OverviewItem {
    fn from(row: SourceOverviewRow) -> Self {
        Self {
            source_id: row.source_id,
            site_url: row.site_url,
            last_synced_at: row.last_synced_at,
            clicks: row.clicks,
            impressions: row.impressions,
            ctr: row.ctr,
            avg_position: row.avg_position,
            keyword_count: row.keyword_count,
        }
    }
}

/// Cross-source totals with impression-weighted position; zeros when there
/// were no impressions.
#[allow(clippy::cast_precision_loss)]
fn overview_totals(rows: &[SourceOverviewRow]) -> OverviewTotals {
    let clicks: i64 = rows.iter().map(|r| r.clicks).sum();
    let impressions: i64 = rows.iter().map(|r| r.impressions).sum();
    let (ctr, avg_position) = if impressions > 0 {
        let weighted: f64 = rows
            .iter()
            .map(|r| r.avg_position * r.impressions as f64)
            .sum();
        (
            clicks as f64 / impressions as f64,
            weighted / impressions as f64,
        )
    } else {
        (0.0, 0.0)
    };

    OverviewTotals {
        sources: rows.len(),
        clicks,
        impressions,
        ctr,
        avg_position,
    }
}

pub(super) async fn overview(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<ApiResponse<OverviewData>>, ApiError> {
    let days = normalize_days(query.days, DEFAULT_KEYWORD_DAYS);
    let rows = gscdb_db::overview(&state.pool, days)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let totals = overview_totals(&rows);
    Ok(Json(ApiResponse {
        data: OverviewData {
            days,
            totals,
            sources: rows.into_iter().map(OverviewItem::from).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

// ---------------------------------------------------------------------------
// Keyword lists
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct OpportunitiesQuery {
    pub days: Option<u32>,
    pub source_id: Option<i64>,
    pub min_pos: Option<f64>,
    pub max_pos: Option<f64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LowCtrQuery {
    pub days: Option<u32>,
    pub source_id: Option<i64>,
    pub min_imp: Option<i64>,
    pub max_ctr: Option<f64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct KeywordItem {
    source_id: i64,
    site_url: String,
    keyword: String,
    page: String,
    clicks: i64,
    impressions: i64,
    ctr: f64,
    avg_position: f64,
}

impl From<KeywordMetricsRow> for KeywordItem {
    fn from(row: KeywordMetricsRow) -> Self {
        Self {
            source_id: row.source_id,
            site_url: row.site_url,
            keyword: row.keyword,
            page: row.page,
            clicks: row.clicks,
            impressions: row.impressions,
            ctr: row.ctr,
            avg_position: row.avg_position,
        }
    }
}

pub(super) async fn opportunities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<OpportunitiesQuery>,
) -> Result<Json<ApiResponse<Vec<KeywordItem>>>, ApiError> {
    let defaults = KeywordFilters::default();
    let filters = KeywordFilters {
        days: normalize_days(query.days, DEFAULT_KEYWORD_DAYS),
        source_id: query.source_id,
        min_position: query.min_pos.unwrap_or(defaults.min_position),
        max_position: query.max_pos.unwrap_or(defaults.max_position),
        limit: normalize_limit(query.limit, DEFAULT_KEYWORD_LIMIT),
        ..defaults
    };
    if filters.min_position > filters.max_position {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "min_pos must not exceed max_pos",
        ));
    }

    let rows = gscdb_db::list_opportunities(&state.pool, &filters)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(KeywordItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn low_ctr(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<LowCtrQuery>,
) -> Result<Json<ApiResponse<Vec<KeywordItem>>>, ApiError> {
    let defaults = KeywordFilters::default();
    let filters = KeywordFilters {
        days: normalize_days(query.days, DEFAULT_KEYWORD_DAYS),
        source_id: query.source_id,
        min_impressions: query.min_imp.unwrap_or(defaults.min_impressions).max(0),
        max_ctr: query.max_ctr.unwrap_or(defaults.max_ctr),
        limit: normalize_limit(query.limit, DEFAULT_KEYWORD_LIMIT),
        ..defaults
    };

    let rows = gscdb_db::list_low_ctr(&state.pool, &filters)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(KeywordItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

// ---------------------------------------------------------------------------
// Movers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct MoversQuery {
    pub days: Option<u32>,
    pub source_id: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct MoverItem {
    source_id: i64,
    site_url: String,
    keyword: String,
    current_position: f64,
    previous_position: f64,
    position_change: f64,
    current_clicks: i64,
    previous_clicks: i64,
    click_change: i64,
    current_impressions: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct MoversData {
    days: u32,
    winners: Vec<MoverItem>,
    losers: Vec<MoverItem>,
}

impl From<MoverRow> for MoverItem {
    fn from(row: MoverRow) -> Self {
        Self {
            source_id: row.source_id,
            site_url: row.site_url,
            keyword: row.keyword,
            current_position: row.current_position,
            previous_position: row.previous_position,
            position_change: row.position_change,
            current_clicks: row.current_clicks,
            previous_clicks: row.previous_clicks,
            click_change: row.click_change,
            current_impressions: row.current_impressions,
        }
    }
}

pub(super) async fn movers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<MoversQuery>,
) -> Result<Json<ApiResponse<MoversData>>, ApiError> {
    let days = normalize_days(query.days, DEFAULT_MOVER_DAYS);
    let limit = usize::try_from(normalize_limit(query.limit, DEFAULT_MOVER_LIMIT)).unwrap_or(1);

    let movers = gscdb_db::list_movers(&state.pool, days, query.source_id, limit)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: MoversData {
            days,
            winners: movers.winners.into_iter().map(MoverItem::from).collect(),
            losers: movers.losers.into_iter().map(MoverItem::from).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct TrendsQuery {
    pub days: Option<u32>,
    pub source_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct TrendPoint {
    date: NaiveDate,
    clicks: i64,
    impressions: i64,
    avg_position: f64,
    avg_ctr: f64,
    keyword_count: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct TrendsData {
    days: u32,
    source_id: Option<i64>,
    /// Source URL, or `"all"` for the cross-source series.
    label: String,
    points: Vec<TrendPoint>,
}

impl From<TrendPointRow> for TrendPoint {
    fn from(row: TrendPointRow) -> Self {
        Self {
            date: row.rollup_date,
            clicks: row.total_clicks,
            impressions: row.total_impressions,
            avg_position: row.avg_position,
            avg_ctr: row.avg_ctr,
            keyword_count: row.keyword_count,
        }
    }
}

pub(super) async fn trends(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<ApiResponse<TrendsData>>, ApiError> {
    let days = normalize_days(query.days, DEFAULT_TREND_DAYS);

    let (label, rows) = match query.source_id {
        Some(source_id) => {
            let source = gscdb_db::get_source(&state.pool, source_id)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            let rows = gscdb_db::source_trends(&state.pool, source_id, days)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            (source.site_url, rows)
        }
        None => {
            let rows = gscdb_db::all_trends(&state.pool, days)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            ("all".to_string(), rows)
        }
    };

    Ok(Json(ApiResponse {
        data: TrendsData {
            days,
            source_id: query.source_id,
            label,
            points: rows.into_iter().map(TrendPoint::from).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
