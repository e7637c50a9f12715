//! Sync trigger, in-flight status and run history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use gscdb_core::TriggerSource;
use gscdb_db::SyncRunRow;
use gscdb_sync::TriggerOutcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_db_error, normalize_days, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta,
};

const DEFAULT_RUN_LIMIT: i64 = 20;

#[derive(Debug, Default, Deserialize)]
pub(super) struct TriggerSyncBody {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(super) struct TriggerSyncData {
    status: &'static str,
    days: u32,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncStatusData {
    running: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct SyncRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncRunItem {
    run_id: i64,
    public_id: Uuid,
    trigger_source: String,
    window_days: i32,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    sources_synced: i32,
    total_rows: i64,
    errors: Vec<String>,
}

impl From<SyncRunRow> for SyncRunItem {
    fn from(row: SyncRunRow) -> Self {
        Self {
            run_id: row.id,
            public_id: row.public_id,
            trigger_source: row.trigger_source,
            window_days: row.window_days,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            sources_synced: row.sources_synced,
            total_rows: row.total_rows,
            errors: row
                .errors
                .lines()
                .filter(|l| !l.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Starts a background run. Returns 202 when started, 409 when one is
/// already in flight.
pub(super) async fn trigger_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Option<Json<TriggerSyncBody>>,
) -> (StatusCode, Json<ApiResponse<TriggerSyncData>>) {
    let Json(body) = body.unwrap_or_default();
    let days = normalize_days(body.days, state.default_sync_days);

    let outcome = state.trigger.trigger(days, TriggerSource::Manual);
    let status = match outcome {
        TriggerOutcome::Started => StatusCode::ACCEPTED,
        TriggerOutcome::AlreadyRunning => StatusCode::CONFLICT,
    };

    (
        status,
        Json(ApiResponse {
            data: TriggerSyncData {
                status: outcome.as_str(),
                days,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    )
}

pub(super) async fn sync_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<SyncStatusData>> {
    Json(ApiResponse {
        data: SyncStatusData {
            running: state.trigger.is_running(),
        },
        meta: ResponseMeta::new(req_id.0),
    })
}

pub(super) async fn list_sync_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SyncRunsQuery>,
) -> Result<Json<ApiResponse<Vec<SyncRunItem>>>, ApiError> {
    let rows = gscdb_db::list_sync_runs(&state.pool, normalize_limit(query.limit, DEFAULT_RUN_LIMIT))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(SyncRunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_sync_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(run_id): Path<i64>,
) -> Result<Json<ApiResponse<SyncRunItem>>, ApiError> {
    let row = gscdb_db::get_sync_run(&state.pool, run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SyncRunItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}
