mod insights;
mod sources;
mod sync;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use gscdb_sync::SyncTrigger;
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, RequestId};

/// Longest trailing window any endpoint accepts, in days.
const MAX_WINDOW_DAYS: u32 = 3_650;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub trigger: SyncTrigger,
    /// Window used by `POST /api/v1/sync` when the body names none.
    pub default_sync_days: u32,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, 500)
}

pub(super) fn normalize_days(days: Option<u32>, default: u32) -> u32 {
    days.unwrap_or(default).clamp(1, MAX_WINDOW_DAYS)
}

pub(super) fn map_db_error(request_id: String, error: &gscdb_db::DbError) -> ApiError {
    if matches!(error, gscdb_db::DbError::NotFound) {
        return ApiError::new(request_id, "not_found", "record not found");
    }
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-request-id")])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/overview", get(insights::overview))
        .route("/api/v1/opportunities", get(insights::opportunities))
        .route("/api/v1/movers", get(insights::movers))
        .route("/api/v1/low-ctr", get(insights::low_ctr))
        .route("/api/v1/trends", get(insights::trends))
        .route("/api/v1/sources", get(sources::list_sources))
        .route("/api/v1/sync-runs", get(sync::list_sync_runs))
        .route("/api/v1/sync-runs/{run_id}", get(sync::get_sync_run))
        .route("/api/v1/sync/status", get(sync::sync_status))
        .route("/api/v1/sync", axum::routing::post(sync::trigger_sync))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match gscdb_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{app, get_json};
    use super::*;

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None, 50), 50);
        assert_eq!(normalize_limit(Some(0), 50), 1);
        assert_eq!(normalize_limit(Some(10_000), 50), 500);
        assert_eq!(normalize_limit(Some(25), 50), 25);
    }

    #[test]
    fn normalize_days_applies_defaults_and_bounds() {
        assert_eq!(normalize_days(None, 28), 28);
        assert_eq!(normalize_days(Some(0), 28), 1);
        assert_eq!(normalize_days(Some(100_000), 28), MAX_WINDOW_DAYS);
    }

    #[test]
    fn api_error_codes_map_to_statuses() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = ApiError::new("req-1", "not_found", "missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = ApiError::new("req-1", "internal_error", "boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_reports_database_ok(pool: sqlx::PgPool) {
        let (status, json) = get_json(app(pool, "http://127.0.0.1:9"), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["data"]["database"], "ok");
        assert!(json["meta"]["request_id"].is_string());
    }
}
