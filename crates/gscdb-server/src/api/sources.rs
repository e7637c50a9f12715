use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct SourceItem {
    source_id: i64,
    site_url: String,
    permission_level: String,
    registered_at: DateTime<Utc>,
    last_synced_at: Option<DateTime<Utc>>,
}

pub(super) async fn list_sources(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<SourceItem>>>, ApiError> {
    let rows = gscdb_db::list_sources(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| SourceItem {
            source_id: row.id,
            site_url: row.site_url,
            permission_level: row.permission_level,
            registered_at: row.registered_at,
            last_synced_at: row.last_synced_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::super::test_support::{app, get_json};

    #[sqlx::test(migrations = "../../migrations")]
    async fn sources_are_listed(pool: sqlx::PgPool) {
        gscdb_db::upsert_source(&pool, "sc-domain:example.com", "siteFullUser")
            .await
            .expect("upsert source");

        let (status, json) = get_json(app(pool, "http://127.0.0.1:9"), "/api/v1/sources").await;

        assert_eq!(status, StatusCode::OK);
        let rows = json["data"].as_array().expect("data array");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["site_url"], "sc-domain:example.com");
        assert_eq!(rows[0]["permission_level"], "siteFullUser");
        assert!(rows[0]["last_synced_at"].is_null());
    }
}
