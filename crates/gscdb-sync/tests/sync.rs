//! Live sync tests: a wiremock API in front of a throwaway Postgres database.

use std::sync::Arc;
use std::time::Duration;

use gscdb_client::{ClientSettings, SearchConsoleClient, TokenProvider};
use gscdb_core::{SyncStatus, TriggerSource};
use gscdb_sync::{SyncRunner, SyncSettings, SyncTrigger, TriggerOutcome};
use sqlx::PgPool;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runner(pool: PgPool, server: &MockServer) -> SyncRunner {
    let client_settings = ClientSettings {
        base_url: server.uri(),
        page_size: 100,
        max_retries: 0,
        backoff_base_ms: 0,
        ..ClientSettings::default()
    };
    let client = SearchConsoleClient::new("test-token", &client_settings)
        .expect("client construction should not fail");
    let settings = SyncSettings {
        batch_size: 1,
        batch_delay: Duration::ZERO,
        ..SyncSettings::default()
    };
    SyncRunner::new(pool, client, settings)
}

async fn mount_sites(server: &MockServer, sites: &[&str], delay: Duration) {
    let entries: Vec<serde_json::Value> = sites
        .iter()
        .map(|s| serde_json::json!({ "siteUrl": s, "permissionLevel": "siteOwner" }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/webmasters/v3/sites"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "siteEntry": entries }))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

async fn mount_rows(server: &MockServer, site_pattern: &str) {
    Mock::given(method("POST"))
        .and(path_regex(format!(
            r"^/webmasters/v3/sites/[^/]*{site_pattern}[^/]*/searchAnalytics/query$"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "rows": [
                { "keys": ["rust orm", "/orm"], "clicks": 4, "impressions": 80, "ctr": 0.05, "position": 6.0 }
            ]
        })))
        .mount(server)
        .await;
}

async fn wait_until_idle(trigger: &SyncTrigger) {
    tokio::time::timeout(Duration::from_secs(20), async {
        while trigger.is_running() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("run should finish");
}

#[sqlx::test(migrations = "../../migrations")]
async fn failing_source_does_not_stop_other_sources(pool: PgPool) {
    let server = MockServer::start().await;
    mount_sites(&server, &["https://a.example/", "https://b.example/"], Duration::ZERO).await;
    Mock::given(method("POST"))
        .and(path_regex(r"a\.example"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .mount(&server)
        .await;
    mount_rows(&server, r"b\.example").await;

    let summary = runner(pool.clone(), &server)
        .run(2, TriggerSource::Cli)
        .await
        .expect("run should finalize");

    assert_eq!(summary.status, SyncStatus::CompletedWithErrors);
    assert_eq!(summary.sources_discovered, 2);
    assert_eq!(summary.sources_synced, 1);
    assert_eq!(summary.total_rows, 2);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("https://a.example/: "));

    let run = gscdb_db::get_sync_run(&pool, summary.run_id).await.unwrap();
    assert_eq!(run.status, "completed_with_errors");
    assert_eq!(run.sources_synced, 1);
    assert_eq!(run.total_rows, 2);
    assert_eq!(run.window_days, 2);
    assert_eq!(run.trigger_source, "cli");
    assert!(run.completed_at.is_some());
    assert!(run.errors.contains("a.example"));
    assert!(!run.errors.contains("b.example"));

    let sources = gscdb_db::list_sources(&pool).await.unwrap();
    let b = sources
        .iter()
        .find(|s| s.site_url == "https://b.example/")
        .expect("b registered");
    assert!(b.last_synced_at.is_some());
    let a = sources
        .iter()
        .find(|s| s.site_url == "https://a.example/")
        .expect("a registered");
    assert!(a.last_synced_at.is_none());

    assert_eq!(gscdb_db::list_facts(&pool, b.id).await.unwrap().len(), 2);
    let rollups = gscdb_db::list_rollups(&pool, b.id).await.unwrap();
    assert_eq!(rollups.len(), 2);
    assert!(rollups.iter().all(|r| r.total_clicks == 4 && r.keyword_count == 1));
}

#[sqlx::test(migrations = "../../migrations")]
async fn all_sources_succeeding_completes_cleanly(pool: PgPool) {
    let server = MockServer::start().await;
    mount_sites(
        &server,
        &["https://a.example/", "https://b.example/", "sc-domain:c.example"],
        Duration::ZERO,
    )
    .await;
    mount_rows(&server, r"example").await;

    let summary = runner(pool.clone(), &server)
        .run(1, TriggerSource::Manual)
        .await
        .unwrap();

    assert_eq!(summary.status, SyncStatus::Completed);
    assert_eq!(summary.sources_synced, 3);
    assert_eq!(summary.total_rows, 3);
    assert!(summary.errors.is_empty());

    let run = gscdb_db::get_sync_run(&pool, summary.run_id).await.unwrap();
    assert_eq!(run.status, "completed");
    assert_eq!(run.errors, "");
}

#[sqlx::test(migrations = "../../migrations")]
async fn discovery_auth_failure_fails_the_run(pool: PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/webmasters/v3/sites"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;

    let summary = runner(pool.clone(), &server)
        .run(7, TriggerSource::Scheduler)
        .await
        .expect("auth failure is recorded, not raised");

    assert_eq!(summary.status, SyncStatus::Failed);
    assert_eq!(summary.sources_synced, 0);
    assert_eq!(summary.errors.len(), 1);

    let runs = gscdb_db::list_sync_runs(&pool, 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "failed");
    assert!(runs[0].errors.contains("authentication failed"));
    assert!(gscdb_db::list_sources(&pool).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn unreadable_credentials_fail_the_run(pool: PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/webmasters/v3/sites"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client_settings = ClientSettings {
        base_url: server.uri(),
        max_retries: 0,
        backoff_base_ms: 0,
        ..ClientSettings::default()
    };
    let client = SearchConsoleClient::with_tokens(
        TokenProvider::service_account_file("/nonexistent/gscdb/service-account.json"),
        &client_settings,
    )
    .expect("credentials are not read at construction");
    let runner = SyncRunner::new(pool.clone(), client, SyncSettings::default());

    let summary = runner
        .run(3, TriggerSource::Cli)
        .await
        .expect("credential failure is recorded, not raised");

    assert_eq!(summary.status, SyncStatus::Failed);
    assert_eq!(summary.sources_discovered, 0);

    let runs = gscdb_db::list_sync_runs(&pool, 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "failed");
    assert!(runs[0].completed_at.is_some());
    assert!(runs[0].errors.contains("cannot use credentials"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn zero_sources_still_completes(pool: PgPool) {
    let server = MockServer::start().await;
    mount_sites(&server, &[], Duration::ZERO).await;

    let summary = runner(pool.clone(), &server)
        .run(7, TriggerSource::Cli)
        .await
        .unwrap();

    assert_eq!(summary.status, SyncStatus::Completed);
    assert_eq!(summary.sources_discovered, 0);
    assert_eq!(summary.total_rows, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn forbidden_source_syncs_with_zero_rows(pool: PgPool) {
    let server = MockServer::start().await;
    mount_sites(&server, &["https://locked.example/"], Duration::ZERO).await;
    Mock::given(method("POST"))
        .and(path_regex(r"locked\.example"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let summary = runner(pool.clone(), &server)
        .run(3, TriggerSource::Cli)
        .await
        .unwrap();

    assert_eq!(summary.status, SyncStatus::Completed);
    assert_eq!(summary.sources_synced, 1);
    assert_eq!(summary.total_rows, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn resync_is_idempotent(pool: PgPool) {
    let server = MockServer::start().await;
    mount_sites(&server, &["https://b.example/"], Duration::ZERO).await;
    mount_rows(&server, r"b\.example").await;

    let runner = runner(pool.clone(), &server);
    runner.run(3, TriggerSource::Cli).await.unwrap();
    runner.run(3, TriggerSource::Cli).await.unwrap();

    let sources = gscdb_db::list_sources(&pool).await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(gscdb_db::list_facts(&pool, sources[0].id).await.unwrap().len(), 3);
    assert_eq!(gscdb_db::list_sync_runs(&pool, 10).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_trigger_is_rejected(pool: PgPool) {
    let server = MockServer::start().await;
    mount_sites(&server, &[], Duration::from_millis(500)).await;

    let trigger = SyncTrigger::new(Arc::new(runner(pool.clone(), &server)));

    assert_eq!(trigger.trigger(7, TriggerSource::Manual), TriggerOutcome::Started);
    assert!(trigger.is_running());
    assert_eq!(
        trigger.trigger(7, TriggerSource::Manual),
        TriggerOutcome::AlreadyRunning
    );
    assert!(trigger.run_if_idle(7, TriggerSource::Scheduler).await.is_none());

    wait_until_idle(&trigger).await;
    assert_eq!(gscdb_db::list_sync_runs(&pool, 10).await.unwrap().len(), 1);

    assert_eq!(trigger.trigger(7, TriggerSource::Manual), TriggerOutcome::Started);
    wait_until_idle(&trigger).await;
    assert_eq!(gscdb_db::list_sync_runs(&pool, 10).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn guard_clears_after_failed_run(pool: PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/webmasters/v3/sites"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let trigger = SyncTrigger::new(Arc::new(runner(pool.clone(), &server)));
    assert_eq!(trigger.trigger(7, TriggerSource::Manual), TriggerOutcome::Started);
    wait_until_idle(&trigger).await;

    let result = trigger
        .run_if_idle(7, TriggerSource::Scheduler)
        .await
        .expect("guard should be free");
    assert_eq!(result.unwrap().status, SyncStatus::Failed);
    assert_eq!(gscdb_db::list_sync_runs(&pool, 10).await.unwrap().len(), 2);
}
