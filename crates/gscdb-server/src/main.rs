mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use anyhow::Context;
use gscdb_client::SearchConsoleClient;
use gscdb_sync::{SyncRunner, SyncSettings, SyncTrigger};
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = gscdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting gscdb-server");

    let pool_config = gscdb_db::PoolConfig::from_app_config(&config);
    let pool = gscdb_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = gscdb_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let client = SearchConsoleClient::from_app_config(&config)
        .context("failed to build search analytics client")?;
    let runner = SyncRunner::new(pool.clone(), client, SyncSettings::from_app_config(&config));
    let trigger = SyncTrigger::new(Arc::new(runner));

    let _scheduler = scheduler::build_scheduler(
        trigger.clone(),
        config.sync_interval_hours,
        config.sync_days,
    )
    .await?;

    let app = build_app(AppState {
        pool,
        trigger,
        default_sync_days: config.sync_days,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
