//! `sync` command: one foreground run with a printed summary.

use gscdb_client::SearchConsoleClient;
use gscdb_core::{AppConfig, SyncStatus, TriggerSource};
use gscdb_sync::{SyncRunner, SyncSettings, SyncSummary};

/// `--days` wins, then `--initial`, then the incremental default.
pub(crate) fn resolve_days(days: Option<u32>, initial: bool, config: &AppConfig) -> u32 {
    match (days, initial) {
        (Some(days), _) => days,
        (None, true) => config.initial_sync_days,
        (None, false) => config.sync_days,
    }
}

/// Runs a sync and fails unless every source synced cleanly.
pub(crate) async fn run_sync(
    pool: sqlx::PgPool,
    config: &AppConfig,
    days: u32,
) -> anyhow::Result<()> {
    let client = SearchConsoleClient::from_app_config(config)?;
    let runner = SyncRunner::new(pool, client, SyncSettings::from_app_config(config));

    tracing::info!(days, "starting sync from cli");

    let summary = runner.run(days, TriggerSource::Cli).await?;
    print!("{}", render_summary(&summary));

    if summary.status != SyncStatus::Completed {
        anyhow::bail!("sync run {} finished with status {}", summary.run_id, summary.status);
    }
    Ok(())
}

fn render_summary(summary: &SyncSummary) -> String {
    let mut out = format!(
        "run {} ({} to {}): {}\n  sources: {} synced of {} discovered\n  rows: {}\n",
        summary.run_id,
        summary.window.start,
        summary.window.end,
        summary.status,
        summary.sources_synced,
        summary.sources_discovered,
        summary.total_rows,
    );
    if !summary.errors.is_empty() {
        out.push_str("  errors:\n");
        for error in &summary.errors {
            out.push_str("    - ");
            out.push_str(error);
            out.push('\n');
        }
    }
    out
}
