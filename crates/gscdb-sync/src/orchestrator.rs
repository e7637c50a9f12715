//! One end-to-end sync run: discover, fetch and reconcile each source in
//! paced batches, purge expired data, finalize the run ledger entry.

use std::ops::Range;
use std::time::Duration;

use gscdb_client::{Dimension, SearchConsoleClient, SiteEntry, DEFAULT_DIMENSIONS};
use gscdb_core::{AppConfig, SyncStatus, TriggerSource};
use gscdb_db::RunOutcome;
use sqlx::PgPool;

use crate::error::SyncError;
use crate::reconcile::{rebuild, reconcile_day};
use crate::window::SyncWindow;

/// Pacing and retention settings for [`SyncRunner`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub retention_days: u32,
    pub ingestion_lag_days: u32,
    pub dimensions: Vec<Dimension>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_secs(1),
            retention_days: 90,
            ingestion_lag_days: 2,
            dimensions: DEFAULT_DIMENSIONS.to_vec(),
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            retention_days: config.retention_days,
            ingestion_lag_days: config.ingestion_lag_days,
            dimensions: DEFAULT_DIMENSIONS.to_vec(),
        }
    }
}

/// Result of a finished run, mirroring its ledger entry.
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub run_id: i64,
    pub window: SyncWindow,
    pub sources_discovered: usize,
    pub sources_synced: usize,
    pub total_rows: u64,
    pub errors: Vec<String>,
    pub status: SyncStatus,
}

/// A run of consecutive sources synced back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Batch {
    range: Range<usize>,
    /// Wait `batch_delay` before this batch. Never set on the first one.
    pause_before: bool,
}

/// Splits `total` sources into batches of `batch_size` (at least 1).
fn plan_batches(total: usize, batch_size: usize) -> Vec<Batch> {
    let size = batch_size.max(1);
    (0..total)
        .step_by(size)
        .map(|start| Batch {
            range: start..(start + size).min(total),
            pause_before: start > 0,
        })
        .collect()
}

pub struct SyncRunner {
    pool: PgPool,
    client: SearchConsoleClient,
    settings: SyncSettings,
}

impl SyncRunner {
    #[must_use]
    pub fn new(pool: PgPool, client: SearchConsoleClient, settings: SyncSettings) -> Self {
        Self {
            pool,
            client,
            settings,
        }
    }

    /// Runs a full sync over the last `days` available days.
    ///
    /// Every invocation writes exactly one finalized `sync_runs` row. Per-source
    /// failures are recorded in the summary and never abort the run; a failed
    /// discovery finalizes the run as `failed` with no sources synced.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Db`] only when the run ledger itself cannot be
    /// written (creating or finalizing the run).
    pub async fn run(&self, days: u32, trigger: TriggerSource) -> Result<SyncSummary, SyncError> {
        let window = SyncWindow::current(days, self.settings.ingestion_lag_days);
        let window_days = i32::try_from(window.len()).unwrap_or(i32::MAX);

        let run = gscdb_db::create_sync_run(&self.pool, trigger, window_days).await?;
        tracing::info!(
            run_id = run.id,
            public_id = %run.public_id,
            trigger = %trigger,
            start = %window.start,
            end = %window.end,
            "sync run started"
        );

        let sources = match self.client.discover_sources().await {
            Ok(sources) => sources,
            Err(e) => {
                let message = format!("source discovery failed: {e}");
                tracing::error!(run_id = run.id, error = %e, "source discovery failed");
                let outcome = RunOutcome {
                    sources_synced: 0,
                    total_rows: 0,
                    errors: &message,
                    status: SyncStatus::Failed,
                };
                gscdb_db::finalize_sync_run(&self.pool, run.id, &outcome).await?;
                return Ok(SyncSummary {
                    run_id: run.id,
                    window,
                    sources_discovered: 0,
                    sources_synced: 0,
                    total_rows: 0,
                    errors: vec![message],
                    status: SyncStatus::Failed,
                });
            }
        };

        if sources.is_empty() {
            tracing::warn!(run_id = run.id, "no sources discovered; nothing to sync");
        }

        let mut sources_synced: usize = 0;
        let mut total_rows: u64 = 0;
        let mut errors: Vec<String> = Vec::new();

        for batch in plan_batches(sources.len(), self.settings.batch_size) {
            if batch.pause_before && !self.settings.batch_delay.is_zero() {
                tracing::debug!(delay_ms = self.settings.batch_delay.as_millis(), "pausing between batches");
                tokio::time::sleep(self.settings.batch_delay).await;
            }

            for entry in &sources[batch.range] {
                match self.sync_source(entry, &window).await {
                    Ok(rows) => {
                        sources_synced += 1;
                        total_rows += rows;
                        tracing::info!(site_url = %entry.site_url, rows, "source synced");
                    }
                    Err(e) => {
                        tracing::error!(site_url = %entry.site_url, error = %e, "source sync failed");
                        errors.push(format!("{}: {e}", entry.site_url));
                    }
                }
            }
        }

        match gscdb_db::purge_older_than(&self.pool, self.settings.retention_days).await {
            Ok(deleted) => tracing::info!(
                deleted,
                retention_days = self.settings.retention_days,
                "purged expired facts"
            ),
            Err(e) => tracing::error!(error = %e, "retention purge failed"),
        }

        let status = SyncStatus::from_error_count(errors.len());
        let joined = errors.join("\n");
        let outcome = RunOutcome {
            sources_synced: i32::try_from(sources_synced).unwrap_or(i32::MAX),
            total_rows: i64::try_from(total_rows).unwrap_or(i64::MAX),
            errors: &joined,
            status,
        };
        gscdb_db::finalize_sync_run(&self.pool, run.id, &outcome).await?;

        tracing::info!(
            run_id = run.id,
            sources_discovered = sources.len(),
            sources_synced,
            total_rows,
            errors = errors.len(),
            status = %status,
            "sync run finished"
        );

        Ok(SyncSummary {
            run_id: run.id,
            window,
            sources_discovered: sources.len(),
            sources_synced,
            total_rows,
            errors,
            status,
        })
    }

    /// Registers one source, fetches and reconciles each day of `window`,
    /// then rebuilds rollups and stamps the sync time.
    async fn sync_source(&self, entry: &SiteEntry, window: &SyncWindow) -> Result<u64, SyncError> {
        let source_id =
            gscdb_db::upsert_source(&self.pool, &entry.site_url, &entry.permission_level).await?;

        let mut total: u64 = 0;
        for date in window.days() {
            let rows = self
                .client
                .fetch_rows(&entry.site_url, date, date, &self.settings.dimensions)
                .await?;
            total += reconcile_day(&self.pool, source_id, date, &rows).await?;
        }

        rebuild(&self.pool, source_id).await?;
        gscdb_db::mark_synced(&self.pool, source_id).await?;
        Ok(total)
    }
}
