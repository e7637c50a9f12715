//! Background job scheduler.
//!
//! Registers the periodic incremental sync. Firings share the on-demand
//! run guard, so a firing that lands during a run is skipped.

use std::time::Duration;

use gscdb_core::TriggerSource;
use gscdb_sync::SyncTrigger;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    trigger: SyncTrigger,
    interval_hours: u64,
    sync_days: u32,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_sync_job(&scheduler, trigger, interval_hours, sync_days).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

fn sync_interval(hours: u64) -> Duration {
    Duration::from_secs(hours.max(1).saturating_mul(3_600))
}

async fn register_sync_job(
    scheduler: &JobScheduler,
    trigger: SyncTrigger,
    interval_hours: u64,
    sync_days: u32,
) -> Result<(), JobSchedulerError> {
    let interval = sync_interval(interval_hours);

    let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let trigger = trigger.clone();

        Box::pin(async move {
            tracing::info!(days = sync_days, "scheduler: starting incremental sync");
            match trigger.run_if_idle(sync_days, TriggerSource::Scheduler).await {
                None => tracing::info!("scheduler: sync already in flight; skipping this firing"),
                Some(Ok(summary)) => tracing::info!(
                    run_id = summary.run_id,
                    status = %summary.status,
                    sources_synced = summary.sources_synced,
                    total_rows = summary.total_rows,
                    "scheduler: sync finished"
                ),
                Some(Err(e)) => tracing::error!(error = %e, "scheduler: sync failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(interval_hours = interval_hours.max(1), "scheduler: periodic sync registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_in_hours() {
        assert_eq!(sync_interval(6), Duration::from_secs(6 * 3_600));
    }

    #[test]
    fn zero_interval_is_clamped_to_one_hour() {
        assert_eq!(sync_interval(0), Duration::from_secs(3_600));
    }
}
