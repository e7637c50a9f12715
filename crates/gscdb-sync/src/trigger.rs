//! On-demand and scheduled entry points that share one [`RunGuard`].

use std::sync::Arc;

use gscdb_core::TriggerSource;

use crate::error::SyncError;
use crate::guard::RunGuard;
use crate::orchestrator::{SyncRunner, SyncSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    AlreadyRunning,
}

impl TriggerOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerOutcome::Started => "started",
            TriggerOutcome::AlreadyRunning => "already_running",
        }
    }
}

#[derive(Clone)]
pub struct SyncTrigger {
    guard: RunGuard,
    runner: Arc<SyncRunner>,
}

impl SyncTrigger {
    #[must_use]
    pub fn new(runner: Arc<SyncRunner>) -> Self {
        Self {
            guard: RunGuard::new(),
            runner,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Starts a run on a background task and returns immediately.
    ///
    /// A request while a run is in flight is rejected, not queued. The
    /// spawned task owns the permit, so the guard clears however the run ends.
    #[must_use]
    pub fn trigger(&self, days: u32, source: TriggerSource) -> TriggerOutcome {
        let Some(permit) = self.guard.try_acquire() else {
            tracing::info!(trigger = %source, "sync already running, request rejected");
            return TriggerOutcome::AlreadyRunning;
        };

        let runner = Arc::clone(&self.runner);
        tokio::spawn(async move {
            let _permit = permit;
            match runner.run(days, source).await {
                Ok(summary) => tracing::info!(
                    run_id = summary.run_id,
                    status = %summary.status,
                    "background sync finished"
                ),
                Err(e) => tracing::error!(error = %e, "background sync failed"),
            }
        });

        TriggerOutcome::Started
    }

    /// Runs inline if no run is in flight; returns `None` when skipped.
    pub async fn run_if_idle(
        &self,
        days: u32,
        source: TriggerSource,
    ) -> Option<Result<SyncSummary, SyncError>> {
        let Some(_permit) = self.guard.try_acquire() else {
            tracing::info!(trigger = %source, "sync already running, skipping");
            return None;
        };
        Some(self.runner.run(days, source).await)
    }
}
