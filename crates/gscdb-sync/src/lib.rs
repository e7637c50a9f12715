//! Sync engine: pulls per-day rows for every discovered source, reconciles
//! them into the store, rebuilds rollups and records the run outcome.

pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod reconcile;
pub mod trigger;
pub mod window;

pub use error::SyncError;
pub use guard::{RunGuard, RunPermit};
pub use orchestrator::{SyncRunner, SyncSettings, SyncSummary};
pub use reconcile::{rebuild, reconcile_day};
pub use trigger::{SyncTrigger, TriggerOutcome};
pub use window::SyncWindow;
