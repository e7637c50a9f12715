//! Process-wide single-flight flag for sync runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "run in progress" flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

/// Proof of holding the guard. Dropping it releases the guard, including
/// when the owning task panics or is cancelled.
#[derive(Debug)]
pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the guard if no run is in flight. Never waits.
    #[must_use]
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                running: Arc::clone(&self.running),
            })
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_first_is_held() {
        let guard = RunGuard::new();
        let permit = guard.try_acquire();
        assert!(permit.is_some());
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());
    }

    #[test]
    fn dropping_permit_releases_guard() {
        let guard = RunGuard::new();
        {
            let _permit = guard.try_acquire().unwrap();
            assert!(guard.is_running());
        }
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn clones_share_state() {
        let guard = RunGuard::new();
        let other = guard.clone();
        let _permit = guard.try_acquire().unwrap();
        assert!(other.is_running());
        assert!(other.try_acquire().is_none());
    }

    #[test]
    fn panic_while_holding_permit_releases_guard() {
        let guard = RunGuard::new();
        let cloned = guard.clone();
        let result = std::panic::catch_unwind(move || {
            let _permit = cloned.try_acquire().unwrap();
            panic!("run blew up");
        });
        assert!(result.is_err());
        assert!(!guard.is_running());
    }
}
