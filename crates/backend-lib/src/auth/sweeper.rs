//! Periodic removal of expired tracker entries.
//!
//! Lazy expiry keeps every tracker correct on its own; the sweep only bounds
//! memory in a long-running process.
use super::service::AuthService;
use crate::metrics::SWEEP_REMOVED;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Entries removed by one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub rate_limits: usize,
    pub lockouts: usize,
    pub revocations: usize,
    pub sessions: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.rate_limits + self.lockouts + self.revocations + self.sessions
    }
}

pub struct Sweeper {
    auth: Arc<dyn AuthService>,
    in_flight: Mutex<()>,
}

impl Sweeper {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        Self {
            auth,
            in_flight: Mutex::new(()),
        }
    }

    /// Run one pass, or return `None` if another pass is still running.
    pub fn run_once(&self) -> Option<SweepReport> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("previous sweep still running, skipping this tick");
            return None;
        };

        let report = self.auth.sweep_expired();
        counter!(SWEEP_REMOVED, "kind" => "rate_limit").increment(report.rate_limits as u64);
        counter!(SWEEP_REMOVED, "kind" => "lockout").increment(report.lockouts as u64);
        counter!(SWEEP_REMOVED, "kind" => "revocation").increment(report.revocations as u64);
        counter!(SWEEP_REMOVED, "kind" => "session").increment(report.sessions as u64);

        if report.total() > 0 {
            info!(
                rate_limits = report.rate_limits,
                lockouts = report.lockouts,
                revocations = report.revocations,
                sessions = report.sessions,
                "swept expired entries"
            );
        } else {
            debug!("sweep found nothing to remove");
        }
        Some(report)
    }

    /// Sweep every `every` until `shutdown` flips to true (or its sender drops).
    pub fn spawn(self: Arc<Self>, every: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; nothing has expired yet.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let sweeper = Arc::clone(&self);
                        // Sweeps hold std locks briefly; keep them off the async workers.
                        if let Err(err) = tokio::task::spawn_blocking(move || sweeper.run_once()).await {
                            warn!(error = %err, "sweep task failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!("sweeper stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
