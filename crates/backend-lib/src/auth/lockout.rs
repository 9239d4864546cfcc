//! Per-account progressive lockout.
//!
//! Counts consecutive failed logins per email. Reaching the threshold sets a
//! timed lock. Expiry is lazy: [`LockoutTracker::check`] deletes an entry whose
//! lock has passed, so correctness does not depend on the sweep running.
//!
//! Failures below the threshold are forgotten once the account has been quiet
//! for the lock duration, so counters for sprayed or mistyped emails age out.

use super::store::{AttemptStore, MemoryStore};
use crate::clock::SharedClock;
use crate::directory::normalize_email;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

/// Default consecutive failures before a lock
pub const DEFAULT_THRESHOLD: u32 = 5;

/// Default lock duration (30 minutes)
pub const DEFAULT_LOCK_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutEntry {
    pub attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_failure_at: DateTime<Utc>,
}

impl LockoutEntry {
    /// Lock passed, or an unlocked counter idle for longer than `idle`
    fn is_expired(&self, now: DateTime<Utc>, idle: Duration) -> bool {
        match self.locked_until {
            Some(until) => now > until,
            None => now > self.last_failure_at + idle,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockoutStatus {
    pub locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
    pub attempts: u32,
}

#[derive(Debug)]
pub struct LockoutTracker<S = MemoryStore<String, LockoutEntry>> {
    store: S,
    clock: SharedClock,
    threshold: u32,
    lock_duration: Duration,
}

impl LockoutTracker {
    pub fn new(clock: SharedClock, threshold: u32, lock_duration: Duration) -> Self {
        Self::with_store(MemoryStore::new(), clock, threshold, lock_duration)
    }
}

fn account_key(email: &str) -> String {
    normalize_email(email)
}

impl<S: AttemptStore<String, LockoutEntry>> LockoutTracker<S> {
    pub fn with_store(
        store: S,
        clock: SharedClock,
        threshold: u32,
        lock_duration: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            threshold,
            lock_duration,
        }
    }

    /// Record a failed attempt for `email`.
    ///
    /// Attempts keep counting while locked, but an existing lock is never
    /// extended by further knocking.
    pub fn increment(&self, email: &str) -> LockoutStatus {
        let now = self.clock.now();
        let key = account_key(email);
        let threshold = self.threshold;
        let lock_duration = self.lock_duration;

        let status = self.store.modify(&key, |slot| {
            if slot
                .as_ref()
                .is_some_and(|entry| entry.is_expired(now, lock_duration))
            {
                *slot = None;
            }
            let entry = slot.get_or_insert(LockoutEntry {
                attempts: 0,
                locked_until: None,
                last_failure_at: now,
            });
            entry.attempts = entry.attempts.saturating_add(1);
            entry.last_failure_at = now;
            if entry.attempts >= threshold && entry.locked_until.is_none() {
                entry.locked_until = Some(now + lock_duration);
            }
            LockoutStatus {
                locked: entry.locked_until.is_some(),
                locked_until: entry.locked_until,
                attempts: entry.attempts,
            }
        });

        if status.locked && status.attempts == threshold {
            warn!(account = %key, locked_until = ?status.locked_until, "account locked after repeated failures");
        }
        status
    }

    /// Current lock state for `email`; deletes the entry once it has expired.
    pub fn check(&self, email: &str) -> LockoutStatus {
        let now = self.clock.now();
        let key = account_key(email);
        let idle = self.lock_duration;

        self.store.modify(&key, |slot| match slot.as_ref().copied() {
            Some(entry) if entry.is_expired(now, idle) => {
                *slot = None;
                LockoutStatus::default()
            },
            Some(entry) => LockoutStatus {
                locked: entry.locked_until.is_some(),
                locked_until: entry.locked_until,
                attempts: entry.attempts,
            },
            None => LockoutStatus::default(),
        })
    }

    /// Forget all failures for `email`. Called only after a verified login.
    pub fn reset(&self, email: &str) {
        self.store.modify(&account_key(email), |slot| *slot = None);
    }

    /// Remove expired locks and idle counters
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let idle = self.lock_duration;
        self.store.retain(|_, entry| !entry.is_expired(now, idle))
    }

    /// Number of accounts currently tracked
    pub fn tracked(&self) -> usize {
        self.store.len()
    }
}
