// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Rate limiting for authentication attempts.
//!
//! Fixed window per client IP. Every call to [`RateLimiter::check`] counts as an
//! attempt, whether or not the credentials later turn out to be valid, so the
//! limiter also throttles probing of accounts that do not exist.

use super::store::{AttemptStore, MemoryStore};
use crate::clock::SharedClock;
use chrono::{DateTime, Duration, Utc};
use std::net::IpAddr;

/// Default number of attempts per window
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default window length (15 minutes)
pub const DEFAULT_WINDOW_SECS: u64 = 15 * 60;

/// Entry in the rate limit map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Attempts counted in the current window
    pub attempts: u32,
    /// When the current window ends
    pub window_reset_at: DateTime<Utc>,
}

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining_attempts: u32,
    pub reset_time: DateTime<Utc>,
}

/// Rate limiter for authentication attempts
#[derive(Debug)]
pub struct RateLimiter<S = MemoryStore<IpAddr, RateLimitEntry>> {
    store: S,
    clock: SharedClock,
    /// Attempts admitted per window
    max_attempts: u32,
    /// Window length
    window: Duration,
}

impl RateLimiter {
    /// Create an in-memory rate limiter
    pub fn new(clock: SharedClock, max_attempts: u32, window: Duration) -> Self {
        Self::with_store(MemoryStore::new(), clock, max_attempts, window)
    }
}

impl<S: AttemptStore<IpAddr, RateLimitEntry>> RateLimiter<S> {
    pub fn with_store(store: S, clock: SharedClock, max_attempts: u32, window: Duration) -> Self {
        Self {
            store,
            clock,
            max_attempts,
            window,
        }
    }

    /// Count an attempt from `ip` and decide whether it may proceed.
    pub fn check(&self, ip: IpAddr) -> RateLimitDecision {
        let now = self.clock.now();
        let max = self.max_attempts;
        let window = self.window;

        self.store.modify(&ip, |slot| {
            // First sight of this IP, or the previous window has rolled over.
            if slot.as_ref().map_or(true, |entry| now > entry.window_reset_at) {
                *slot = None;
            }
            let entry = slot.get_or_insert(RateLimitEntry {
                attempts: 0,
                window_reset_at: now + window,
            });

            let allowed = entry.attempts < max;
            entry.attempts = entry.attempts.saturating_add(1);

            RateLimitDecision {
                allowed,
                remaining_attempts: if allowed { max - entry.attempts } else { 0 },
                reset_time: entry.window_reset_at,
            }
        })
    }

    /// Remove entries whose window has already ended
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        self.store.retain(|_, entry| now <= entry.window_reset_at)
    }

    /// Number of IPs currently tracked
    pub fn tracked(&self) -> usize {
        self.store.len()
    }
}
