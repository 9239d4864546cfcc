//! Revocation registry (token blacklist).
//!
//! Holds token identifiers (`jti`) revoked before their natural expiry. An
//! identifier is only kept until the token it names would have expired anyway.
use crate::clock::SharedClock;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug)]
pub struct RevocationRegistry {
    /// jti -> expiry of the revoked token
    entries: DashMap<String, DateTime<Utc>>,
    clock: SharedClock,
}

impl RevocationRegistry {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Revoke `jti` until `token_expires_at`. Revoking twice keeps the later expiry.
    pub fn revoke(&self, jti: &str, token_expires_at: DateTime<Utc>) {
        self.entries
            .entry(jti.to_string())
            .and_modify(|until| {
                if token_expires_at > *until {
                    *until = token_expires_at;
                }
            })
            .or_insert(token_expires_at);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        let now = self.clock.now();
        let until = self.entries.get(jti).map(|entry| *entry.value());
        if let Some(until) = until {
            if now < until {
                return true;
            }
            // The token is past its own expiry; the entry is dead weight.
            self.entries.remove_if(jti, |_, until| now >= *until);
        }
        false
    }

    /// Drop entries for tokens that have expired naturally
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, until| {
            let keep = now < *until;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
