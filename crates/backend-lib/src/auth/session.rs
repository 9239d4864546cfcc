// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Session registry.
//!
//! One record per issued refresh token. Only the SHA-256 of the refresh token is
//! stored; the raw token never leaves the client and the token service.
use crate::clock::SharedClock;
use crate::metrics::SESSIONS_ACTIVE;
use chrono::{DateTime, Duration, Utc};
use metrics::gauge;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::net::IpAddr;
use taller_common::SessionSummary;
use uuid::Uuid;

/// Default inactivity threshold before a session is reported stale (24 hours)
pub const DEFAULT_INACTIVITY_SECS: u64 = 24 * 60 * 60;

/// Session information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: String,
    /// Hex SHA-256 of the current refresh token
    pub refresh_token_hash: String,
    pub issuing_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// A live session plus its staleness flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub record: SessionRecord,
    pub stale: bool,
}

impl From<SessionView> for SessionSummary {
    fn from(view: SessionView) -> Self {
        let SessionView { record, stale } = view;
        SessionSummary {
            id: record.id,
            user_id: record.user_id,
            issuing_ip: record.issuing_ip.map(|ip| ip.to_string()),
            user_agent: record.user_agent,
            created_at: record.created_at,
            expires_at: record.expires_at,
            last_used_at: record.last_used_at,
            stale,
        }
    }
}

/// Hash a refresh token for storage and lookup
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Default)]
struct Sessions {
    by_id: HashMap<Uuid, SessionRecord>,
    by_hash: HashMap<String, Uuid>,
}

impl Sessions {
    fn remove(&mut self, id: &Uuid) -> Option<SessionRecord> {
        let record = self.by_id.remove(id)?;
        self.by_hash.remove(&record.refresh_token_hash);
        Some(record)
    }
}

/// Session manager for refresh-token sessions
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<Sessions>,
    clock: SharedClock,
    /// Sessions unused for longer than this are reported stale
    inactivity: Duration,
}

impl SessionRegistry {
    pub fn new(clock: SharedClock, inactivity: Duration) -> Self {
        Self {
            sessions: RwLock::new(Sessions::default()),
            clock,
            inactivity,
        }
    }

    pub fn insert(&self, record: SessionRecord) {
        let mut sessions = self.sessions.write();
        if let Some(previous) = sessions.by_id.get(&record.id).cloned() {
            sessions.by_hash.remove(&previous.refresh_token_hash);
        }
        sessions
            .by_hash
            .insert(record.refresh_token_hash.clone(), record.id);
        sessions.by_id.insert(record.id, record);
        gauge!(SESSIONS_ACTIVE).set(sessions.by_id.len() as f64);
    }

    /// Look up an unexpired session by refresh token hash
    pub fn find(&self, refresh_token_hash: &str) -> Option<SessionRecord> {
        let now = self.clock.now();
        let sessions = self.sessions.read();
        let id = sessions.by_hash.get(refresh_token_hash)?;
        sessions
            .by_id
            .get(id)
            .filter(|record| now < record.expires_at)
            .cloned()
    }

    pub fn find_by_id(&self, id: Uuid) -> Option<SessionRecord> {
        let now = self.clock.now();
        self.sessions
            .read()
            .by_id
            .get(&id)
            .filter(|record| now < record.expires_at)
            .cloned()
    }

    /// Whether the session exists and has not expired
    pub fn is_live(&self, id: Uuid) -> bool {
        self.find_by_id(id).is_some()
    }

    /// Mark the session as used now
    pub fn touch(&self, id: Uuid) -> bool {
        let now = self.clock.now();
        match self.sessions.write().by_id.get_mut(&id) {
            Some(record) => {
                record.last_used_at = now;
                true
            },
            None => false,
        }
    }

    /// Swap the stored refresh hash, but only if it still equals `old_hash`.
    ///
    /// Two concurrent refreshes with the same token race here; exactly one wins.
    pub fn rotate(
        &self,
        id: Uuid,
        old_hash: &str,
        new_hash: String,
        new_expires_at: DateTime<Utc>,
    ) -> bool {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let Some(record) = sessions.by_id.get_mut(&id) else {
            return false;
        };
        if record.refresh_token_hash != old_hash || now >= record.expires_at {
            return false;
        }
        record.refresh_token_hash = new_hash.clone();
        record.expires_at = new_expires_at;
        record.last_used_at = now;
        sessions.by_hash.remove(old_hash);
        sessions.by_hash.insert(new_hash, id);
        true
    }

    pub fn terminate(&self, id: Uuid) -> Option<SessionRecord> {
        let mut sessions = self.sessions.write();
        let removed = sessions.remove(&id);
        gauge!(SESSIONS_ACTIVE).set(sessions.by_id.len() as f64);
        removed
    }

    /// Terminate every session owned by `user_id`
    pub fn terminate_user(&self, user_id: &str) -> usize {
        let mut sessions = self.sessions.write();
        let ids: Vec<Uuid> = sessions
            .by_id
            .values()
            .filter(|record| record.user_id == user_id)
            .map(|record| record.id)
            .collect();
        for id in &ids {
            sessions.remove(id);
        }
        gauge!(SESSIONS_ACTIVE).set(sessions.by_id.len() as f64);
        ids.len()
    }

    /// Unexpired sessions for `user_id`, oldest first
    pub fn list_active(&self, user_id: &str) -> Vec<SessionView> {
        let now = self.clock.now();
        let mut views: Vec<SessionView> = self
            .sessions
            .read()
            .by_id
            .values()
            .filter(|record| record.user_id == user_id && now < record.expires_at)
            .map(|record| SessionView {
                stale: now - record.last_used_at > self.inactivity,
                record: record.clone(),
            })
            .collect();
        views.sort_by_key(|view| view.record.created_at);
        views
    }

    /// Remove expired sessions
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let expired: Vec<Uuid> = sessions
            .by_id
            .values()
            .filter(|record| now >= record.expires_at)
            .map(|record| record.id)
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        gauge!(SESSIONS_ACTIVE).set(sessions.by_id.len() as f64);
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
