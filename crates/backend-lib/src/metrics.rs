// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const LOGIN_SUCCESS: &str = "auth.login.success";
pub const LOGIN_FAILURE: &str = "auth.login.failure";
pub const LOGIN_RATE_LIMITED: &str = "auth.login.rate_limited";
pub const ACCOUNT_LOCKED: &str = "auth.account.locked";
pub const TOKEN_REFRESHED: &str = "auth.token.refreshed";
pub const TOKEN_REJECTED: &str = "auth.token.rejected";
pub const SESSIONS_ACTIVE: &str = "auth.sessions.active";
pub const GATE_OUTCOME: &str = "gate.outcome";
pub const SWEEP_REMOVED: &str = "sweep.removed";
