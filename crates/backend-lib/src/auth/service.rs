use super::error::AuthError;
use super::session::SessionView;
use super::sweeper::SweepReport;
use super::token::{TokenPair, VerifiedToken};
use crate::directory::DirectoryUser;
use async_trait::async_trait;
use std::net::IpAddr;
use taller_common::UserClaims;
use uuid::Uuid;

/// Where a login or refresh came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginContext {
    pub ip: IpAddr,
    pub user_agent: Option<String>,
}

/// Result of a successful login or refresh
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub claims: UserClaims,
    pub tokens: TokenPair,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Authenticate with email and password and open a new session.
    async fn login(
        &self,
        email: &str,
        password: &str,
        ctx: &LoginContext,
    ) -> Result<LoginOutcome, AuthError>;

    /// Exchange a refresh token for a new pair, rotating the session.
    async fn refresh(&self, refresh_token: &str, ctx: &LoginContext) -> Result<LoginOutcome, AuthError>;

    /// End the session named by either token. Unusable tokens are ignored.
    fn logout(&self, access_token: Option<&str>, refresh_token: Option<&str>);

    /// Verify an access token and check that its session is still live.
    fn verify_access(&self, token: &str) -> Result<VerifiedToken, AuthError>;

    /// Current directory record for `user_id` (bounded lookup).
    async fn current_user(&self, user_id: &str) -> Result<Option<DirectoryUser>, AuthError>;

    fn list_sessions(&self, user_id: &str) -> Vec<SessionView>;

    fn terminate_session(&self, id: Uuid) -> bool;

    fn terminate_user_sessions(&self, user_id: &str) -> usize;

    /// Drop expired entries from every tracker.
    fn sweep_expired(&self) -> SweepReport;
}
