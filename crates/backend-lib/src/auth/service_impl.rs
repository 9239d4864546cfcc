use super::error::AuthError;
use super::lockout::LockoutTracker;
use super::password::{CredentialFormat, CredentialVerifier};
use super::rate_limit::RateLimiter;
use super::revocation::RevocationRegistry;
use super::service::{AuthService, LoginContext, LoginOutcome};
use super::session::{hash_refresh_token, SessionRecord, SessionRegistry, SessionView};
use super::sweeper::SweepReport;
use super::token::{TokenConfig, TokenService, TokenType, VerifiedToken};
use super::token_generator::generate_secret;
use crate::clock::SharedClock;
use crate::config::Settings;
use crate::directory::{normalize_email, DirectoryError, DirectoryUser, UserDirectory};
use crate::metrics::{
    ACCOUNT_LOCKED, LOGIN_FAILURE, LOGIN_RATE_LIMITED, LOGIN_SUCCESS, TOKEN_REFRESHED,
    TOKEN_REJECTED,
};
use async_trait::async_trait;
use metrics::counter;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Verified against when the account is unknown, so both paths cost the same
const DUMMY_PASSWORD: &str = "dummy-password-for-timing-parity";

/// Everything [`DefaultAuth`] owns
pub struct AuthComponents {
    pub rate_limiter: RateLimiter,
    pub lockout: LockoutTracker,
    pub tokens: TokenService,
    pub sessions: SessionRegistry,
    pub directory: Arc<dyn UserDirectory>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub clock: SharedClock,
    /// Upper bound on any single directory call
    pub directory_timeout: Duration,
}

pub struct DefaultAuth {
    rate_limiter: RateLimiter,
    lockout: LockoutTracker,
    tokens: TokenService,
    sessions: SessionRegistry,
    directory: Arc<dyn UserDirectory>,
    verifier: Arc<dyn CredentialVerifier>,
    clock: SharedClock,
    directory_timeout: Duration,
    dummy_credential: String,
}

impl DefaultAuth {
    pub fn new(parts: AuthComponents) -> anyhow::Result<Self> {
        let dummy_credential = parts.verifier.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            rate_limiter: parts.rate_limiter,
            lockout: parts.lockout,
            tokens: parts.tokens,
            sessions: parts.sessions,
            directory: parts.directory,
            verifier: parts.verifier,
            clock: parts.clock,
            directory_timeout: parts.directory_timeout,
            dummy_credential,
        })
    }

    /// Wire every tracker from configuration
    pub fn from_settings(
        settings: &Settings,
        directory: Arc<dyn UserDirectory>,
        verifier: Arc<dyn CredentialVerifier>,
        clock: SharedClock,
    ) -> anyhow::Result<Self> {
        let secret = match &settings.auth.jwt_secret {
            Some(secret) => secret.clone(),
            None => {
                warn!("no auth.jwt_secret configured; using a random secret, tokens will not survive a restart");
                generate_secret()
            },
        };

        let revocations = Arc::new(RevocationRegistry::new(clock.clone()));
        let tokens = TokenService::new(
            secret.as_bytes(),
            TokenConfig {
                issuer: settings.auth.issuer.clone(),
                access_ttl: settings.access_ttl(),
                refresh_ttl: settings.refresh_ttl(),
            },
            clock.clone(),
            revocations,
        );

        Self::new(AuthComponents {
            rate_limiter: RateLimiter::new(
                clock.clone(),
                settings.rate_limit.max_attempts,
                settings.rate_window(),
            ),
            lockout: LockoutTracker::new(
                clock.clone(),
                settings.lockout.threshold,
                settings.lock_duration(),
            ),
            tokens,
            sessions: SessionRegistry::new(clock.clone(), settings.inactivity()),
            directory,
            verifier,
            clock,
            directory_timeout: settings.directory_timeout(),
        })
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn lockout(&self) -> &LockoutTracker {
        &self.lockout
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Run a directory call under the configured timeout. Errors and timeouts fail closed.
    async fn bounded<F>(&self, lookup: F) -> Result<Option<DirectoryUser>, AuthError>
    where
        F: Future<Output = Result<Option<DirectoryUser>, DirectoryError>>,
    {
        match tokio::time::timeout(self.directory_timeout, lookup).await {
            Ok(Ok(user)) => Ok(user),
            Ok(Err(err)) => {
                error!(error = %err, "directory lookup failed");
                Err(AuthError::DirectoryUnavailable)
            },
            Err(_) => {
                warn!(
                    timeout_ms = self.directory_timeout.as_millis() as u64,
                    "directory lookup timed out"
                );
                Err(AuthError::DirectoryUnavailable)
            },
        }
    }

    async fn check_credential(&self, password: &str, stored: &str) -> Result<bool, AuthError> {
        let verifier = Arc::clone(&self.verifier);
        let plain = Zeroizing::new(password.to_owned());
        let stored = stored.to_owned();
        tokio::task::spawn_blocking(move || verifier.verify(&plain, &stored))
            .await
            .map_err(|err| AuthError::Internal(format!("credential check aborted: {err}")))
    }

    fn reject_login(&self, email: &str, ctx: &LoginContext, reason: &'static str) -> AuthError {
        // Only the logs know which of these it was; the caller sees one answer.
        info!(account = %email, ip = %ctx.ip, reason, "login rejected");
        counter!(LOGIN_FAILURE, "reason" => reason).increment(1);

        let status = self.lockout.increment(email);
        match status.locked_until {
            Some(locked_until) if status.locked => {
                counter!(ACCOUNT_LOCKED).increment(1);
                AuthError::AccountLocked { locked_until }
            },
            _ => AuthError::InvalidCredentials,
        }
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn login(
        &self,
        email: &str,
        password: &str,
        ctx: &LoginContext,
    ) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);

        let decision = self.rate_limiter.check(ctx.ip);
        if !decision.allowed {
            warn!(ip = %ctx.ip, reset_at = %decision.reset_time, "login rate limited");
            counter!(LOGIN_RATE_LIMITED).increment(1);
            return Err(AuthError::RateLimited {
                remaining_attempts: decision.remaining_attempts,
                reset_at: decision.reset_time,
            });
        }

        let lock = self.lockout.check(&email);
        if let (true, Some(locked_until)) = (lock.locked, lock.locked_until) {
            // Knocking on a locked account still counts, but never extends the lock.
            let status = self.lockout.increment(&email);
            info!(account = %email, ip = %ctx.ip, attempts = status.attempts, "login refused, account locked");
            return Err(AuthError::AccountLocked { locked_until });
        }

        let user = self.bounded(self.directory.find_by_email(&email)).await?;

        let legacy = user
            .as_ref()
            .is_some_and(|user| CredentialFormat::classify(&user.credential).needs_migration());
        let stored = match &user {
            Some(user) if !legacy => user.credential.as_str(),
            _ => self.dummy_credential.as_str(),
        };
        let password_ok = self.check_credential(password, stored).await?;

        let user = match user {
            None => return Err(self.reject_login(&email, ctx, "unknown_account")),
            Some(_) if legacy => return Err(self.reject_login(&email, ctx, "legacy_credential")),
            Some(_) if !password_ok => return Err(self.reject_login(&email, ctx, "wrong_password")),
            Some(user) if !user.active => {
                return Err(self.reject_login(&email, ctx, "inactive_account"))
            },
            Some(user) => user,
        };

        self.lockout.reset(&email);

        let session_id = Uuid::new_v4();
        let claims = user.claims();
        let tokens = self.tokens.issue(&claims, session_id)?;
        let now = self.clock.now();
        self.sessions.insert(SessionRecord {
            id: session_id,
            user_id: claims.id.clone(),
            refresh_token_hash: hash_refresh_token(&tokens.refresh),
            issuing_ip: Some(ctx.ip),
            user_agent: ctx.user_agent.clone(),
            created_at: now,
            expires_at: tokens.refresh_expires_at,
            last_used_at: now,
        });

        counter!(LOGIN_SUCCESS).increment(1);
        info!(user_id = %claims.id, session_id = %session_id, ip = %ctx.ip, "login succeeded");
        Ok(LoginOutcome { claims, tokens })
    }

    async fn refresh(&self, refresh_token: &str, ctx: &LoginContext) -> Result<LoginOutcome, AuthError> {
        let presented = self
            .tokens
            .verify(refresh_token, TokenType::Refresh)
            .inspect_err(|err| {
                debug!(ip = %ctx.ip, reason = err.reason(), "refresh token rejected");
                counter!(TOKEN_REJECTED, "reason" => err.reason()).increment(1);
            })?;

        let old_hash = hash_refresh_token(refresh_token);
        let Some(session) = self
            .sessions
            .find(&old_hash)
            .filter(|session| session.id == presented.session_id)
        else {
            warn!(ip = %ctx.ip, session_id = %presented.session_id, "refresh token has no live session");
            return Err(AuthError::TokenRevoked);
        };

        let user = match self.bounded(self.directory.find_by_id(&presented.claims.id)).await? {
            Some(user) if user.active => user,
            _ => {
                info!(user_id = %presented.claims.id, session_id = %session.id, "refresh for missing or inactive user, ending session");
                self.sessions.terminate(session.id);
                self.tokens.revoke(&presented);
                return Err(AuthError::TokenRevoked);
            },
        };

        let claims = user.claims();
        let tokens = self.tokens.issue(&claims, session.id)?;
        if !self.sessions.rotate(
            session.id,
            &old_hash,
            hash_refresh_token(&tokens.refresh),
            tokens.refresh_expires_at,
        ) {
            // Someone else rotated this session first.
            warn!(session_id = %session.id, ip = %ctx.ip, "refresh lost rotation race");
            return Err(AuthError::TokenRevoked);
        }
        self.tokens.revoke(&presented);

        counter!(TOKEN_REFRESHED).increment(1);
        debug!(user_id = %claims.id, session_id = %session.id, ip = %ctx.ip, "session rotated");
        Ok(LoginOutcome { claims, tokens })
    }

    fn logout(&self, access_token: Option<&str>, refresh_token: Option<&str>) {
        if let Some(token) = access_token {
            match self.tokens.verify(token, TokenType::Access) {
                Ok(verified) => {
                    self.tokens.revoke(&verified);
                    if self.sessions.terminate(verified.session_id).is_some() {
                        info!(user_id = %verified.claims.id, session_id = %verified.session_id, "logged out");
                    }
                },
                Err(err) => debug!(reason = err.reason(), "logout with unusable access token"),
            }
        }

        if let Some(token) = refresh_token {
            if let Some(session) = self.sessions.find(&hash_refresh_token(token)) {
                self.sessions.terminate(session.id);
                info!(user_id = %session.user_id, session_id = %session.id, "logged out");
            }
            if let Ok(verified) = self.tokens.verify(token, TokenType::Refresh) {
                self.tokens.revoke(&verified);
            }
        }
    }

    fn verify_access(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let verified = self.tokens.verify(token, TokenType::Access)?;
        if !self.sessions.is_live(verified.session_id) {
            return Err(AuthError::TokenRevoked);
        }
        Ok(verified)
    }

    async fn current_user(&self, user_id: &str) -> Result<Option<DirectoryUser>, AuthError> {
        self.bounded(self.directory.find_by_id(user_id)).await
    }

    fn list_sessions(&self, user_id: &str) -> Vec<SessionView> {
        self.sessions.list_active(user_id)
    }

    fn terminate_session(&self, id: Uuid) -> bool {
        let removed = self.sessions.terminate(id);
        if let Some(session) = &removed {
            info!(user_id = %session.user_id, session_id = %id, "session terminated by administrator");
        }
        removed.is_some()
    }

    fn terminate_user_sessions(&self, user_id: &str) -> usize {
        let count = self.sessions.terminate_user(user_id);
        info!(user_id, count, "user sessions terminated by administrator");
        count
    }

    fn sweep_expired(&self) -> SweepReport {
        SweepReport {
            rate_limits: self.rate_limiter.sweep_expired(),
            lockouts: self.lockout.sweep_expired(),
            revocations: self.tokens.revocations().sweep_expired(),
            sessions: self.sessions.sweep_expired(),
        }
    }
}
