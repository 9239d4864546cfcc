// ============================
// crates/backend-lib/src/gate/mod.rs
// ============================
//! Request gate: decides allow / redirect / 401 / 403 for every inbound request
//! before any handler runs.
//!
//! The decision is independent of HTTP; [`crate::middleware::gate`] adapts it to axum.
pub mod routes;

use crate::auth::{AuthService, LoginContext, TokenPair, VerifiedToken};
use crate::clock::SharedClock;
use crate::metrics::GATE_OUTCOME;
use chrono::Duration;
use metrics::counter;
use routes::{RouteAccess, RouteClass, RouteTable};
use std::net::IpAddr;
use std::sync::Arc;
use taller_common::UserClaims;
use tracing::debug;
use uuid::Uuid;

/// What the gate sees of a request
#[derive(Debug, Clone)]
pub struct GateRequest {
    pub path: String,
    pub access_cookie: Option<String>,
    pub refresh_cookie: Option<String>,
    /// Token from `Authorization: Bearer`
    pub bearer: Option<String>,
    pub ip: IpAddr,
    pub user_agent: Option<String>,
}

/// Verified identity attached to the downstream request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub claims: UserClaims,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Proceed; `None` on public routes
    Allow(Option<AuthenticatedUser>),
    RedirectToLogin,
    Unauthorized,
    Forbidden,
}

impl GateOutcome {
    fn label(&self) -> &'static str {
        match self {
            GateOutcome::Allow(_) => "allow",
            GateOutcome::RedirectToLogin => "redirect",
            GateOutcome::Unauthorized => "unauthorized",
            GateOutcome::Forbidden => "forbidden",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateDecision {
    pub outcome: GateOutcome,
    /// New token pair from an opportunistic refresh, to be set as cookies
    pub refreshed: Option<TokenPair>,
}

impl GateDecision {
    fn new(outcome: GateOutcome) -> Self {
        counter!(GATE_OUTCOME, "outcome" => outcome.label()).increment(1);
        Self {
            outcome,
            refreshed: None,
        }
    }
}

pub struct Gate {
    routes: RouteTable,
    auth: Arc<dyn AuthService>,
    clock: SharedClock,
    /// Access tokens with less than this left trigger a silent refresh
    near_expiry: Duration,
}

impl Gate {
    pub fn new(
        routes: RouteTable,
        auth: Arc<dyn AuthService>,
        clock: SharedClock,
        near_expiry: Duration,
    ) -> Self {
        Self {
            routes,
            auth,
            clock,
            near_expiry,
        }
    }

    pub async fn evaluate(&self, req: &GateRequest) -> GateDecision {
        let class = self.routes.classify(&req.path);
        let min_role = match class.access {
            RouteAccess::Public => return GateDecision::new(GateOutcome::Allow(None)),
            RouteAccess::Protected => None,
            RouteAccess::RoleRestricted(role) => Some(role),
        };

        // Cookie first; the bearer header only counts on API routes. An empty
        // cookie is a cleared remnant, not a token.
        let token = req
            .access_cookie
            .as_deref()
            .filter(|token| !token.is_empty())
            .or(req
                .bearer
                .as_deref()
                .filter(|token| class.api && !token.is_empty()));
        let Some(token) = token else {
            return self.not_authenticated(req, class, "no_token");
        };

        let verified = match self.auth.verify_access(token) {
            Ok(verified) => verified,
            Err(err) => return self.not_authenticated(req, class, err.reason()),
        };
        if !verified.claims.active {
            return self.not_authenticated(req, class, "inactive_claims");
        }

        let mut claims = verified.claims.clone();
        if let Some(min_role) = min_role {
            // The token alone is not enough for privileged routes.
            match self.auth.current_user(&claims.id).await {
                Ok(Some(user)) if user.active => claims = user.claims(),
                Ok(_) => return self.not_authenticated(req, class, "user_inactive_or_missing"),
                Err(err) => return self.not_authenticated(req, class, err.reason()),
            }
            if !claims.role.satisfies(min_role) {
                debug!(path = %req.path, user_id = %claims.id, role = %claims.role, required = %min_role, "insufficient role");
                return GateDecision::new(GateOutcome::Forbidden);
            }
        }

        let refreshed = self.maybe_refresh(&verified, req).await;
        let mut decision = GateDecision::new(GateOutcome::Allow(Some(AuthenticatedUser {
            claims,
            session_id: verified.session_id,
        })));
        decision.refreshed = refreshed;
        decision
    }

    fn not_authenticated(&self, req: &GateRequest, class: RouteClass, reason: &'static str) -> GateDecision {
        debug!(path = %req.path, ip = %req.ip, reason, "request not authenticated");
        GateDecision::new(if class.api {
            GateOutcome::Unauthorized
        } else {
            GateOutcome::RedirectToLogin
        })
    }

    async fn maybe_refresh(&self, verified: &VerifiedToken, req: &GateRequest) -> Option<TokenPair> {
        if verified.remaining(self.clock.now()) >= self.near_expiry {
            return None;
        }
        let refresh = req.refresh_cookie.as_deref()?;
        let ctx = LoginContext {
            ip: req.ip,
            user_agent: req.user_agent.clone(),
        };
        match self.auth.refresh(refresh, &ctx).await {
            Ok(outcome) => {
                debug!(session_id = %outcome.tokens.session_id, "silent refresh");
                Some(outcome.tokens)
            },
            Err(err) => {
                debug!(reason = err.reason(), "silent refresh failed, keeping current token");
                None
            },
        }
    }
}
