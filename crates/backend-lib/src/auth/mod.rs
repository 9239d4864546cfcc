// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication and session-security core.

pub mod error;
pub mod lockout;
pub mod password;
pub mod rate_limit;
pub mod revocation;
pub mod session;
pub mod store;
pub mod sweeper;
pub mod token;
pub mod token_generator;
mod service;
mod service_impl;

pub use error::AuthError;
pub use lockout::{LockoutStatus, LockoutTracker};
pub use password::{CredentialFormat, CredentialVerifier, PhcVerifier};
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use revocation::RevocationRegistry;
pub use service::{AuthService, LoginContext, LoginOutcome};
pub use service_impl::{AuthComponents, DefaultAuth};
pub use session::{hash_refresh_token, SessionRecord, SessionRegistry, SessionView};
pub use sweeper::{SweepReport, Sweeper};
pub use token::{TokenConfig, TokenPair, TokenService, TokenType, VerifiedToken};
