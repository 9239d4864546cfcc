//! Access/refresh token issuance and verification.
//!
//! Tokens are HS256 JWTs. Verification runs in a fixed order and stops at the
//! first failure: signature and structure, type discriminator, expiry, then
//! revocation. Expiry is checked against the injected clock, not by the JWT
//! library.
use super::error::AuthError;
use super::revocation::RevocationRegistry;
use crate::clock::SharedClock;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use taller_common::{Role, UserClaims};
use uuid::Uuid;

/// Default access token lifetime (15 minutes)
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 15 * 60;

/// Default refresh token lifetime (7 days)
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT payload
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    email: String,
    name: String,
    role: Role,
    active: bool,
    typ: TokenType,
    iat: i64,
    exp: i64,
    iss: String,
    jti: String,
    /// Session the token belongs to
    sid: Uuid,
}

/// Freshly minted token pair
#[derive(Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub session_id: Uuid,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// A token that passed every verification step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub claims: UserClaims,
    pub token_type: TokenType,
    pub session_id: Uuid,
    pub jti: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerifiedToken {
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    config: TokenConfig,
    clock: SharedClock,
    revocations: Arc<RevocationRegistry>,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .field("revoked", &self.revocations.len())
            .finish_non_exhaustive()
    }
}

fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl TokenService {
    pub fn new(
        secret: &[u8],
        config: TokenConfig,
        clock: SharedClock,
        revocations: Arc<RevocationRegistry>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock so it can be reported precisely.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            config,
            clock,
            revocations,
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issue an access/refresh pair for `claims`, bound to `session_id`.
    pub fn issue(&self, claims: &UserClaims, session_id: Uuid) -> Result<TokenPair, AuthError> {
        let now = self.clock.now();
        let access_expires_at = now + self.config.access_ttl;
        let refresh_expires_at = now + self.config.refresh_ttl;

        Ok(TokenPair {
            access: self.sign(claims, TokenType::Access, session_id, now, access_expires_at)?,
            refresh: self.sign(claims, TokenType::Refresh, session_id, now, refresh_expires_at)?,
            access_expires_at,
            refresh_expires_at,
            session_id,
        })
    }

    fn sign(
        &self,
        claims: &UserClaims,
        typ: TokenType,
        sid: Uuid,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let payload = TokenClaims {
            sub: claims.id.clone(),
            email: claims.email.clone(),
            name: claims.display_name.clone(),
            role: claims.role,
            active: claims.active,
            typ,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
            sid,
        };
        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|err| AuthError::Internal(format!("token signing failed: {err}")))
    }

    /// Verify `token` as a token of type `expected`.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<VerifiedToken, AuthError> {
        let payload = decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map_err(|_| AuthError::TokenMalformed)?
            .claims;

        if payload.typ != expected {
            return Err(AuthError::TokenWrongType);
        }

        let now = self.clock.now();
        if now.timestamp() >= payload.exp {
            return Err(AuthError::TokenExpired);
        }

        if self.revocations.is_revoked(&payload.jti) {
            return Err(AuthError::TokenRevoked);
        }

        Ok(VerifiedToken {
            claims: UserClaims {
                id: payload.sub,
                email: payload.email,
                display_name: payload.name,
                role: payload.role,
                active: payload.active,
            },
            token_type: payload.typ,
            session_id: payload.sid,
            jti: payload.jti,
            issued_at: timestamp(payload.iat),
            expires_at: timestamp(payload.exp),
        })
    }

    /// Revoke a verified token until its natural expiry
    pub fn revoke(&self, token: &VerifiedToken) {
        self.revocations.revoke(&token.jti, token.expires_at);
    }

    pub fn revocations(&self) -> &RevocationRegistry {
        &self.revocations
    }
}
