// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
//!
//! Stored credentials are PHC strings, which are self-describing: the
//! `$scrypt$` / `$argon2…$` prefix names the algorithm. Operational tooling
//! relies on that to classify records without running the verifier.
use argon2::Argon2;
use scrypt::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use serde::Serialize;
use std::fmt::Debug;

/// Opaque credential capability used by the login flow
pub trait CredentialVerifier: Send + Sync + Debug {
    /// Check `plain` against a stored credential. Anything unparseable is `false`.
    fn verify(&self, plain: &str, stored: &str) -> bool;

    /// Produce a stored credential for `plain`
    fn hash(&self, plain: &str) -> anyhow::Result<String>;
}

/// Verifies scrypt and argon2 PHC strings, hashes new credentials with scrypt
#[derive(Debug, Clone)]
pub struct PhcVerifier {
    params: Params,
}

impl Default for PhcVerifier {
    fn default() -> Self {
        Self {
            params: Params::recommended(),
        }
    }
}

impl PhcVerifier {
    /// Hash with a custom scrypt cost (`log_n`); verification always follows the stored params.
    pub fn with_cost(log_n: u8) -> anyhow::Result<Self> {
        let params = Params::new(log_n, Params::RECOMMENDED_R, Params::RECOMMENDED_P, Params::RECOMMENDED_LEN)
            .map_err(|err| anyhow::anyhow!("invalid scrypt parameters: {err}"))?;
        Ok(Self { params })
    }
}

impl CredentialVerifier for PhcVerifier {
    fn verify(&self, plain: &str, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        let argon2 = Argon2::default();
        parsed
            .verify_password(&[&Scrypt as &dyn PasswordVerifier, &argon2], plain.as_bytes())
            .is_ok()
    }

    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Scrypt
            .hash_password_customized(plain.as_bytes(), None, None, self.params, &salt)
            .map_err(|err| anyhow::anyhow!("password hashing failed: {err}"))?
            .to_string();
        Ok(hash)
    }
}

/// Storage format of a credential, judged from its prefix alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialFormat {
    Scrypt,
    Argon2,
    /// Not a recognised hash; needs migration
    Legacy,
}

impl CredentialFormat {
    pub fn classify(stored: &str) -> Self {
        if stored.starts_with("$scrypt$") {
            CredentialFormat::Scrypt
        } else if stored.starts_with("$argon2") {
            CredentialFormat::Argon2
        } else {
            CredentialFormat::Legacy
        }
    }

    pub fn needs_migration(self) -> bool {
        self == CredentialFormat::Legacy
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CredentialFormat::Scrypt => "scrypt",
            CredentialFormat::Argon2 => "argon2",
            CredentialFormat::Legacy => "legacy",
        }
    }
}
