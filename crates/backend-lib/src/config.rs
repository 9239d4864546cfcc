// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Layered with figment: built-in defaults, then a TOML file, then
//! `TALLER_`-prefixed environment variables (`__` separates nested keys, e.g.
//! `TALLER_AUTH__JWT_SECRET`).
use crate::auth::{lockout, rate_limit, session, token};
use crate::gate::routes::{default_rules, RouteRule};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Default config file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "taller.toml";

/// Longest span any duration setting may express (100 years)
const MAX_SPAN_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Minimum token-signing secret length in bytes
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub directory: DirectorySettings,
    pub auth: AuthSettings,
    pub cookies: CookieSettings,
    pub rate_limit: RateLimitSettings,
    pub lockout: LockoutSettings,
    pub sessions: SessionSettings,
    pub gate: GateSettings,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            directory: DirectorySettings::default(),
            auth: AuthSettings::default(),
            cookies: CookieSettings::default(),
            rate_limit: RateLimitSettings::default(),
            lockout: LockoutSettings::default(),
            sessions: SessionSettings::default(),
            gate: GateSettings::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    /// Take the client IP from `X-Real-IP` / `X-Forwarded-For`
    pub trust_proxy: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            trust_proxy: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    /// JSON file of user records
    pub users_file: PathBuf,
    /// Upper bound on a single directory lookup
    pub timeout_ms: u64,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            users_file: PathBuf::from("data/users.json"),
            timeout_ms: 3_000,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 signing secret. A random one is generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    pub issuer: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    /// Silent refresh kicks in below this much remaining access-token life
    pub near_expiry_secs: u64,
    /// scrypt cost for newly hashed credentials; library default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_cost_log_n: Option<u8>,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("issuer", &self.issuer)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("near_expiry_secs", &self.near_expiry_secs)
            .field("hash_cost_log_n", &self.hash_cost_log_n)
            .finish()
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            issuer: "taller".to_string(),
            access_ttl_secs: token::DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: token::DEFAULT_REFRESH_TTL_SECS,
            near_expiry_secs: 5 * 60,
            hash_cost_log_n: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub access_name: String,
    pub refresh_name: String,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            access_name: "taller_access".to_string(),
            refresh_name: "taller_refresh".to_string(),
            secure: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Login attempts admitted per IP per window
    pub max_attempts: u32,
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_attempts: rate_limit::DEFAULT_MAX_ATTEMPTS,
            window_secs: rate_limit::DEFAULT_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutSettings {
    /// Consecutive failures before the account locks
    pub threshold: u32,
    pub duration_secs: u64,
}

impl Default for LockoutSettings {
    fn default() -> Self {
        Self {
            threshold: lockout::DEFAULT_THRESHOLD,
            duration_secs: lockout::DEFAULT_LOCK_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Sessions idle longer than this are reported stale
    pub inactivity_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            inactivity_secs: session::DEFAULT_INACTIVITY_SECS,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    /// Where unauthenticated page requests are sent
    pub login_path: String,
    pub routes: Vec<RouteRule>,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            routes: default_rules(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn span(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_SPAN_SECS) as i64)
}

impl Settings {
    /// Load from [`DEFAULT_CONFIG_FILE`] (if present) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from `path` (if present) and the environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("TALLER_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !is_valid_log_level(&self.log_level) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level {:?}",
                self.log_level
            )));
        }
        if self.auth.issuer.trim().is_empty() {
            return invalid("auth.issuer must not be empty");
        }
        if self.auth.access_ttl_secs == 0 || self.auth.refresh_ttl_secs == 0 {
            return invalid("token TTLs must be positive");
        }
        if self.auth.access_ttl_secs >= self.auth.refresh_ttl_secs {
            return invalid("auth.access_ttl_secs must be shorter than auth.refresh_ttl_secs");
        }
        if let Some(secret) = &self.auth.jwt_secret {
            if secret.len() < MIN_SECRET_BYTES {
                return Err(ConfigError::Invalid(format!(
                    "auth.jwt_secret must be at least {MIN_SECRET_BYTES} bytes"
                )));
            }
        }
        if self.cookies.access_name.is_empty() || self.cookies.refresh_name.is_empty() {
            return invalid("cookie names must not be empty");
        }
        if self.cookies.access_name == self.cookies.refresh_name {
            return invalid("access and refresh cookies need different names");
        }
        if self.rate_limit.max_attempts == 0 || self.rate_limit.window_secs == 0 {
            return invalid("rate_limit values must be positive");
        }
        if self.lockout.threshold == 0 || self.lockout.duration_secs == 0 {
            return invalid("lockout values must be positive");
        }
        if self.sessions.sweep_interval_secs == 0 {
            return invalid("sessions.sweep_interval_secs must be positive");
        }
        if self.directory.timeout_ms == 0 {
            return invalid("directory.timeout_ms must be positive");
        }
        if !self.gate.login_path.starts_with('/') {
            return invalid("gate.login_path must be an absolute path");
        }
        Ok(())
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        span(self.auth.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        span(self.auth.refresh_ttl_secs)
    }

    pub fn near_expiry(&self) -> chrono::Duration {
        span(self.auth.near_expiry_secs)
    }

    pub fn rate_window(&self) -> chrono::Duration {
        span(self.rate_limit.window_secs)
    }

    pub fn lock_duration(&self) -> chrono::Duration {
        span(self.lockout.duration_secs)
    }

    pub fn inactivity(&self) -> chrono::Duration {
        span(self.sessions.inactivity_secs)
    }

    pub fn directory_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.directory.timeout_ms)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sessions.sweep_interval_secs)
    }
}

/// A bare level name, or an env-filter directive list such as `info,backend_lib=debug`
fn is_valid_log_level(level: &str) -> bool {
    if level.contains('=') || level.contains(',') {
        return !level.trim().is_empty();
    }
    tracing::Level::from_str(level.trim()).is_ok()
}
