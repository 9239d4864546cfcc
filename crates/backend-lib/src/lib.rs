// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the `taller` auth server.

pub mod audit;
pub mod auth;
pub mod clock;
pub mod config;
pub mod cookies;
pub mod directory;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;

use crate::auth::{AuthService, CredentialVerifier, DefaultAuth, PhcVerifier};
use crate::clock::{SharedClock, SystemClock};
use crate::config::Settings;
use crate::directory::{FlatFileDirectory, UserDirectory};
use crate::gate::{routes::RouteTable, Gate};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Request gate
    pub gate: Arc<Gate>,
    /// Settings
    pub settings: Arc<Settings>,
    /// Time source
    pub clock: SharedClock,
}

impl AppState {
    /// Create application state from settings: flat-file directory, scrypt
    /// verifier, wall clock.
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let directory = Arc::new(FlatFileDirectory::open(&settings.directory.users_file).await?);
        let verifier = match settings.auth.hash_cost_log_n {
            Some(log_n) => PhcVerifier::with_cost(log_n)?,
            None => PhcVerifier::default(),
        };
        Self::with_parts(settings, directory, Arc::new(verifier), Arc::new(SystemClock))
    }

    /// Create application state from explicit collaborators
    pub fn with_parts(
        settings: Settings,
        directory: Arc<dyn UserDirectory>,
        verifier: Arc<dyn CredentialVerifier>,
        clock: SharedClock,
    ) -> anyhow::Result<Self> {
        settings.validate()?;

        let auth: Arc<dyn AuthService> = Arc::new(DefaultAuth::from_settings(
            &settings,
            directory,
            verifier,
            clock.clone(),
        )?);
        let gate = Arc::new(Gate::new(
            RouteTable::new(settings.gate.routes.clone()),
            auth.clone(),
            clock.clone(),
            settings.near_expiry(),
        ));

        Ok(Self {
            auth,
            gate,
            settings: Arc::new(settings),
            clock,
        })
    }
}
