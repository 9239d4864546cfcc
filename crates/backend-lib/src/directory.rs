// ============================
// crates/backend-lib/src/directory.rs
// ============================
//! User directory abstraction with a flat-file implementation.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use taller_common::{Role, UserClaims};
use thiserror::Error;
use tokio::{fs as tokio_fs, sync::RwLock};

/// A user record as the directory stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
    /// Stored credential (PHC string, or a legacy value awaiting migration)
    pub credential: String,
}

impl DirectoryUser {
    /// Claim set embedded in issued tokens
    pub fn claims(&self) -> UserClaims {
        UserClaims {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            active: self.active,
        }
    }
}

/// Canonical form of an email address for lookups and lockout keys
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed directory file: {0}")]
    Format(#[from] serde_json::Error),

    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Trait for user directory backends
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, DirectoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<DirectoryUser>, DirectoryError>;

    /// Every user record, for batch tooling
    async fn list_users(&self) -> Result<Vec<DirectoryUser>, DirectoryError>;
}

/// Directory backed by a JSON array of user records
#[derive(Debug)]
pub struct FlatFileDirectory {
    path: Option<PathBuf>,
    users: RwLock<Vec<DirectoryUser>>,
}

impl FlatFileDirectory {
    /// Load the directory from `path`
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, DirectoryError> {
        let path = path.as_ref().to_path_buf();
        let content = tokio_fs::read_to_string(&path).await?;
        let users: Vec<DirectoryUser> = serde_json::from_str(&content)?;
        Ok(Self {
            path: Some(path),
            users: RwLock::new(users),
        })
    }

    /// In-memory directory, never written to disk
    pub fn from_users(users: Vec<DirectoryUser>) -> Self {
        Self {
            path: None,
            users: RwLock::new(users),
        }
    }

    /// Insert or replace a user (matched by id) and persist the file, if any
    pub async fn upsert(&self, user: DirectoryUser) -> Result<(), DirectoryError> {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|existing| existing.id == user.id) {
            Some(existing) => *existing = user,
            None => users.push(user),
        }

        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(&*users)?;
            tokio_fs::write(path, json).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for FlatFileDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, DirectoryError> {
        let email = normalize_email(email);
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|user| normalize_email(&user.email) == email)
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<DirectoryUser>, DirectoryError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<DirectoryUser>, DirectoryError> {
        Ok(self.users.read().await.clone())
    }
}
