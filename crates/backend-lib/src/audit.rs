//! Credential format audit.
//!
//! Classifies every stored credential by its prefix alone; the verifier is
//! never run.
use crate::auth::CredentialFormat;
use crate::directory::{DirectoryError, UserDirectory};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub email: String,
    pub format: CredentialFormat,
    pub needs_migration: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CredentialAudit {
    pub entries: Vec<AuditEntry>,
    /// Records already in a recognised hash format
    pub hashed: usize,
    pub needs_migration: usize,
}

pub async fn audit_credentials(directory: &dyn UserDirectory) -> Result<CredentialAudit, DirectoryError> {
    let mut audit = CredentialAudit::default();
    for user in directory.list_users().await? {
        let format = CredentialFormat::classify(&user.credential);
        let needs_migration = format.needs_migration();
        if needs_migration {
            audit.needs_migration += 1;
        } else {
            audit.hashed += 1;
        }
        audit.entries.push(AuditEntry {
            id: user.id,
            email: user.email,
            format,
            needs_migration,
        });
    }
    Ok(audit)
}
