//! Durable storage port for the session credential.

use async_trait::async_trait;
use neocrm_domain::Credential;

/// Errors that can occur during persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Durable storage of the single session credential.
///
/// Implementations write the access token, refresh token, serialized user
/// snapshot and logged-in flag as one unit; a reader never observes a
/// partially written credential.
#[async_trait]
pub trait CredentialStorage: Send + Sync {
    /// Loads the stored credential, if the session is logged in.
    async fn load(&self) -> Result<Option<Credential>, StorageError>;

    /// Replaces the stored credential.
    async fn save(&self, credential: &Credential) -> Result<(), StorageError>;

    /// Removes the stored credential and marks the session logged out.
    async fn clear(&self) -> Result<(), StorageError>;
}
