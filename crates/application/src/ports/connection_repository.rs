//! OAuth connection repository port

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neocrm_domain::{ConnectionKey, OAuthConnection};

use super::StorageError;

/// Repository of third-party OAuth connections.
///
/// At most one connection exists per (tenant, user, provider) key;
/// [`OAuthConnectionRepository::upsert`] replaces an existing row.
#[async_trait]
pub trait OAuthConnectionRepository: Send + Sync {
    /// Finds the connection for a key.
    async fn find(&self, key: &ConnectionKey) -> Result<Option<OAuthConnection>, StorageError>;

    /// Inserts or replaces the connection for its key.
    async fn upsert(&self, connection: &OAuthConnection) -> Result<(), StorageError>;

    /// Deletes the connection for a key. Returns whether one existed.
    async fn delete(&self, key: &ConnectionKey) -> Result<bool, StorageError>;

    /// Lists connections whose access token expired before `now`.
    async fn find_expired(&self, now: DateTime<Utc>)
    -> Result<Vec<OAuthConnection>, StorageError>;

    /// Lists all connections of a user.
    async fn list_for_user(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Vec<OAuthConnection>, StorageError>;
}
