//! In-memory adapters, for hosts without a data directory and for tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neocrm_application::ports::{CredentialStorage, OAuthConnectionRepository, StorageError};
use neocrm_domain::{ConnectionKey, Credential, OAuthConnection};
use parking_lot::Mutex;

/// Credential storage that forgets everything on exit.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStorage {
    credential: Mutex<Option<Credential>>,
}

impl InMemoryCredentialStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStorage for InMemoryCredentialStorage {
    async fn load(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self.credential.lock().clone())
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        *self.credential.lock() = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.credential.lock().take();
        Ok(())
    }
}

/// Connection repository held in a map.
#[derive(Debug, Default)]
pub struct InMemoryConnectionRepository {
    connections: Mutex<BTreeMap<ConnectionKey, OAuthConnection>>,
}

impl InMemoryConnectionRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Whether no connection is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}

#[async_trait]
impl OAuthConnectionRepository for InMemoryConnectionRepository {
    async fn find(&self, key: &ConnectionKey) -> Result<Option<OAuthConnection>, StorageError> {
        Ok(self.connections.lock().get(key).cloned())
    }

    async fn upsert(&self, connection: &OAuthConnection) -> Result<(), StorageError> {
        self.connections
            .lock()
            .insert(connection.key(), connection.clone());
        Ok(())
    }

    async fn delete(&self, key: &ConnectionKey) -> Result<bool, StorageError> {
        Ok(self.connections.lock().remove(key).is_some())
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<OAuthConnection>, StorageError> {
        Ok(self
            .connections
            .lock()
            .values()
            .filter(|c| c.is_expired(now))
            .cloned()
            .collect())
    }

    async fn list_for_user(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Vec<OAuthConnection>, StorageError> {
        Ok(self
            .connections
            .lock()
            .range(
                ConnectionKey {
                    tenant_id: tenant_id.to_string(),
                    user_id: user_id.to_string(),
                    provider: String::new(),
                }..,
            )
            .take_while(|(key, _)| key.tenant_id == tenant_id && key.user_id == user_id)
            .map(|(_, connection)| connection.clone())
            .collect())
    }
}
