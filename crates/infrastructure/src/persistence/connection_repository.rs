//! File-backed OAuth connection repository.
//!
//! Connections are stored in `oauth_connections.json`, sorted by key.
//! Every mutation rewrites the whole file under a lock.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neocrm_application::ports::{FileSystem, FileSystemError, OAuthConnectionRepository, StorageError};
use neocrm_domain::{ConnectionKey, OAuthConnection};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::credential_storage::write_atomically;
use crate::serialization::{from_json_bytes, to_json_stable_bytes};

/// File name of the connection table.
pub const CONNECTIONS_FILE: &str = "oauth_connections.json";

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ConnectionTable {
    schema_version: u32,
    #[serde(default)]
    connections: Vec<OAuthConnection>,
}

/// OAuth connections in a JSON file.
#[derive(Debug)]
pub struct FileOAuthConnectionRepository<F> {
    fs: F,
    path: PathBuf,
    lock: Mutex<()>,
}

impl<F: FileSystem> FileOAuthConnectionRepository<F> {
    /// Stores connections in [`CONNECTIONS_FILE`] under `data_dir`.
    pub fn new(fs: F, data_dir: &Path) -> Self {
        Self {
            fs,
            path: data_dir.join(CONNECTIONS_FILE),
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<OAuthConnection>, StorageError> {
        let content = match self.fs.read_file(&self.path).await {
            Ok(content) => content,
            Err(FileSystemError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e.into())),
        };
        let table: ConnectionTable = from_json_bytes(&content)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(table.connections)
    }

    async fn write_all(&self, mut connections: Vec<OAuthConnection>) -> Result<(), StorageError> {
        connections.sort_by_key(OAuthConnection::key);
        let table = ConnectionTable {
            schema_version: SCHEMA_VERSION,
            connections,
        };
        let content =
            to_json_stable_bytes(&table).map_err(|e| StorageError::Serialization(e.to_string()))?;
        write_atomically(&self.fs, &self.path, &content)
            .await
            .map_err(|e| StorageError::Io(e.into()))
    }
}

#[async_trait]
impl<F: FileSystem> OAuthConnectionRepository for FileOAuthConnectionRepository<F> {
    async fn find(&self, key: &ConnectionKey) -> Result<Option<OAuthConnection>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .find(|connection| connection.key() == *key))
    }

    async fn upsert(&self, connection: &OAuthConnection) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let key = connection.key();
        let mut connections = self.read_all().await?;
        connections.retain(|existing| existing.key() != key);
        connections.push(connection.clone());
        self.write_all(connections).await
    }

    async fn delete(&self, key: &ConnectionKey) -> Result<bool, StorageError> {
        let _guard = self.lock.lock().await;
        let mut connections = self.read_all().await?;
        let before = connections.len();
        connections.retain(|existing| existing.key() != *key);
        if connections.len() == before {
            return Ok(false);
        }
        self.write_all(connections).await?;
        Ok(true)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<OAuthConnection>, StorageError> {
        let _guard = self.lock.lock().await;
        let mut expired = self.read_all().await?;
        expired.retain(|connection| connection.is_expired(now));
        Ok(expired)
    }

    async fn list_for_user(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Vec<OAuthConnection>, StorageError> {
        let _guard = self.lock.lock().await;
        let mut connections = self.read_all().await?;
        connections.retain(|c| c.tenant_id == tenant_id && c.user_id == user_id);
        Ok(connections)
    }
}
