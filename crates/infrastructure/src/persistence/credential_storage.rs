//! File-backed session credential storage.
//!
//! The credential lives in `auth_prefs.json` inside the data directory:
//!
//! ```json
//! {
//!   "access_token": "eyJ...",
//!   "expires_at": "2026-03-02T10:30:00Z",
//!   "is_logged_in": true,
//!   "refresh_token": "eyJ...",
//!   "token_type": "Bearer",
//!   "user_data": { "id": "42", "tenantId": "acme", "role": "ADMIN", "displayName": "Grace" }
//! }
//! ```
//!
//! Every write goes to a sibling temporary file that is then renamed over
//! the target, so a reader sees either the old or the new credential.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neocrm_application::ports::{CredentialStorage, FileSystem, FileSystemError, StorageError};
use neocrm_domain::{Credential, UserSummary};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::serialization::{from_json_bytes, to_json_stable_bytes};

/// File name of the credential file.
pub const CREDENTIAL_FILE: &str = "auth_prefs.json";

#[derive(Debug, Serialize, Deserialize)]
struct AuthPrefs {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    user_data: Option<UserSummary>,
    #[serde(default)]
    is_logged_in: bool,
}

impl AuthPrefs {
    fn into_credential(self) -> Option<Credential> {
        if !self.is_logged_in {
            return None;
        }
        Some(Credential {
            access_token: self.access_token.filter(|token| !token.is_empty())?,
            refresh_token: self.refresh_token.unwrap_or_default(),
            token_type: self
                .token_type
                .unwrap_or_else(|| neocrm_domain::auth::DEFAULT_TOKEN_TYPE.to_string()),
            expires_at: self.expires_at,
            user: self.user_data?,
        })
    }
}

impl From<&Credential> for AuthPrefs {
    fn from(credential: &Credential) -> Self {
        Self {
            access_token: Some(credential.access_token.clone()),
            refresh_token: Some(credential.refresh_token.clone()),
            token_type: Some(credential.token_type.clone()),
            expires_at: credential.expires_at,
            user_data: Some(credential.user.clone()),
            is_logged_in: true,
        }
    }
}

/// Writes `contents` to `path` through a temporary sibling file.
pub(crate) async fn write_atomically<F: FileSystem>(
    fs: &F,
    path: &Path,
    contents: &[u8],
) -> Result<(), FileSystemError> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    fs.write_file(&temp, contents).await?;
    fs.rename(&temp, path).await
}

/// Credential storage in a JSON file.
#[derive(Debug)]
pub struct FileCredentialStorage<F> {
    fs: F,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl<F: FileSystem> FileCredentialStorage<F> {
    /// Stores the credential in [`CREDENTIAL_FILE`] under `data_dir`.
    pub fn new(fs: F, data_dir: &Path) -> Self {
        Self {
            fs,
            path: data_dir.join(CREDENTIAL_FILE),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the credential file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<F: FileSystem> CredentialStorage for FileCredentialStorage<F> {
    async fn load(&self) -> Result<Option<Credential>, StorageError> {
        let content = match self.fs.read_file(&self.path).await {
            Ok(content) => content,
            Err(FileSystemError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(StorageError::Io(e.into())),
        };

        let prefs: AuthPrefs = from_json_bytes(&content)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(prefs.into_credential())
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        let content = to_json_stable_bytes(&AuthPrefs::from(credential))
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let _guard = self.write_lock.lock().await;
        write_atomically(&self.fs, &self.path, &content)
            .await
            .map_err(|e| StorageError::Io(e.into()))?;
        debug!(path = %self.path.display(), "credential file written");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.fs
            .remove_file(&self.path)
            .await
            .map_err(|e| StorageError::Io(e.into()))?;
        debug!(path = %self.path.display(), "credential file removed");
        Ok(())
    }
}
