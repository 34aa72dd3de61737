//! Real file system implementation.

use std::io::ErrorKind;
use std::path::Path;

use neocrm_application::ports::{FileSystem, FileSystemError};
use tokio::fs;

/// File system backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    /// Creates a new `TokioFileSystem`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn classify(path: &Path, error: std::io::Error) -> FileSystemError {
        match error.kind() {
            ErrorKind::NotFound => FileSystemError::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => FileSystemError::PermissionDenied(path.to_path_buf()),
            _ => FileSystemError::Io(error),
        }
    }
}

impl FileSystem for TokioFileSystem {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, FileSystemError> {
        fs::read(path).await.map_err(|e| Self::classify(path, e))
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), FileSystemError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, contents)
            .await
            .map_err(|e| Self::classify(path, e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), FileSystemError> {
        fs::rename(from, to).await.map_err(|e| Self::classify(from, e))
    }

    async fn remove_file(&self, path: &Path) -> Result<(), FileSystemError> {
        match fs::remove_file(path).await {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other.map_err(|e| Self::classify(path, e)),
        }
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }
}
