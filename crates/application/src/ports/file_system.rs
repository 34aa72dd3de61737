//! File system abstraction port.

use std::future::Future;
use std::path::{Path, PathBuf};

/// Error type for file system operations.
#[derive(Debug, thiserror::Error)]
pub enum FileSystemError {
    /// File not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FileSystemError> for std::io::Error {
    fn from(error: FileSystemError) -> Self {
        match error {
            FileSystemError::Io(io) => io,
            FileSystemError::NotFound(path) => {
                Self::new(std::io::ErrorKind::NotFound, path.display().to_string())
            }
            FileSystemError::PermissionDenied(path) => Self::new(
                std::io::ErrorKind::PermissionDenied,
                path.display().to_string(),
            ),
        }
    }
}

/// Abstraction over the file operations used by the file-backed stores.
///
/// Writes that must be atomic go through [`FileSystem::write_file`] on a
/// sibling temporary path followed by [`FileSystem::rename`].
pub trait FileSystem: Send + Sync {
    /// Reads a file's contents as bytes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    fn read_file(&self, path: &Path) -> impl Future<Output = Result<Vec<u8>, FileSystemError>> + Send;

    /// Writes bytes to a file, creating parent directories if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write_file(
        &self,
        path: &Path,
        contents: &[u8],
    ) -> impl Future<Output = Result<(), FileSystemError>> + Send;

    /// Renames a file, replacing the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be renamed.
    fn rename(&self, from: &Path, to: &Path) -> impl Future<Output = Result<(), FileSystemError>> + Send;

    /// Removes a file. Removing a missing file succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    fn remove_file(&self, path: &Path) -> impl Future<Output = Result<(), FileSystemError>> + Send;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> impl Future<Output = bool> + Send;
}
