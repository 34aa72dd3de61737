//! Durable storage of the session credential and OAuth connections.

mod connection_repository;
mod credential_storage;
mod file_system;
mod memory;

pub use connection_repository::{CONNECTIONS_FILE, FileOAuthConnectionRepository};
pub use credential_storage::{CREDENTIAL_FILE, FileCredentialStorage};
pub use file_system::TokioFileSystem;
pub use memory::{InMemoryConnectionRepository, InMemoryCredentialStorage};
