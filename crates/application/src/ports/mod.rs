//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the session core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod auth_api;
mod clock;
mod connection_repository;
mod credential_storage;
mod file_system;
mod http_client;
mod navigator;
mod provider_client;

pub use auth_api::{AuthApi, AuthApiError};
pub use clock::Clock;
pub use connection_repository::OAuthConnectionRepository;
pub use credential_storage::{CredentialStorage, StorageError};
pub use file_system::{FileSystem, FileSystemError};
pub use http_client::{HttpClient, HttpClientError};
pub use navigator::Navigator;
pub use provider_client::{ProviderRefreshError, ProviderTokenClient};
