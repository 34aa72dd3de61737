//! NeoCRM Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer.

pub mod adapters;
pub mod auth;
pub mod persistence;
pub mod serialization;

pub use adapters::{DEFAULT_REQUEST_TIMEOUT, HttpAuthApi, ReqwestHttpClient, SystemClock};
pub use auth::{OAuth2TokenClient, ProviderConfig};
pub use persistence::{
    FileCredentialStorage, FileOAuthConnectionRepository, InMemoryConnectionRepository,
    InMemoryCredentialStorage, TokioFileSystem,
};
pub use serialization::{SerializationError, from_json_bytes, to_json_stable_bytes};
