//! NeoCRM Domain - Core session types
//!
//! This crate defines the credential, OAuth connection and request model
//! shared by every NeoCRM client. All types here are pure Rust with no I/O
//! dependencies.

pub mod auth;
pub mod error;
pub mod oauth;
pub mod request;
pub mod response;
pub mod session;

pub use auth::{ApiEnvelope, AuthResponse, Credential, UserSummary, authorization_value};
pub use error::{DomainError, DomainResult};
pub use oauth::{ConnectionKey, OAuthConnection, ProviderAccessToken, ProviderToken};
pub use request::{ApiRequest, HttpMethod};
pub use response::ApiResponse;
pub use session::{LogoutReason, SessionState};
