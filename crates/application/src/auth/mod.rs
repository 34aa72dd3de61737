//! Session credential lifecycle.
//!
//! This module provides:
//! - The credential store with change notification
//! - Bearer decoration of outbound requests
//! - Single-flight credential refresh
//! - Login, logout and restore

mod authenticator;
mod refresh_coordinator;
mod service;
mod token_store;

pub use authenticator::RequestAuthenticator;
pub use refresh_coordinator::{DEFAULT_REFRESH_TIMEOUT, PendingRequestTicket, RefreshCoordinator};
pub use service::AuthService;
pub use token_store::{CredentialStream, Subscription, TokenStore};
