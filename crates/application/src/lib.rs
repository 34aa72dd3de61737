//! NeoCRM Application - Session core
//!
//! This crate keeps a client's credential usable: it stores the session
//! credential, authenticates outbound requests, recovers from expiry with a
//! single shared refresh, tracks the derived login state and keeps
//! third-party OAuth connections fresh. All I/O goes through the traits in
//! [`ports`].

pub mod auth;
pub mod client;
pub mod context;
pub mod error;
pub mod oauth;
pub mod ports;
pub mod session;

#[cfg(test)]
mod test_support;

pub use auth::{
    AuthService, CredentialStream, PendingRequestTicket, RefreshCoordinator, RequestAuthenticator,
    Subscription, TokenStore,
};
pub use client::{AuthFailurePolicy, AuthenticatedClient};
pub use context::{SessionContext, SessionPorts, SessionSettings};
pub use error::{ClientError, ClientResult, IntegrationAuthError, RefreshError};
pub use oauth::{OAuthRefresher, SweepReport, SweeperHandle, spawn_sweeper};
pub use session::SessionStateMachine;
