//! Errors surfaced by the command-line host.

use neocrm_application::ports::HttpClientError;
use neocrm_application::{ClientError, IntegrationAuthError};
use neocrm_domain::DomainError;
use thiserror::Error;

/// Host-level error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// No persistence directory is configured or known for the platform.
    #[error("no data directory available; set NEOCRM_DATA_DIR")]
    NoDataDir,

    /// The API transport could not be built.
    #[error("cannot create API client: {0}")]
    Transport(#[from] HttpClientError),

    /// The OAuth token client could not be built.
    #[error("cannot create OAuth client: {0}")]
    OAuthClient(String),

    /// A session operation failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// An OAuth connection operation failed.
    #[error(transparent)]
    Integration(#[from] IntegrationAuthError),

    /// Invalid input.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The command needs a signed-in session.
    #[error("not logged in; run `neocrm login` first")]
    NotLoggedIn,
}
