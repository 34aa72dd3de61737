//! Wiring of the session core onto the real adapters.

use std::sync::Arc;

use neocrm_application::ports::Navigator;
use neocrm_application::{OAuthRefresher, SessionContext, SessionPorts, SessionSettings};
use neocrm_domain::LogoutReason;
use neocrm_infrastructure::{
    FileCredentialStorage, FileOAuthConnectionRepository, HttpAuthApi, OAuth2TokenClient,
    ReqwestHttpClient, SystemClock, TokioFileSystem,
};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppError;

/// Login surface of a terminal session: the user is told to sign in again.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn redirect_to_login(&self, reason: LogoutReason) {
        warn!(?reason, "{}; run `neocrm login`", reason.message());
    }
}

/// Process-wide session plus the OAuth refresher.
#[derive(Clone)]
pub struct Host {
    session: SessionContext,
    oauth: OAuthRefresher,
    config: AppConfig,
}

impl Host {
    /// Builds every component from `config` and restores a persisted login.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be built or the persisted
    /// credential cannot be read.
    pub async fn start(config: AppConfig) -> Result<Self, AppError> {
        let data_dir = config.data_dir()?.to_path_buf();
        let clock = Arc::new(SystemClock);

        let http = Arc::new(ReqwestHttpClient::new(
            &config.api_base_url,
            config.request_timeout(),
        )?);
        let ports = SessionPorts {
            http: http.clone(),
            auth_api: Arc::new(HttpAuthApi::new(http)),
            storage: Arc::new(FileCredentialStorage::new(TokioFileSystem::new(), &data_dir)),
            clock: clock.clone(),
            navigator: Arc::new(ConsoleNavigator),
        };
        let settings = SessionSettings {
            refresh_timeout: config.refresh_timeout(),
            auth_failure: config.auth_failure(),
        };
        let session = SessionContext::new(ports, settings);
        let restored = session.auth().restore().await?;

        let provider = OAuth2TokenClient::new(
            config.oauth.providers.iter().cloned(),
            config.request_timeout(),
        )
        .map_err(|e| AppError::OAuthClient(e.to_string()))?;
        let oauth = OAuthRefresher::new(
            Arc::new(FileOAuthConnectionRepository::new(TokioFileSystem::new(), &data_dir)),
            Arc::new(provider),
            clock,
        )
        .with_safety_margin(config.safety_margin())
        .with_retention(config.retention());

        info!(
            api = %config.api_base_url,
            data_dir = %data_dir.display(),
            restored,
            "session host started"
        );
        Ok(Self {
            session,
            oauth,
            config,
        })
    }

    /// The client session.
    #[must_use]
    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    /// The OAuth connection refresher.
    #[must_use]
    pub const fn oauth(&self) -> &OAuthRefresher {
        &self.oauth
    }

    /// The loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("api_base_url", &self.config.api_base_url)
            .finish_non_exhaustive()
    }
}
