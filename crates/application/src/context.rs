//! Wiring of one client session.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthService, DEFAULT_REFRESH_TIMEOUT, RefreshCoordinator, TokenStore};
use crate::client::{AuthFailurePolicy, AuthenticatedClient};
use crate::ports::{AuthApi, Clock, CredentialStorage, HttpClient, Navigator};
use crate::session::SessionStateMachine;

/// Adapters a session is built from.
pub struct SessionPorts {
    /// Transport for CRM API requests.
    pub http: Arc<dyn HttpClient>,
    /// Login, refresh and logout endpoints.
    pub auth_api: Arc<dyn AuthApi>,
    /// Durable credential storage.
    pub storage: Arc<dyn CredentialStorage>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Login surface.
    pub navigator: Arc<dyn Navigator>,
}

/// Tunables of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Bound on a single refresh call.
    pub refresh_timeout: Duration,
    /// Status treated as an authentication failure.
    pub auth_failure: AuthFailurePolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            auth_failure: AuthFailurePolicy::default(),
        }
    }
}

/// One process-wide session: a single store, state machine and refresh
/// coordinator shared by every request.
#[derive(Debug, Clone)]
pub struct SessionContext {
    store: TokenStore,
    session: SessionStateMachine,
    client: AuthenticatedClient,
    auth: AuthService,
}

impl SessionContext {
    /// Build and wire the session components. Call
    /// [`AuthService::restore`] afterwards to pick up a persisted login.
    #[must_use]
    pub fn new(ports: SessionPorts, settings: SessionSettings) -> Self {
        let store = TokenStore::new(ports.storage);
        let session = SessionStateMachine::new(ports.navigator);
        session.attach(&store);

        let coordinator = RefreshCoordinator::new(
            store.clone(),
            ports.auth_api.clone(),
            ports.clock.clone(),
            session.clone(),
            settings.refresh_timeout,
        );
        let client = AuthenticatedClient::new(
            ports.http,
            store.clone(),
            coordinator,
            settings.auth_failure,
        );
        let auth = AuthService::new(store.clone(), ports.auth_api, ports.clock, session.clone());

        Self {
            store,
            session,
            client,
            auth,
        }
    }

    /// The credential store.
    #[must_use]
    pub const fn store(&self) -> &TokenStore {
        &self.store
    }

    /// The session state machine.
    #[must_use]
    pub const fn session(&self) -> &SessionStateMachine {
        &self.session
    }

    /// The authenticated API client.
    #[must_use]
    pub const fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    /// Login, logout and restore.
    #[must_use]
    pub const fn auth(&self) -> &AuthService {
        &self.auth
    }
}
