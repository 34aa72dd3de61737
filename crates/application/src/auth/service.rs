//! Login, logout and session restore.

use std::sync::Arc;

use neocrm_domain::{Credential, LogoutReason};
use tracing::{info, warn};

use crate::auth::TokenStore;
use crate::error::{ClientError, ClientResult};
use crate::ports::{AuthApi, AuthApiError, Clock};
use crate::session::SessionStateMachine;

/// Session entry and exit points.
#[derive(Clone)]
pub struct AuthService {
    store: TokenStore,
    api: Arc<dyn AuthApi>,
    clock: Arc<dyn Clock>,
    session: SessionStateMachine,
}

impl AuthService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        store: TokenStore,
        api: Arc<dyn AuthApi>,
        clock: Arc<dyn Clock>,
        session: SessionStateMachine,
    ) -> Self {
        Self {
            store,
            api,
            clock,
            session,
        }
    }

    /// Exchange credentials for a session and store it.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationFailed` when the server rejects the
    /// credentials, `Network` on transport failure, `Decode` when the
    /// payload carries an unusable token lifetime and `Storage` when the
    /// credential cannot be persisted.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Arc<Credential>> {
        let response = self.api.login(email, password).await.map_err(|error| match error {
            AuthApiError::Rejected { status, .. } => ClientError::AuthenticationFailed { status },
            AuthApiError::Network(message) => ClientError::Network(message),
            AuthApiError::InvalidResponse(message) => ClientError::Decode(message),
        })?;

        let credential = Credential::from_auth_response(response, self.clock.now())
            .map_err(|error| ClientError::Decode(error.to_string()))?;
        info!(user_id = %credential.user.id, tenant_id = %credential.user.tenant_id, "logged in");
        self.store.save(credential).await?;
        self.store
            .get()
            .ok_or_else(|| ClientError::Storage("credential vanished after login".to_string()))
    }

    /// End the session.
    ///
    /// The server-side revocation is best effort: its failure is logged and
    /// the local credential is cleared regardless.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the persisted credential could not be removed;
    /// the session is logged out in memory even then.
    pub async fn logout(&self) -> ClientResult<()> {
        if let Some(credential) = self.store.get()
            && let Err(error) = self.api.logout(&credential.refresh_token).await
        {
            warn!(%error, "server logout failed, clearing local session anyway");
        }

        self.session.force_logout(LogoutReason::Explicit);
        self.store.clear().await?;
        info!("logged out");
        Ok(())
    }

    /// Load the persisted session at startup. Returns whether one was found.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the persisted credential cannot be read.
    pub async fn restore(&self) -> ClientResult<bool> {
        let restored = self.store.restore().await?;
        if restored {
            info!("session restored");
        }
        Ok(restored)
    }

    /// The store this service writes to.
    #[must_use]
    pub const fn store(&self) -> &TokenStore {
        &self.store
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("store", &self.store)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
