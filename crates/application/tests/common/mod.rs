//! Fake ports shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use neocrm_application::ports::{
    AuthApi, AuthApiError, Clock, CredentialStorage, HttpClient, HttpClientError, Navigator,
    OAuthConnectionRepository, ProviderRefreshError, ProviderTokenClient, StorageError,
};
use neocrm_application::{SessionContext, SessionPorts, SessionSettings};
use neocrm_domain::{
    ApiRequest, ApiResponse, AuthResponse, ConnectionKey, Credential, LogoutReason,
    OAuthConnection, ProviderToken, UserSummary,
};
use parking_lot::Mutex;
use tokio::sync::watch;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
}

pub struct PinnedClock(pub DateTime<Utc>);

impl Clock for PinnedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn user() -> UserSummary {
    UserSummary::new("42", "acme", "SALES_REP", "Grace Hopper")
}

/// A credential whose access token expired one second ago.
pub fn expired_credential(access: &str, refresh: &str) -> Credential {
    Credential {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        token_type: "Bearer".to_string(),
        expires_at: Some(now() - chrono::Duration::seconds(1)),
        user: user(),
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    stored: Mutex<Option<Credential>>,
    clears: AtomicUsize,
}

impl MemoryStorage {
    pub fn stored(&self) -> Option<Credential> {
        self.stored.lock().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self.stored.lock().clone())
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        *self.stored.lock() = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.stored.lock() = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct LoginScreen {
    redirects: Mutex<Vec<LogoutReason>>,
}

impl LoginScreen {
    pub fn redirects(&self) -> Vec<LogoutReason> {
        self.redirects.lock().clone()
    }
}

impl Navigator for LoginScreen {
    fn redirect_to_login(&self, reason: LogoutReason) {
        self.redirects.lock().push(reason);
    }
}

/// Refresh endpoint that holds calls until released and answers with a
/// JSON body, as the backend would.
pub struct RefreshEndpoint {
    body: Result<serde_json::Value, u16>,
    open: watch::Sender<bool>,
    calls: watch::Sender<usize>,
}

impl RefreshEndpoint {
    pub fn answering(body: serde_json::Value) -> Self {
        Self {
            body: Ok(body),
            open: watch::channel(false).0,
            calls: watch::channel(0).0,
        }
    }

    pub fn failing_with(status: u16) -> Self {
        Self {
            body: Err(status),
            open: watch::channel(false).0,
            calls: watch::channel(0).0,
        }
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

#[async_trait]
impl AuthApi for RefreshEndpoint {
    async fn login(&self, _email: &str, _password: &str) -> Result<AuthResponse, AuthApiError> {
        Err(AuthApiError::Rejected {
            status: 401,
            message: "not used".to_string(),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<AuthResponse, AuthApiError> {
        self.calls.send_modify(|calls| *calls += 1);
        let _ = self.open.subscribe().wait_for(|open| *open).await;
        match &self.body {
            Ok(body) => serde_json::from_value(body.clone())
                .map_err(|error| AuthApiError::InvalidResponse(error.to_string())),
            Err(status) => Err(AuthApiError::Rejected {
                status: *status,
                message: "Invalid refresh token".to_string(),
            }),
        }
    }

    async fn logout(&self, _refresh_token: &str) -> Result<(), AuthApiError> {
        Ok(())
    }
}

/// CRM backend that accepts one access token.
pub struct Backend {
    accepted: String,
    seen: Mutex<Vec<ApiRequest>>,
    count: watch::Sender<usize>,
}

impl Backend {
    pub fn accepting(token: &str) -> Self {
        Self {
            accepted: token.to_string(),
            seen: Mutex::new(Vec::new()),
            count: watch::channel(0).0,
        }
    }

    pub fn seen(&self) -> Vec<ApiRequest> {
        self.seen.lock().clone()
    }

    pub async fn wait_for_requests(&self, n: usize) {
        let _ = self.count.subscribe().wait_for(|count| *count >= n).await;
    }
}

#[async_trait]
impl HttpClient for Backend {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, HttpClientError> {
        self.seen.lock().push(request.clone());
        self.count.send_modify(|count| *count += 1);
        let status = if request.bearer_token() == Some(self.accepted.as_str()) {
            200
        } else {
            401
        };
        Ok(ApiResponse::json_body(
            status,
            &serde_json::json!({"success": status == 200, "data": {"path": request.path}}),
        ))
    }
}

pub struct Harness {
    pub context: SessionContext,
    pub storage: Arc<MemoryStorage>,
    pub endpoint: Arc<RefreshEndpoint>,
    pub backend: Arc<Backend>,
    pub login_screen: Arc<LoginScreen>,
}

pub async fn logged_in(endpoint: RefreshEndpoint, backend: Backend) -> Harness {
    let storage = Arc::new(MemoryStorage::default());
    let endpoint = Arc::new(endpoint);
    let backend = Arc::new(backend);
    let login_screen = Arc::new(LoginScreen::default());

    let context = SessionContext::new(
        SessionPorts {
            http: backend.clone(),
            auth_api: endpoint.clone(),
            storage: storage.clone(),
            clock: Arc::new(PinnedClock(now())),
            navigator: login_screen.clone(),
        },
        SessionSettings::default(),
    );
    context
        .store()
        .save(expired_credential("tok1", "ref1"))
        .await
        .unwrap();

    Harness {
        context,
        storage,
        endpoint,
        backend,
        login_screen,
    }
}

#[derive(Default)]
pub struct ConnectionTable {
    rows: Mutex<BTreeMap<ConnectionKey, OAuthConnection>>,
}

impl ConnectionTable {
    pub fn get(&self, key: &ConnectionKey) -> Option<OAuthConnection> {
        self.rows.lock().get(key).cloned()
    }
}

#[async_trait]
impl OAuthConnectionRepository for ConnectionTable {
    async fn find(&self, key: &ConnectionKey) -> Result<Option<OAuthConnection>, StorageError> {
        Ok(self.get(key))
    }

    async fn upsert(&self, connection: &OAuthConnection) -> Result<(), StorageError> {
        self.rows.lock().insert(connection.key(), connection.clone());
        Ok(())
    }

    async fn delete(&self, key: &ConnectionKey) -> Result<bool, StorageError> {
        Ok(self.rows.lock().remove(key).is_some())
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<OAuthConnection>, StorageError> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|connection| connection.is_expired(now))
            .cloned()
            .collect())
    }

    async fn list_for_user(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Vec<OAuthConnection>, StorageError> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Token endpoint that accepts exactly one refresh token.
pub struct TokenEndpoint {
    pub valid_refresh_token: String,
}

#[async_trait]
impl ProviderTokenClient for TokenEndpoint {
    async fn refresh(
        &self,
        _provider: &str,
        refresh_token: &str,
    ) -> Result<ProviderToken, ProviderRefreshError> {
        if refresh_token == self.valid_refresh_token {
            Ok(ProviderToken {
                access_token: "ya29.new".to_string(),
                refresh_token: None,
                expires_in: Some(3599),
                scope: Some("https://mail.google.com/".to_string()),
            })
        } else {
            Err(ProviderRefreshError::Revoked {
                reason: "invalid_grant".to_string(),
            })
        }
    }
}
