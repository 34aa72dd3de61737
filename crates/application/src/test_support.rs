//! In-memory fakes for the ports, used by unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use neocrm_domain::{
    ApiRequest, ApiResponse, AuthResponse, ConnectionKey, Credential, LogoutReason,
    OAuthConnection, ProviderToken, UserSummary,
};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::ports::{
    AuthApi, AuthApiError, Clock, CredentialStorage, HttpClient, HttpClientError, Navigator,
    OAuthConnectionRepository, ProviderRefreshError, ProviderTokenClient, StorageError,
};

pub fn user() -> UserSummary {
    UserSummary::new("u-1", "t-1", "AGENT", "Ada Agent")
}

pub fn credential(access: &str, refresh: &str) -> Credential {
    Credential {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        token_type: "Bearer".to_string(),
        expires_at: None,
        user: user(),
    }
}

pub fn auth_response(access: &str, refresh: &str) -> AuthResponse {
    AuthResponse {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        token_type: "Bearer".to_string(),
        expires_in: Some(900),
        user: user(),
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

/// Credential storage held in memory.
#[derive(Default)]
pub struct MemoryStorage {
    stored: Mutex<Option<Credential>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn with(credential: Credential) -> Self {
        Self {
            stored: Mutex::new(Some(credential)),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> Option<Credential> {
        self.stored.lock().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self.stored.lock().clone())
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        self.check_writable()?;
        *self.stored.lock() = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.check_writable()?;
        *self.stored.lock() = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<LogoutReason>>,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> Vec<LogoutReason> {
        self.redirects.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self, reason: LogoutReason) {
        self.redirects.lock().push(reason);
    }
}

/// Clock pinned to a settable instant.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn at(time: DateTime<Utc>) -> Self {
        Self(Mutex::new(time))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock() += by;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::at(epoch())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

/// Holds calls until released when gated.
struct Gate(watch::Sender<bool>);

impl Gate {
    fn new(open: bool) -> Self {
        Self(watch::channel(open).0)
    }

    async fn pass(&self) {
        let mut open = self.0.subscribe();
        let _ = open.wait_for(|open| *open).await;
    }

    fn open(&self) {
        self.0.send_replace(true);
    }
}

/// Auth endpoints answering with preset results.
pub struct ScriptedAuthApi {
    login: Mutex<Result<AuthResponse, AuthApiError>>,
    refresh: Mutex<Result<AuthResponse, AuthApiError>>,
    logout: Mutex<Result<(), AuthApiError>>,
    gate: Gate,
    panic_on_refresh: AtomicBool,
    refresh_calls: watch::Sender<usize>,
    refresh_tokens: Mutex<Vec<String>>,
    logout_tokens: Mutex<Vec<String>>,
}

impl ScriptedAuthApi {
    fn with_refresh(refresh: Result<AuthResponse, AuthApiError>) -> Self {
        Self {
            login: Mutex::new(Ok(auth_response("tok1", "ref1"))),
            refresh: Mutex::new(refresh),
            logout: Mutex::new(Ok(())),
            gate: Gate::new(true),
            panic_on_refresh: AtomicBool::new(false),
            refresh_calls: watch::channel(0).0,
            refresh_tokens: Mutex::new(Vec::new()),
            logout_tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(access: &str, refresh: &str) -> Self {
        Self::with_refresh(Ok(auth_response(access, refresh)))
    }

    pub fn answering(response: AuthResponse) -> Self {
        Self::with_refresh(Ok(response))
    }

    pub fn rejecting() -> Self {
        Self::with_refresh(Err(AuthApiError::Rejected {
            status: 401,
            message: "refresh token expired".to_string(),
        }))
    }

    /// Hold refresh calls until [`ScriptedAuthApi::release`].
    pub fn gated(self) -> Self {
        Self {
            gate: Gate::new(false),
            ..self
        }
    }

    /// Panic inside refresh calls, after counting them.
    pub fn panicking(self) -> Self {
        self.panic_on_refresh.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_logout(self, error: AuthApiError) -> Self {
        *self.logout.lock() = Err(error);
        self
    }

    pub fn login_answering(self, response: AuthResponse) -> Self {
        *self.login.lock() = Ok(response);
        self
    }

    pub fn failing_login(self, error: AuthApiError) -> Self {
        *self.login.lock() = Err(error);
        self
    }

    pub fn release(&self) {
        self.gate.open();
    }

    pub async fn wait_for_calls(&self, calls: usize) {
        let mut count = self.refresh_calls.subscribe();
        let _ = count.wait_for(|count| *count >= calls).await;
    }

    pub fn refresh_calls(&self) -> usize {
        *self.refresh_calls.borrow()
    }

    pub fn last_refresh_token(&self) -> Option<String> {
        self.refresh_tokens.lock().last().cloned()
    }

    pub fn logout_tokens(&self) -> Vec<String> {
        self.logout_tokens.lock().clone()
    }
}

#[async_trait]
impl AuthApi for ScriptedAuthApi {
    async fn login(&self, _email: &str, _password: &str) -> Result<AuthResponse, AuthApiError> {
        self.login.lock().clone()
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, AuthApiError> {
        self.refresh_tokens.lock().push(refresh_token.to_string());
        self.refresh_calls.send_modify(|count| *count += 1);
        self.gate.pass().await;
        assert!(
            !self.panic_on_refresh.load(Ordering::SeqCst),
            "refresh endpoint blew up"
        );
        self.refresh.lock().clone()
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthApiError> {
        self.logout_tokens.lock().push(refresh_token.to_string());
        self.logout.lock().clone()
    }
}

/// Backend accepting exactly one bearer token; anything else gets 401.
pub struct TokenCheckingBackend {
    valid_token: Mutex<String>,
    requests: Mutex<Vec<ApiRequest>>,
    reject_everything: AtomicBool,
    network_down: AtomicBool,
}

impl TokenCheckingBackend {
    pub fn accepting(token: &str) -> Self {
        Self {
            valid_token: Mutex::new(token.to_string()),
            requests: Mutex::new(Vec::new()),
            reject_everything: AtomicBool::new(false),
            network_down: AtomicBool::new(false),
        }
    }

    pub fn reject_everything(&self) {
        self.reject_everything.store(true, Ordering::SeqCst);
    }

    pub fn network_down(&self) {
        self.network_down.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn bearer_tokens(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .iter()
            .map(|request| request.bearer_token().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl HttpClient for TokenCheckingBackend {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, HttpClientError> {
        self.requests.lock().push(request.clone());
        if self.network_down.load(Ordering::SeqCst) {
            return Err(HttpClientError::ConnectionFailed("connection refused".to_string()));
        }
        let accepted = !self.reject_everything.load(Ordering::SeqCst)
            && request.bearer_token() == Some(self.valid_token.lock().as_str());
        if accepted {
            Ok(ApiResponse::json_body(
                200,
                &serde_json::json!({"path": request.path}),
            ))
        } else {
            Ok(ApiResponse::json_body(
                401,
                &serde_json::json!({"message": "token expired"}),
            ))
        }
    }
}

/// Connection repository held in memory.
#[derive(Default)]
pub struct MemoryConnections {
    rows: Mutex<BTreeMap<ConnectionKey, OAuthConnection>>,
}

impl MemoryConnections {
    pub fn with(connections: impl IntoIterator<Item = OAuthConnection>) -> Self {
        Self {
            rows: Mutex::new(
                connections
                    .into_iter()
                    .map(|connection| (connection.key(), connection))
                    .collect(),
            ),
        }
    }

    pub fn get(&self, key: &ConnectionKey) -> Option<OAuthConnection> {
        self.rows.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }
}

#[async_trait]
impl OAuthConnectionRepository for MemoryConnections {
    async fn find(&self, key: &ConnectionKey) -> Result<Option<OAuthConnection>, StorageError> {
        Ok(self.get(key))
    }

    async fn upsert(&self, connection: &OAuthConnection) -> Result<(), StorageError> {
        self.rows
            .lock()
            .insert(connection.key(), connection.clone());
        Ok(())
    }

    async fn delete(&self, key: &ConnectionKey) -> Result<bool, StorageError> {
        Ok(self.rows.lock().remove(key).is_some())
    }

    async fn find_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<OAuthConnection>, StorageError> {
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
            .filter(|connection| connection.tenant_id == tenant_id && connection.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Provider token endpoint answering per provider with preset results.
pub struct ScriptedProvider {
    results: Mutex<BTreeMap<String, Result<ProviderToken, ProviderRefreshError>>>,
    gate: Gate,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(BTreeMap::new()),
            gate: Gate::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn gated(self) -> Self {
        Self {
            gate: Gate::new(false),
            ..self
        }
    }

    pub fn answer(self, provider: &str, result: Result<ProviderToken, ProviderRefreshError>) -> Self {
        self.results.lock().insert(provider.to_string(), result);
        self
    }

    pub fn release(&self) {
        self.gate.open();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderTokenClient for ScriptedProvider {
    async fn refresh(
        &self,
        provider: &str,
        _refresh_token: &str,
    ) -> Result<ProviderToken, ProviderRefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;
        self.results
            .lock()
            .get(provider)
            .cloned()
            .unwrap_or_else(|| Err(ProviderRefreshError::UnknownProvider(provider.to_string())))
    }
}

pub fn provider_token(access: &str, expires_in: i64) -> ProviderToken {
    ProviderToken {
        access_token: access.to_string(),
        refresh_token: None,
        expires_in: Some(expires_in),
        scope: None,
    }
}

pub fn connection(provider: &str, expires_at: Option<DateTime<Utc>>) -> OAuthConnection {
    let key = ConnectionKey::new("t-1", "u-1", provider).unwrap();
    OAuthConnection::new(
        &key,
        format!("{provider}-access"),
        Some(format!("{provider}-refresh")),
        expires_at,
        epoch() - Duration::days(30),
    )
}

