//! Third-party OAuth connection refresh and eviction.
//!
//! Integration services call [`OAuthRefresher::ensure_fresh`] before using
//! a provider token. Refreshes are single-flight per connection key: a
//! second caller for the same key waits on the first and then re-reads the
//! stored connection instead of refreshing again.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use neocrm_domain::{ConnectionKey, OAuthConnection, ProviderAccessToken};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::IntegrationAuthError;
use crate::ports::{Clock, OAuthConnectionRepository, ProviderRefreshError, ProviderTokenClient};

/// Headroom before expiry inside which a token is refreshed ahead of use.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::minutes(5);

/// How long past expiry a connection survives repeated transient refresh
/// failures before the sweep removes it.
pub const DEFAULT_RETENTION: Duration = Duration::days(30);

/// Counts produced by one sweep over expired connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections refreshed successfully.
    pub refreshed: usize,
    /// Connections deleted because their grant is unusable, their provider
    /// is no longer configured or they stayed expired past the retention
    /// horizon.
    pub evicted: usize,
    /// Connections kept after a transient failure.
    pub retained: usize,
}

impl SweepReport {
    /// Counts an eviction attempt; a connection that could not be deleted
    /// stays behind and is counted as retained.
    fn tally_eviction(&mut self, outcome: &IntegrationAuthError) {
        if matches!(outcome, IntegrationAuthError::ReconsentRequired { .. }) {
            self.evicted += 1;
        } else {
            self.retained += 1;
        }
    }

    /// Number of connections examined.
    #[must_use]
    pub const fn examined(&self) -> usize {
        self.refreshed + self.evicted + self.retained
    }
}

type KeyGuard = Arc<tokio::sync::Mutex<()>>;

/// Keeps third-party OAuth connections usable.
///
/// Cloning is cheap; clones share the per-key guards.
#[derive(Clone)]
pub struct OAuthRefresher {
    repository: Arc<dyn OAuthConnectionRepository>,
    provider: Arc<dyn ProviderTokenClient>,
    clock: Arc<dyn Clock>,
    safety_margin: Duration,
    retention: Duration,
    guards: Arc<Mutex<HashMap<ConnectionKey, KeyGuard>>>,
}

impl OAuthRefresher {
    /// Creates a refresher with the default safety margin.
    #[must_use]
    pub fn new(
        repository: Arc<dyn OAuthConnectionRepository>,
        provider: Arc<dyn ProviderTokenClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            provider,
            clock,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            retention: DEFAULT_RETENTION,
            guards: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Sets the refresh-ahead margin.
    #[must_use]
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    /// Sets how long an expired connection may keep failing transiently
    /// before a sweep removes it.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Return a usable access token for `key`, refreshing it first when it
    /// expires within the safety margin.
    ///
    /// # Errors
    ///
    /// - `NotConnected` when no connection exists
    /// - `ReconsentRequired` when the grant is revoked or has no refresh
    ///   token; the connection has been deleted
    /// - `Unavailable` when the provider failed transiently; the connection
    ///   is kept
    pub async fn ensure_fresh(
        &self,
        key: &ConnectionKey,
    ) -> Result<ProviderAccessToken, IntegrationAuthError> {
        let connection = self.load(key).await?;
        if connection.is_fresh(self.clock.now(), self.safety_margin) {
            return Ok(Self::access_token(connection));
        }

        let connection = self.refresh_guarded(key).await?;
        Ok(Self::access_token(connection))
    }

    /// Stores a connection from a completed consent flow, replacing any
    /// previous grant for the same key.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the connection cannot be written.
    pub async fn connect(&self, connection: OAuthConnection) -> Result<(), IntegrationAuthError> {
        self.repository.upsert(&connection).await?;
        info!(connection = %connection.key(), "oauth connection stored");
        Ok(())
    }

    /// Removes a connection. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the connection cannot be deleted.
    pub async fn disconnect(&self, key: &ConnectionKey) -> Result<bool, IntegrationAuthError> {
        let removed = self.repository.delete(key).await?;
        if removed {
            info!(connection = %key, "oauth connection removed");
        }
        Ok(removed)
    }

    /// Connections of one user.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the repository cannot be read.
    pub async fn connections_for(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Vec<OAuthConnection>, IntegrationAuthError> {
        Ok(self.repository.list_for_user(tenant_id, user_id).await?)
    }

    /// Refresh every connection whose access token has expired.
    ///
    /// Unusable grants and connections of providers without a token
    /// endpoint are evicted. A transient failure keeps the connection for
    /// the next sweep until it has been expired for longer than the
    /// retention horizon; then it is evicted too.
    ///
    /// # Errors
    ///
    /// Returns `Storage` only if the expired set cannot be listed.
    pub async fn sweep_expired(&self) -> Result<SweepReport, IntegrationAuthError> {
        let now = self.clock.now();
        let expired = self.repository.find_expired(now).await?;
        let mut report = SweepReport::default();

        for connection in expired {
            let key = connection.key();
            match self.refresh_guarded(&key).await {
                Ok(_) => report.refreshed += 1,
                Err(IntegrationAuthError::ReconsentRequired { .. }) => report.evicted += 1,
                Err(IntegrationAuthError::NotConnected { .. }) => {
                    debug!(connection = %key, "connection removed during sweep");
                }
                Err(IntegrationAuthError::UnsupportedProvider(provider)) => {
                    let outcome = self
                        .evict(&key, format!("no token endpoint configured for {provider}"))
                        .await;
                    report.tally_eviction(&outcome);
                }
                Err(error) if self.past_retention(&connection, now) => {
                    let outcome = self
                        .evict(&key, format!("expired beyond retention: {error}"))
                        .await;
                    report.tally_eviction(&outcome);
                }
                Err(error) => {
                    debug!(connection = %key, %error, "connection retained");
                    report.retained += 1;
                }
            }
        }

        if report.examined() > 0 {
            info!(
                refreshed = report.refreshed,
                evicted = report.evicted,
                retained = report.retained,
                "oauth sweep finished"
            );
        }
        Ok(report)
    }

    fn past_retention(&self, connection: &OAuthConnection, now: DateTime<Utc>) -> bool {
        now.checked_sub_signed(self.retention)
            .zip(connection.expires_at)
            .is_some_and(|(horizon, expires_at)| expires_at < horizon)
    }

    /// Safety margin in use.
    #[must_use]
    pub const fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    async fn load(&self, key: &ConnectionKey) -> Result<OAuthConnection, IntegrationAuthError> {
        self.repository
            .find(key)
            .await?
            .ok_or_else(|| IntegrationAuthError::NotConnected {
                key: key.to_string(),
                provider: key.provider.clone(),
            })
    }

    fn guard_for(&self, key: &ConnectionKey) -> KeyGuard {
        let mut guards = self.guards.lock();
        guards.retain(|_, guard| Arc::strong_count(guard) > 1);
        guards.entry(key.clone()).or_default().clone()
    }

    async fn refresh_guarded(
        &self,
        key: &ConnectionKey,
    ) -> Result<OAuthConnection, IntegrationAuthError> {
        let guard = self.guard_for(key);
        let _single_flight = guard.lock().await;

        // Another task may have refreshed or removed it while we waited.
        let mut connection = self.load(key).await?;
        let now = self.clock.now();
        if connection.is_fresh(now, self.safety_margin) {
            debug!(connection = %key, "refreshed by a concurrent caller");
            return Ok(connection);
        }

        let Some(refresh_token) = connection.refresh_token.clone().filter(|t| !t.is_empty()) else {
            return Err(self
                .evict(key, "no refresh token stored".to_string())
                .await);
        };

        match self.provider.refresh(&key.provider, &refresh_token).await {
            Ok(token) => {
                if let Err(error) = connection.apply_refresh(token, self.clock.now()) {
                    warn!(connection = %key, %error, "provider returned an unusable token");
                    return Err(IntegrationAuthError::Unavailable {
                        provider: key.provider.clone(),
                        reason: error.to_string(),
                    });
                }
                self.repository.upsert(&connection).await?;
                info!(connection = %key, expires_at = ?connection.expires_at, "oauth token refreshed");
                Ok(connection)
            }
            Err(ProviderRefreshError::Revoked { reason }) => Err(self.evict(key, reason).await),
            Err(ProviderRefreshError::RetryLater { reason }) => {
                warn!(connection = %key, %reason, "provider refresh failed, will retry");
                Err(IntegrationAuthError::Unavailable {
                    provider: key.provider.clone(),
                    reason,
                })
            }
            Err(ProviderRefreshError::UnknownProvider(provider)) => {
                warn!(connection = %key, "no token endpoint configured");
                Err(IntegrationAuthError::UnsupportedProvider(provider))
            }
        }
    }

    async fn evict(&self, key: &ConnectionKey, reason: String) -> IntegrationAuthError {
        warn!(connection = %key, %reason, "oauth grant unusable, removing connection");
        if let Err(error) = self.repository.delete(key).await {
            return IntegrationAuthError::Storage(error.to_string());
        }
        IntegrationAuthError::ReconsentRequired {
            key: key.to_string(),
            provider: key.provider.clone(),
            reason,
        }
    }

    fn access_token(connection: OAuthConnection) -> ProviderAccessToken {
        ProviderAccessToken {
            key: connection.key(),
            access_token: connection.access_token,
            expires_at: connection.expires_at,
        }
    }
}

impl std::fmt::Debug for OAuthRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthRefresher")
            .field("safety_margin", &self.safety_margin)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_support::{
        FixedClock, MemoryConnections, ScriptedProvider, connection, epoch, provider_token,
    };
    use pretty_assertions::assert_eq;

    fn refresher(
        connections: MemoryConnections,
        provider: ScriptedProvider,
    ) -> (OAuthRefresher, Arc<MemoryConnections>, Arc<ScriptedProvider>) {
        let connections = Arc::new(connections);
        let provider = Arc::new(provider);
        let refresher = OAuthRefresher::new(
            connections.clone(),
            provider.clone(),
            Arc::new(FixedClock::default()),
        );
        (refresher, connections, provider)
    }

    fn key(provider: &str) -> ConnectionKey {
        ConnectionKey::new("t-1", "u-1", provider).unwrap()
    }

    #[tokio::test]
    async fn test_fresh_token_is_returned_without_refresh() {
        let (refresher, _, provider) = refresher(
            MemoryConnections::with([connection("google", Some(epoch() + Duration::hours(1)))]),
            ScriptedProvider::new(),
        );

        let token = refresher.ensure_fresh(&key("google")).await.unwrap();

        assert_eq!(token.access_token, "google-access");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_token_inside_margin_is_refreshed_and_persisted() {
        let (refresher, connections, _) = refresher(
            MemoryConnections::with([connection("google", Some(epoch() + Duration::minutes(2)))]),
            ScriptedProvider::new().answer("google", Ok(provider_token("google-new", 3600))),
        );

        let token = refresher.ensure_fresh(&key("google")).await.unwrap();

        assert_eq!(token.access_token, "google-new");
        let stored = connections.get(&key("google")).unwrap();
        assert_eq!(stored.access_token, "google-new");
        assert_eq!(stored.refresh_token.as_deref(), Some("google-refresh"));
        assert_eq!(stored.expires_at, Some(epoch() + Duration::hours(1)));
        assert_eq!(stored.updated_at, epoch());
    }

    #[tokio::test]
    async fn test_revoked_grant_deletes_connection() {
        let (refresher, connections, _) = refresher(
            MemoryConnections::with([connection("google", Some(epoch() - Duration::minutes(1)))]),
            ScriptedProvider::new().answer(
                "google",
                Err(ProviderRefreshError::Revoked {
                    reason: "invalid_grant".to_string(),
                }),
            ),
        );

        let error = refresher.ensure_fresh(&key("google")).await.unwrap_err();

        assert!(error.requires_reconsent());
        assert!(connections.get(&key("google")).is_none());
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_connection() {
        let (refresher, connections, _) = refresher(
            MemoryConnections::with([connection("google", Some(epoch() - Duration::minutes(1)))]),
            ScriptedProvider::new().answer(
                "google",
                Err(ProviderRefreshError::RetryLater {
                    reason: "503".to_string(),
                }),
            ),
        );

        let error = refresher.ensure_fresh(&key("google")).await.unwrap_err();

        assert!(matches!(error, IntegrationAuthError::Unavailable { .. }));
        assert!(connections.get(&key("google")).is_some());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_requires_reconsent() {
        let mut stale = connection("google", Some(epoch() - Duration::minutes(1)));
        stale.refresh_token = None;
        let (refresher, connections, provider) =
            refresher(MemoryConnections::with([stale]), ScriptedProvider::new());

        let error = refresher.ensure_fresh(&key("google")).await.unwrap_err();

        assert!(matches!(error, IntegrationAuthError::ReconsentRequired { .. }));
        assert_eq!(provider.calls(), 0);
        assert_eq!(connections.len(), 0);
    }

    #[tokio::test]
    async fn test_unknown_connection_is_not_connected() {
        let (refresher, _, _) = refresher(MemoryConnections::default(), ScriptedProvider::new());

        let error = refresher.ensure_fresh(&key("outlook")).await.unwrap_err();

        assert!(matches!(error, IntegrationAuthError::NotConnected { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_provider_call() {
        let (refresher, _, provider) = refresher(
            MemoryConnections::with([connection("google", Some(epoch() - Duration::minutes(1)))]),
            ScriptedProvider::new()
                .answer("google", Ok(provider_token("google-new", 3600)))
                .gated(),
        );

        let mut callers = Vec::new();
        for _ in 0..4 {
            let refresher = refresher.clone();
            callers.push(tokio::spawn(async move {
                refresher.ensure_fresh(&key("google")).await
            }));
        }
        tokio::task::yield_now().await;
        provider.release();

        for caller in callers {
            assert_eq!(caller.await.unwrap().unwrap().access_token, "google-new");
        }
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_sweep_refreshes_evicts_and_retains() {
        let expired = Some(epoch() - Duration::minutes(1));
        let (refresher, connections, _) = refresher(
            MemoryConnections::with([
                connection("google", expired),
                connection("outlook", expired),
                connection("zoom", expired),
                connection("slack", Some(epoch() + Duration::hours(2))),
            ]),
            ScriptedProvider::new()
                .answer("google", Ok(provider_token("google-new", 3600)))
                .answer(
                    "outlook",
                    Err(ProviderRefreshError::Revoked {
                        reason: "invalid_grant".to_string(),
                    }),
                )
                .answer(
                    "zoom",
                    Err(ProviderRefreshError::RetryLater {
                        reason: "429".to_string(),
                    }),
                ),
        );

        let report = refresher.sweep_expired().await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                refreshed: 1,
                evicted: 1,
                retained: 1,
            }
        );
        assert_eq!(connections.len(), 3);
        assert!(connections.get(&key("outlook")).is_none());
        assert_eq!(
            connections.get(&key("slack")).unwrap().access_token,
            "slack-access"
        );
    }

    #[tokio::test]
    async fn test_sweep_evicts_connections_without_token_endpoint() {
        let (refresher, connections, provider) = refresher(
            MemoryConnections::with([connection("legacy-crm", Some(epoch() - Duration::days(2)))]),
            ScriptedProvider::new(),
        );

        let report = refresher.sweep_expired().await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                refreshed: 0,
                evicted: 1,
                retained: 0,
            }
        );
        assert_eq!(provider.calls(), 1);
        assert_eq!(connections.len(), 0);
        assert_eq!(
            refresher.sweep_expired().await.unwrap(),
            SweepReport::default()
        );
    }

    #[tokio::test]
    async fn test_sweep_evicts_transient_failures_past_retention() {
        let retry_later = || {
            Err(ProviderRefreshError::RetryLater {
                reason: "503".to_string(),
            })
        };
        let (refresher, connections, _) = refresher(
            MemoryConnections::with([
                connection("zoom", Some(epoch() - Duration::days(400))),
                connection("teams", Some(epoch() - Duration::days(3))),
            ]),
            ScriptedProvider::new()
                .answer("zoom", retry_later())
                .answer("teams", retry_later()),
        );
        let refresher = refresher.with_retention(Duration::days(30));

        let report = refresher.sweep_expired().await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                refreshed: 0,
                evicted: 1,
                retained: 1,
            }
        );
        assert!(connections.get(&key("zoom")).is_none());
        assert!(connections.get(&key("teams")).is_some());
    }

    #[tokio::test]
    async fn test_unrepresentable_provider_expiry_keeps_connection() {
        let (refresher, connections, _) = refresher(
            MemoryConnections::with([connection("google", Some(epoch() - Duration::minutes(1)))]),
            ScriptedProvider::new().answer("google", Ok(provider_token("google-new", i64::MAX))),
        );

        let error = refresher.ensure_fresh(&key("google")).await.unwrap_err();

        assert!(matches!(error, IntegrationAuthError::Unavailable { .. }));
        assert_eq!(
            connections.get(&key("google")).unwrap().access_token,
            "google-access"
        );
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let (refresher, connections, _) =
            refresher(MemoryConnections::default(), ScriptedProvider::new());

        refresher
            .connect(connection("google", Some(epoch() + Duration::hours(1))))
            .await
            .unwrap();
        assert_eq!(refresher.connections_for("t-1", "u-1").await.unwrap().len(), 1);

        assert!(refresher.disconnect(&key("google")).await.unwrap());
        assert!(!refresher.disconnect(&key("google")).await.unwrap());
        assert_eq!(connections.len(), 0);
    }
}
