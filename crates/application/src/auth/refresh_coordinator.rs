//! Single-flight credential refresh.
//!
//! When several requests fail authentication at the same time, only the
//! first one starts a refresh. Every caller, including the first, registers
//! a [`PendingRequestTicket`] and waits on it; the refresh task resolves
//! all tickets with the same outcome.
//!
//! The refresh runs in its own task, so a cancelled caller (a dropped
//! ticket) never cancels or corrupts the shared refresh.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use neocrm_domain::{Credential, LogoutReason};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::auth::TokenStore;
use crate::error::RefreshError;
use crate::ports::{AuthApi, AuthApiError, Clock};
use crate::session::SessionStateMachine;

/// Default bound on the refresh call.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

type Waiter = oneshot::Sender<Result<String, RefreshError>>;

enum RefreshState {
    Idle,
    Refreshing { queue: BTreeMap<u64, Waiter> },
}

struct CoordinatorInner {
    store: TokenStore,
    api: Arc<dyn AuthApi>,
    clock: Arc<dyn Clock>,
    session: SessionStateMachine,
    timeout: Duration,
    state: Mutex<RefreshState>,
    next_ticket: AtomicU64,
    refreshes: AtomicU64,
}

impl CoordinatorInner {
    /// Transition to `Idle` and hand back the queued waiters.
    fn finish_cycle(&self) -> BTreeMap<u64, Waiter> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, RefreshState::Idle) {
            RefreshState::Refreshing { queue } => queue,
            RefreshState::Idle => BTreeMap::new(),
        }
    }

    async fn request_credential(&self) -> Result<Credential, RefreshError> {
        let refresh_token = self
            .store
            .get()
            .map(|credential| credential.refresh_token.clone())
            .filter(|token| !token.is_empty())
            .ok_or(RefreshError::MissingRefreshToken)?;

        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let response = tokio::time::timeout(self.timeout, self.api.refresh(&refresh_token))
            .await
            .map_err(|_| RefreshError::Timeout { timeout_ms })?
            .map_err(|error| match error {
                AuthApiError::Rejected { message, .. } => RefreshError::Rejected(message),
                AuthApiError::Network(message) => RefreshError::Network(message),
                AuthApiError::InvalidResponse(message) => {
                    RefreshError::Rejected(format!("invalid refresh response: {message}"))
                }
            })?;

        Credential::from_auth_response(response, self.clock.now())
            .map_err(|error| RefreshError::Rejected(format!("invalid refresh response: {error}")))
    }

    async fn run_cycle(self: Arc<Self>) {
        let mut guard = CycleGuard {
            inner: self.clone(),
            armed: true,
        };
        let cycle = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        info!(cycle, "credential refresh started");

        let outcome = match self.request_credential().await {
            Ok(credential) => {
                let access_token = credential.access_token.clone();
                self.store
                    .save(credential)
                    .await
                    .map(|()| access_token)
                    .map_err(|error| RefreshError::Storage(error.to_string()))
            }
            Err(error) => Err(error),
        };

        match outcome {
            Ok(access_token) => {
                let waiters = guard.finish();
                info!(cycle, waiters = waiters.len(), "credential refresh succeeded");
                for waiter in waiters.into_values() {
                    let _ = waiter.send(Ok(access_token.clone()));
                }
            }
            Err(error) => {
                warn!(cycle, %error, "credential refresh failed, logging out");
                // Signalled first so the single logout transition carries
                // the refresh failure as its reason.
                self.session.force_logout(LogoutReason::RefreshFailed);
                if let Err(clear_error) = self.store.clear().await {
                    warn!(%clear_error, "failed to clear credential after refresh failure");
                }
                let waiters = guard.finish();
                for waiter in waiters.into_values() {
                    let _ = waiter.send(Err(error.clone()));
                }
            }
        }
    }
}

/// Ends a cycle that stops without resolving its waiters (task aborted or
/// panicked) the way a failed refresh ends: the session is logged out, the
/// credential cleared and the coordinator returned to `Idle`. Dropped
/// senders surface as [`RefreshError::Aborted`].
struct CycleGuard {
    inner: Arc<CoordinatorInner>,
    armed: bool,
}

impl CycleGuard {
    /// Completes the cycle normally. Once disarmed, the guard no longer
    /// touches the state, which may already belong to the next cycle.
    fn finish(&mut self) -> BTreeMap<u64, Waiter> {
        self.armed = false;
        self.inner.finish_cycle()
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.inner.session.force_logout(LogoutReason::RefreshFailed);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let store = self.inner.store.clone();
            runtime.spawn(async move {
                if let Err(error) = store.clear().await {
                    warn!(%error, "failed to clear credential after aborted refresh");
                }
            });
        }
        let abandoned = self.inner.finish_cycle();
        warn!(waiters = abandoned.len(), "refresh cycle aborted, logging out");
    }
}

/// A caller waiting on the in-flight refresh.
///
/// Dropping the ticket removes it from the queue without affecting the
/// refresh or the other waiters.
#[must_use = "a ticket does nothing unless awaited"]
pub struct PendingRequestTicket {
    id: u64,
    receiver: oneshot::Receiver<Result<String, RefreshError>>,
    coordinator: Arc<CoordinatorInner>,
}

impl PendingRequestTicket {
    /// Wait for the refresh outcome: the new access token, or the error
    /// every waiter receives.
    ///
    /// # Errors
    ///
    /// Returns the refresh failure shared by all waiters.
    pub async fn wait(mut self) -> Result<String, RefreshError> {
        (&mut self.receiver)
            .await
            .unwrap_or(Err(RefreshError::Aborted))
    }
}

impl Drop for PendingRequestTicket {
    fn drop(&mut self) {
        let mut state = self.coordinator.state.lock();
        if let RefreshState::Refreshing { queue } = &mut *state
            && queue.remove(&self.id).is_some()
        {
            debug!(ticket = self.id, "waiter left the refresh queue");
        }
    }
}

impl std::fmt::Debug for PendingRequestTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequestTicket")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Serializes recovery from credential expiry across concurrent callers.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl RefreshCoordinator {
    /// Creates a coordinator writing refreshed credentials to `store` and
    /// forcing `session` out when a refresh fails. Each refresh call is
    /// bounded by `timeout`.
    #[must_use]
    pub fn new(
        store: TokenStore,
        api: Arc<dyn AuthApi>,
        clock: Arc<dyn Clock>,
        session: SessionStateMachine,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                api,
                clock,
                session,
                timeout,
                state: Mutex::new(RefreshState::Idle),
                next_ticket: AtomicU64::new(0),
                refreshes: AtomicU64::new(0),
            }),
        }
    }

    /// Register for the outcome of a refresh, starting one if none is in
    /// flight.
    ///
    /// `stale_access_token` is the token the failed request carried. If
    /// the store already holds a different token, a refresh completed after
    /// that request was sent: the ticket resolves at once with the current
    /// token and no new refresh starts.
    ///
    /// Must be called within a Tokio runtime.
    pub fn enqueue(&self, stale_access_token: Option<&str>) -> PendingRequestTicket {
        let (sender, receiver) = oneshot::channel();
        let id = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        let ticket = PendingRequestTicket {
            id,
            receiver,
            coordinator: self.inner.clone(),
        };

        let mut state = self.inner.state.lock();
        match &mut *state {
            RefreshState::Refreshing { queue } => {
                queue.insert(id, sender);
                debug!(ticket = id, queued = queue.len(), "joined in-flight refresh");
            }
            RefreshState::Idle => {
                let current = self.inner.store.get();
                if let (Some(current), Some(stale)) = (current.as_ref(), stale_access_token)
                    && current.access_token != stale
                {
                    debug!(ticket = id, "credential already refreshed");
                    let _ = sender.send(Ok(current.access_token.clone()));
                    return ticket;
                }

                *state = RefreshState::Refreshing {
                    queue: BTreeMap::from([(id, sender)]),
                };
                drop(state);
                tokio::spawn(self.inner.clone().run_cycle());
            }
        }
        ticket
    }

    /// Wait for a fresh access token; see [`RefreshCoordinator::enqueue`].
    ///
    /// # Errors
    ///
    /// Returns the refresh failure. By then the credential has been cleared
    /// and the session logged out.
    pub async fn await_fresh_token(
        &self,
        stale_access_token: Option<&str>,
    ) -> Result<String, RefreshError> {
        self.enqueue(stale_access_token).wait().await
    }

    /// Whether a refresh is in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.state.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of callers waiting on the in-flight refresh.
    #[must_use]
    pub fn queued(&self) -> usize {
        match &*self.inner.state.lock() {
            RefreshState::Refreshing { queue } => queue.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Number of refresh calls started so far.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.inner.refreshes.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("refresh_count", &self.refresh_count())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}
