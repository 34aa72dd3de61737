//! Derived login state and forced-logout navigation.

use std::sync::Arc;

use neocrm_domain::{LogoutReason, SessionState};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::info;

use crate::auth::{Subscription, TokenStore};
use crate::ports::Navigator;

struct MachineInner {
    state: watch::Sender<SessionState>,
    navigator: Arc<dyn Navigator>,
    last_reason: Mutex<Option<LogoutReason>>,
    subscription: Mutex<Option<Subscription>>,
}

impl MachineInner {
    fn log_in(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == SessionState::LoggedIn {
                return false;
            }
            *state = SessionState::LoggedIn;
            true
        });
        if changed {
            *self.last_reason.lock() = None;
            info!("session logged in");
        }
    }

    fn log_out(&self, reason: LogoutReason) -> bool {
        // The compare-and-set runs under the watch lock, so concurrent
        // triggers produce exactly one transition.
        let changed = self.state.send_if_modified(|state| {
            if *state == SessionState::LoggedOut {
                return false;
            }
            *state = SessionState::LoggedOut;
            true
        });
        if changed {
            *self.last_reason.lock() = Some(reason);
            info!(?reason, "session logged out");
            self.navigator.redirect_to_login(reason);
        }
        changed
    }
}

/// Tracks `LoggedOut`/`LoggedIn` and redirects to the login surface once
/// per logout.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct SessionStateMachine {
    inner: Arc<MachineInner>,
}

impl SessionStateMachine {
    /// Create a machine in `LoggedOut`.
    #[must_use]
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        let (state, _) = watch::channel(SessionState::LoggedOut);
        Self {
            inner: Arc::new(MachineInner {
                state,
                navigator,
                last_reason: Mutex::new(None),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Follow a token store: a stored credential means `LoggedIn`, a cleared
    /// store means `LoggedOut`. Replaces any previous attachment.
    pub fn attach(&self, store: &TokenStore) {
        let weak = Arc::downgrade(&self.inner);
        let subscription = store.subscribe(move |credential| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if credential.is_some() {
                inner.log_in();
            } else {
                inner.log_out(LogoutReason::Cleared);
            }
        });
        *self.inner.subscription.lock() = Some(subscription);
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Receiver of state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Reason of the most recent logout, cleared on the next login.
    #[must_use]
    pub fn last_logout_reason(&self) -> Option<LogoutReason> {
        *self.inner.last_reason.lock()
    }

    /// Transition to `LoggedOut`. Idempotent: returns `false` and skips the
    /// redirect when already logged out.
    pub fn force_logout(&self, reason: LogoutReason) -> bool {
        self.inner.log_out(reason)
    }
}

impl std::fmt::Debug for SessionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStateMachine")
            .field("state", &self.state())
            .field("last_reason", &self.last_logout_reason())
            .finish_non_exhaustive()
    }
}
