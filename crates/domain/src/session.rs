//! Session state types.
//!
//! A client session is either signed in (a credential is held) or signed
//! out. Transitions to `LoggedOut` carry the reason that caused them so
//! the presentation layer can tell a user-initiated logout from a forced one.

use serde::{Deserialize, Serialize};

/// Derived login state of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No credential is held.
    #[default]
    LoggedOut,
    /// A credential is held.
    LoggedIn,
}

impl SessionState {
    /// Returns true when signed in.
    #[must_use]
    pub const fn is_logged_in(self) -> bool {
        matches!(self, Self::LoggedIn)
    }
}

/// Why a session moved to `LoggedOut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// The user asked to log out.
    Explicit,
    /// The credential could not be refreshed.
    RefreshFailed,
    /// The credential was cleared by some other actor.
    Cleared,
}

impl LogoutReason {
    /// Message suitable for the login surface.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Explicit => "You have been logged out",
            Self::RefreshFailed => "Your session has expired, please sign in again",
            Self::Cleared => "Please sign in",
        }
    }
}
