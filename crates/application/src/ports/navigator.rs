//! Navigation port

use neocrm_domain::LogoutReason;

/// Presentation surface that shows the login screen.
///
/// Called once per transition to `LoggedOut`; implementations must not block.
pub trait Navigator: Send + Sync {
    /// Redirects the user to the login surface.
    fn redirect_to_login(&self, reason: LogoutReason);
}
