//! Network and system adapters.

mod auth_api;
mod reqwest_client;
mod system_clock;

pub use auth_api::{HttpAuthApi, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH};
pub use reqwest_client::{DEFAULT_REQUEST_TIMEOUT, ReqwestHttpClient};
pub use system_clock::SystemClock;
