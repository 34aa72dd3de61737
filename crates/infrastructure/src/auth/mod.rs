//! Third-party `OAuth2` token endpoints.

mod oauth2_provider;

pub use oauth2_provider::{OAuth2TokenClient, ProviderConfig};
