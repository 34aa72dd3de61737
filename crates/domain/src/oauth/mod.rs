//! Third-party OAuth connection types

mod connection;

pub use connection::{ConnectionKey, OAuthConnection, ProviderAccessToken, ProviderToken};
