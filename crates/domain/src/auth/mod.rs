//! Authentication domain types

mod credential;

pub(crate) use credential::expiry_after;
pub use credential::{
    ApiEnvelope, AuthResponse, Credential, DEFAULT_TOKEN_TYPE, UserSummary, authorization_value,
};
