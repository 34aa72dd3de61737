//! Application configuration.
//!
//! Values are layered: built-in defaults, then an optional `neocrm.toml`,
//! then `NEOCRM_*` environment variables. Nested keys use a double
//! underscore in the environment, e.g. `NEOCRM_OAUTH__SAFETY_MARGIN_SECS`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use neocrm_application::AuthFailurePolicy;
use neocrm_infrastructure::ProviderConfig;
use serde::Deserialize;

use crate::error::AppError;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "neocrm.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "NEOCRM";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

/// Settings of the third-party OAuth refresher.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    /// Refresh tokens expiring within this many seconds.
    pub safety_margin_secs: u64,
    /// Period of the background sweep.
    pub sweep_interval_secs: u64,
    /// Days an expired connection may keep failing transiently before the
    /// sweep removes it.
    pub retention_days: u64,
    /// Token endpoints of the supported providers.
    pub providers: Vec<ProviderConfig>,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            safety_margin_secs: 300,
            sweep_interval_secs: 3600,
            retention_days: 30,
            providers: Vec::new(),
        }
    }
}

/// Resolved configuration of the client host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Base URL of the CRM API, e.g. `https://crm.example.com/api`.
    pub api_base_url: String,
    /// Per-request transport timeout.
    pub request_timeout_ms: u64,
    /// Bound on one session refresh.
    pub refresh_timeout_ms: u64,
    /// Response status treated as an authentication failure.
    pub auth_failure_status: u16,
    /// Where credentials and OAuth connections are persisted.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// OAuth refresher settings.
    #[serde(default)]
    pub oauth: OAuthSettings,
}

impl AppConfig {
    /// Loads configuration from `file` (or `neocrm.toml` when absent) and
    /// the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value has the
    /// wrong type. A missing default file is not an error.
    pub fn load(file: Option<&Path>) -> Result<Self, AppError> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        Self::from_sources(file, env)
    }

    fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self, AppError> {
        let file_source = match file {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE)
                .format(FileFormat::Toml)
                .required(false),
        };

        let mut config: Self = Config::builder()
            .set_default("api_base_url", DEFAULT_API_BASE_URL)?
            .set_default("request_timeout_ms", 30_000_u64)?
            .set_default("refresh_timeout_ms", 10_000_u64)?
            .set_default("auth_failure_status", 401_u64)?
            .add_source(file_source)
            .add_source(env)
            .build()?
            .try_deserialize()?;

        if config.data_dir.is_none() {
            config.data_dir = dirs::data_dir().map(|dir| dir.join("neocrm"));
        }
        Ok(config)
    }

    /// The persistence directory.
    ///
    /// # Errors
    ///
    /// Returns `NoDataDir` when neither the configuration nor the platform
    /// provides one.
    pub fn data_dir(&self) -> Result<&Path, AppError> {
        self.data_dir.as_deref().ok_or(AppError::NoDataDir)
    }

    /// Per-request transport timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Bound on one session refresh.
    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Classification of authentication failures.
    #[must_use]
    pub const fn auth_failure(&self) -> AuthFailurePolicy {
        AuthFailurePolicy::new(self.auth_failure_status)
    }

    /// Refresh-ahead margin for OAuth connections.
    #[must_use]
    pub fn safety_margin(&self) -> chrono::Duration {
        clamped_seconds(self.oauth.safety_margin_secs)
    }

    /// How long an expired OAuth connection is retained across transient
    /// refresh failures.
    #[must_use]
    pub fn retention(&self) -> chrono::Duration {
        clamped_seconds(self.oauth.retention_days.saturating_mul(86_400))
    }

    /// Period of the background sweep.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.oauth.sweep_interval_secs)
    }
}

fn clamped_seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
