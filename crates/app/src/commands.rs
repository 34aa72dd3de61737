//! Command implementations. Each returns the text printed on success.

use std::fmt::Write as _;

use chrono::SecondsFormat;
use neocrm_application::SweepReport;
use neocrm_domain::ConnectionKey;
use tracing::info;

use crate::error::AppError;
use crate::host::Host;

/// Signs in and persists the credential.
pub async fn login(host: &Host, email: &str, password: &str) -> Result<String, AppError> {
    let credential = host.session().auth().login(email, password).await?;
    let user = &credential.user;
    let tenant = user.tenant_name.as_deref().unwrap_or(&user.tenant_id);
    Ok(format!("Signed in as {} ({}, {})", user.display_name, tenant, user.role))
}

/// Signs out locally; the server-side revocation is best effort.
pub async fn logout(host: &Host) -> Result<String, AppError> {
    if !host.session().store().is_logged_in() {
        return Ok("Already signed out".to_string());
    }
    host.session().auth().logout().await?;
    Ok("Signed out".to_string())
}

/// Describes the current session.
#[must_use]
pub fn status(host: &Host) -> String {
    let Some(credential) = host.session().store().get() else {
        return format!("{:?}: not signed in", host.session().session().state());
    };

    let mut out = format!(
        "{:?}: {} <{}>",
        host.session().session().state(),
        credential.user.display_name,
        credential.user.email.as_deref().unwrap_or("no email"),
    );
    let _ = write!(out, "\ntenant: {}", credential.user.tenant_id);
    if let Some(expires_at) = credential.expires_at {
        let _ = write!(
            out,
            "\naccess token expires: {}",
            expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }
    out
}

/// Fetches `path` from the API with the session credential. An expired
/// access token is refreshed and the request replayed transparently.
pub async fn get(host: &Host, path: &str) -> Result<String, AppError> {
    if !host.session().store().is_logged_in() {
        return Err(AppError::NotLoggedIn);
    }
    let response = host.session().client().get(path).await?;
    let body = response.json::<serde_json::Value>().map_or_else(
        |_| response.text(),
        |value| serde_json::to_string_pretty(&value).unwrap_or_else(|_| response.text()),
    );
    Ok(format!("HTTP {}\n{body}", response.status))
}

/// Refreshes every expired OAuth connection once.
pub async fn oauth_sweep(host: &Host) -> Result<String, AppError> {
    let report = host.oauth().sweep_expired().await?;
    Ok(describe_sweep(report))
}

/// Returns a usable access token for one connection, refreshing it first
/// when it is about to expire.
pub async fn oauth_ensure(
    host: &Host,
    tenant: &str,
    user: &str,
    provider: &str,
) -> Result<String, AppError> {
    let key = ConnectionKey::new(tenant, user, provider)?;
    let token = host.oauth().ensure_fresh(&key).await?;
    let expires = token.expires_at.map_or_else(
        || "no expiry".to_string(),
        |at| format!("expires {}", at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    Ok(format!("{}: token ready, {expires}", token.key))
}

/// Lists the OAuth connections of one user.
pub async fn oauth_list(host: &Host, tenant: &str, user: &str) -> Result<String, AppError> {
    let connections = host.oauth().connections_for(tenant, user).await?;
    if connections.is_empty() {
        return Ok(format!("no connections for {tenant}/{user}"));
    }
    let now = chrono::Utc::now();
    let lines: Vec<String> = connections
        .iter()
        .map(|connection| {
            let state = if connection.is_expired(now) {
                "expired"
            } else {
                "active"
            };
            format!("{} [{state}]", connection.key())
        })
        .collect();
    Ok(lines.join("\n"))
}

/// Removes one OAuth connection.
pub async fn oauth_disconnect(
    host: &Host,
    tenant: &str,
    user: &str,
    provider: &str,
) -> Result<String, AppError> {
    let key = ConnectionKey::new(tenant, user, provider)?;
    let message = if host.oauth().disconnect(&key).await? {
        format!("{key}: disconnected")
    } else {
        format!("{key}: not connected")
    };
    Ok(message)
}

/// Runs the periodic sweep until interrupted.
pub async fn oauth_watch(host: &Host) -> Result<String, AppError> {
    let interval = host.config().sweep_interval();
    let sweeper = neocrm_application::spawn_sweeper(host.oauth().clone(), interval);
    info!(interval_secs = interval.as_secs(), "press Ctrl-C to stop");

    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "cannot listen for Ctrl-C; stopping sweeper");
    }
    sweeper.shutdown().await;
    Ok("Sweeper stopped".to_string())
}

fn describe_sweep(report: SweepReport) -> String {
    format!(
        "examined {}: {} refreshed, {} evicted (reconnect required), {} retained",
        report.examined(),
        report.refreshed,
        report.evicted,
        report.retained
    )
}
