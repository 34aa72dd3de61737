//! NeoCRM session client - command-line entry point
//!
//! Loads configuration, installs logging, wires the session core onto the
//! HTTP and file adapters and runs one command.

mod commands;
mod config;
mod error;
mod host;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::host::Host;

#[derive(Parser)]
#[command(name = "neocrm", version, about = "NeoCRM session client")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (defaults to ./neocrm.toml when present).
    #[arg(long, global = true, env = "NEOCRM_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session credential.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "NEOCRM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and discard the stored credential.
    Logout,
    /// Show the current session.
    Status,
    /// GET an API path with the session credential.
    Get {
        /// Path relative to the API base URL, e.g. `/leads`.
        path: String,
    },
    /// Third-party OAuth connections.
    Oauth {
        #[command(subcommand)]
        action: OauthAction,
    },
}

#[derive(Subcommand)]
enum OauthAction {
    /// Refresh every expired connection once.
    Sweep,
    /// Sweep periodically until interrupted.
    Watch,
    /// Make sure one connection has a usable access token.
    Ensure {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        provider: String,
    },
    /// List the connections of a user.
    List {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        user: String,
    },
    /// Remove a connection.
    Disconnect {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        provider: String,
    },
}

async fn run(cli: Cli) -> Result<String, AppError> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let host = Host::start(config).await?;

    match cli.command {
        Command::Login { email, password } => commands::login(&host, &email, &password).await,
        Command::Logout => commands::logout(&host).await,
        Command::Status => Ok(commands::status(&host)),
        Command::Get { path } => commands::get(&host, &path).await,
        Command::Oauth { action } => match action {
            OauthAction::Sweep => commands::oauth_sweep(&host).await,
            OauthAction::Watch => commands::oauth_watch(&host).await,
            OauthAction::Ensure {
                tenant,
                user,
                provider,
            } => commands::oauth_ensure(&host, &tenant, &user, &provider).await,
            OauthAction::List { tenant, user } => commands::oauth_list(&host, &tenant, &user).await,
            OauthAction::Disconnect {
                tenant,
                user,
                provider,
            } => commands::oauth_disconnect(&host, &tenant, &user, &provider).await,
        },
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()).await {
        Ok(output) => {
            println!("{output}");
            std::process::ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(%error, "command failed");
            eprintln!("error: {error}");
            std::process::ExitCode::FAILURE
        }
    }
}
