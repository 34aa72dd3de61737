//! Periodic sweep of expired OAuth connections.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::OAuthRefresher;

/// Handle to a running sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the current sweep, if any, to finish.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(error) = self.task.await {
            warn!(%error, "oauth sweeper ended abnormally");
        }
    }

    /// Whether the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Run [`OAuthRefresher::sweep_expired`] every `interval`, starting
/// immediately. Must be called within a Tokio runtime.
#[must_use = "dropping the handle stops the sweeper"]
pub fn spawn_sweeper(refresher: OAuthRefresher, interval: Duration) -> SweeperHandle {
    let (shutdown, mut stop) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "oauth sweeper started");

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(error) = refresher.sweep_expired().await {
                        warn!(%error, "oauth sweep failed");
                    }
                }
            }
        }
        info!("oauth sweeper stopped");
    });

    SweeperHandle { shutdown, task }
}
