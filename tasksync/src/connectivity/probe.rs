//! Periodic health probe feeding a [`ConnectivityMonitor`].

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::ConnectivityMonitor;
use crate::remote::RemoteTaskService;

/// Default interval between health checks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Polls [`RemoteTaskService::health_check`] and records the result.
#[derive(Debug)]
pub struct HealthProbe<R> {
    remote: R,
    monitor: ConnectivityMonitor,
    interval: Duration,
}

impl<R: RemoteTaskService + 'static> HealthProbe<R> {
    /// Creates a probe for `remote` that reports into `monitor`.
    pub const fn new(remote: R, monitor: ConnectivityMonitor, interval: Duration) -> Self {
        Self {
            remote,
            monitor,
            interval,
        }
    }

    /// Runs one health check and records it. Returns the observed state.
    pub async fn probe_once(&self) -> bool {
        let online = self.remote.health_check().await;
        self.monitor.set_online(online);
        online
    }

    /// Spawns the polling loop. The first check runs immediately.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let online = self.probe_once().await;
                tracing::trace!(online, "health probe");
            }
        })
    }
}
