//! Connectivity observer.
//!
//! [`ConnectivityMonitor`] holds the last known online/offline state in a
//! `tokio::sync::watch` channel. Subscribers see the current value
//! immediately and are woken only when it actually changes.
//!
//! [`probe::HealthProbe`] feeds the monitor from the remote health endpoint,
//! and [`bind_store`] forwards transitions into a [`TaskStore`].

pub mod probe;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::remote::RemoteTaskService;
use crate::storage::KeyValueStore;
use crate::store::TaskStore;

pub use probe::HealthProbe;

/// Edge-triggered online/offline signal.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor seeded with `online`.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Last known connectivity.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records the current connectivity. Subscribers are notified only if
    /// the value changed; returns whether it did.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online, "connectivity changed");
        }
        changed
    }

    /// Subscribes to transitions. The receiver's current value is the
    /// state at subscription time.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Spawns a task that seeds `store` with the receiver's current value and
/// then forwards every transition to [`TaskStore::set_online_status`].
///
/// The task ends when every sender of the channel is dropped.
pub fn bind_store<S, R>(
    store: Arc<TaskStore<S, R>>,
    mut rx: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: KeyValueStore + 'static,
    R: RemoteTaskService + 'static,
{
    tokio::spawn(async move {
        let initial = *rx.borrow_and_update();
        store.set_online_status(initial).await;

        while rx.changed().await.is_ok() {
            let online = *rx.borrow_and_update();
            store.set_online_status(online).await;
        }
        tracing::debug!("connectivity channel closed, store binding finished");
    })
}
