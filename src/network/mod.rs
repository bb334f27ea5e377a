//! Network Module
//!
//! Connectivity observation. The cache reacts to offline → online
//! transitions by checking its critical keys; it never fetches data itself.

use tokio::sync::watch;

/// Capability interface of a connectivity source.
pub trait NetworkMonitor: Send + Sync {
    /// Last known connectivity.
    fn is_online(&self) -> bool;

    /// Receiver notified on every connectivity change.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

// == Connectivity Monitor ==
/// Connectivity state fed by whoever observes the network: the connectivity
/// probe task, an HTTP override, or a test.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self { state }
    }

    /// Records the current connectivity. Subscribers are only woken when the
    /// value actually changes.
    pub fn set_online(&self, online: bool) {
        self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkMonitor for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}
