//! Listener tasks that let the cache react to its surroundings.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheCore;
use crate::sync::MessageReceiver;

/// Applies every message from peer contexts to the local memory store, in
/// arrival order, until the transport goes away.
pub(crate) fn spawn_message_listener(
    core: Arc<CacheCore>,
    mut receiver: MessageReceiver,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Listening for cache messages from peer contexts");
        while let Some(message) = receiver.recv().await {
            core.apply_message(message).await;
        }
        info!("Cross-context transport closed, cache is local to this context");
    })
}

/// Forwards connectivity transitions to the cache.
pub(crate) fn spawn_network_listener(
    core: Arc<CacheCore>,
    mut online_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    // Read the starting state before spawning so no transition is missed.
    let mut was_online = *online_rx.borrow_and_update();

    tokio::spawn(async move {
        while online_rx.changed().await.is_ok() {
            let online = *online_rx.borrow_and_update();
            if online != was_online {
                was_online = online;
                core.on_connectivity_change(online).await;
            }
        }
        debug!("Network monitor dropped, no longer tracking connectivity");
    })
}
