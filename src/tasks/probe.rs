//! Connectivity probe task.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::network::ConnectivityMonitor;

/// Upper bound on a single connection attempt.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Spawns a task that periodically opens a TCP connection to `addr` and
/// reports reachability to `monitor`. Runs until aborted.
pub fn spawn_connectivity_probe(
    monitor: Arc<ConnectivityMonitor>,
    addr: String,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Probing connectivity via {} every {:?}", addr, interval);

        loop {
            let online = matches!(
                timeout(PROBE_TIMEOUT, TcpStream::connect(addr.as_str())).await,
                Ok(Ok(_))
            );
            debug!("Connectivity probe to {}: online={}", addr, online);
            monitor.set_online(online);

            tokio::time::sleep(interval).await;
        }
    })
}
