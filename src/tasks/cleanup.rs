//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheCore;

/// Spawns a background task that periodically cleans up expired entries in
/// memory and in the durable store.
///
/// The task runs until aborted, sleeping for `interval` between runs.
/// Returns None, and spawns nothing, for a zero interval.
pub(crate) fn spawn_cleanup_task(
    core: Arc<CacheCore>,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        warn!("Cleanup interval is zero, periodic cleanup disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        info!("Starting TTL cleanup task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let report = core.cleanup().await;

            if report.memory_removed + report.durable_removed > 0 {
                info!(
                    "TTL cleanup: removed {} memory entries and {} durable records",
                    report.memory_removed, report.durable_removed
                );
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    }))
}
