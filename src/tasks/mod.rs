//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of a cache service.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired entries from both tiers at a fixed interval
//! - Message listener: Applies cache messages sent by peer contexts
//! - Network listener: Reacts to connectivity transitions
//! - Connectivity probe: Feeds a `ConnectivityMonitor` from TCP reachability

mod cleanup;
mod listeners;
mod probe;

pub(crate) use cleanup::spawn_cleanup_task;
pub(crate) use listeners::{spawn_message_listener, spawn_network_listener};
pub use probe::spawn_connectivity_probe;
