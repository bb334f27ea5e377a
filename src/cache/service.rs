//! Cache Service Module
//!
//! Orchestrates the memory store, the durable store, the cross-context
//! broadcaster and the network monitor behind one contract: the cache is
//! always available and may simply be cold. No public operation returns an
//! error; failures below are logged and degrade to a miss or to memory-only
//! operation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheStats, DurableStore, MemoryStore};
use crate::config::CacheConfig;
use crate::network::{ConnectivityMonitor, NetworkMonitor};
use crate::storage::{MemoryBackend, StorageBackend};
use crate::sync::{Broadcaster, CacheMessage, NoopBroadcaster};
use crate::tasks::{spawn_cleanup_task, spawn_message_listener, spawn_network_listener};

/// Buffer of the event channel exposed to the rest of the application.
const EVENT_BUFFER_SIZE: usize = 32;

/// Asynchronous producer of a critical entry. Futures are lazy, so a loader
/// whose key is already cached is simply dropped without running.
pub type CriticalLoader = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

// == Set Options ==
/// Per-call options of [`CacheService::set`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Explicit TTL; falls back to the configured TTL class
    pub ttl: Option<Duration>,
    /// Use the priority TTL class
    pub priority: bool,
}

impl SetOptions {
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            priority: false,
        }
    }

    pub fn priority() -> Self {
        Self {
            ttl: None,
            priority: true,
        }
    }
}

// == Cache Events ==
/// Notifications for external collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Online,
    Offline,
    /// Connectivity came back and these critical keys are not cached
    ReloadCritical { keys: Vec<String> },
}

impl CacheEvent {
    /// Event name as seen by the rest of the application.
    pub fn name(&self) -> &'static str {
        match self {
            CacheEvent::Online => "network:online",
            CacheEvent::Offline => "network:offline",
            CacheEvent::ReloadCritical { .. } => "cache:reload_critical",
        }
    }
}

/// Number of entries removed by one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub memory_removed: usize,
    pub durable_removed: usize,
}

/// Outcome of [`CacheService::preload_critical`], per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// Loaded and cached as priority entries
    pub loaded: Vec<String>,
    /// Already cached, loader not run
    pub skipped: Vec<String>,
    /// Loader returned an error or panicked
    pub failed: Vec<String>,
}

// == Cache Core ==
/// State shared between the service handle and its background tasks.
pub(crate) struct CacheCore {
    config: CacheConfig,
    memory: RwLock<MemoryStore>,
    durable: DurableStore,
    broadcaster: Arc<dyn Broadcaster>,
    network: Arc<dyn NetworkMonitor>,
    events: broadcast::Sender<CacheEvent>,
}

impl CacheCore {
    /// Live means not expired and written under the running version.
    fn is_live(&self, entry: &CacheEntry, now_ms: u64) -> bool {
        !entry.is_expired_at(now_ms) && entry.version == self.config.version
    }

    /// Memory first, then durable with promotion. Every unusable record found
    /// on the way is deleted.
    pub(crate) async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let mut memory = self.memory.write().await;

        if let Some(entry) = memory.get(key) {
            if self.is_live(entry, current_timestamp_ms()) {
                let entry = entry.clone();
                memory.touch(key);
                memory.counters_mut().record_hit();
                return Some(entry);
            }
            debug!("Dropping stale memory entry '{}'", key);
            memory.remove(key);
        }

        // The guard stays held so a concurrent write is never replaced by an
        // older durable record.
        let owned = key.to_string();
        match self.with_durable(move |durable| durable.load(&owned)).await.flatten() {
            Some(entry) => {
                if let Some(evicted) = memory.evict_one_if_full(key) {
                    debug!("Evicted '{}' to promote '{}'", evicted, key);
                }
                memory.set(key, entry.clone());
                memory.counters_mut().record_durable_hit();
                Some(entry)
            }
            None => {
                memory.counters_mut().record_miss();
                None
            }
        }
    }

    pub(crate) async fn set_value(&self, key: &str, data: Value, options: SetOptions) {
        let ttl = options.ttl.unwrap_or(if options.priority {
            self.config.priority_ttl
        } else {
            self.config.default_ttl
        });
        let entry = CacheEntry::new(data, ttl, options.priority, self.config.version.as_str());

        {
            let mut memory = self.memory.write().await;
            if let Some(evicted) = memory.evict_one_if_full(key) {
                debug!("Evicted '{}' to make room for '{}'", evicted, key);
            }
            memory.set(key, entry.clone());
        }

        let (owned, persisted) = (key.to_string(), entry.clone());
        let saved = self
            .with_durable(move |durable| durable.save(&owned, &persisted))
            .await
            .unwrap_or(false);
        if !saved {
            debug!("'{}' is cached in memory only", key);
        }
        self.broadcast(CacheMessage::update(key, entry));
    }

    /// Whether a `get` would find `key`. Leaves LRU order, counters and the
    /// memory tier untouched.
    async fn has_live(&self, key: &str) -> bool {
        {
            let memory = self.memory.read().await;
            let now_ms = current_timestamp_ms();
            if memory.get(key).is_some_and(|entry| self.is_live(entry, now_ms)) {
                return true;
            }
        }

        let owned = key.to_string();
        self.with_durable(move |durable| durable.load(&owned))
            .await
            .flatten()
            .is_some()
    }

    /// Runs `op` against the durable store on the blocking pool, since
    /// backends may do synchronous file I/O. None if the task did not finish.
    async fn with_durable<R, F>(&self, op: F) -> Option<R>
    where
        F: FnOnce(&DurableStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        let durable = self.durable.clone();
        match tokio::task::spawn_blocking(move || op(&durable)).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Durable store operation did not complete: {}", e);
                None
            }
        }
    }

    pub(crate) async fn cleanup(&self) -> CleanupReport {
        let memory_removed = self
            .memory
            .write()
            .await
            .remove_expired(current_timestamp_ms());
        let durable_removed = self
            .with_durable(|durable| durable.sweep_expired())
            .await
            .unwrap_or(0);

        CleanupReport {
            memory_removed,
            durable_removed,
        }
    }

    /// Applies a message received from another context. Updates are trusted
    /// as sent; clears only touch this context's memory.
    pub(crate) async fn apply_message(&self, message: CacheMessage) {
        match message {
            CacheMessage::Update { key, data, .. } => {
                let mut memory = self.memory.write().await;
                memory.evict_one_if_full(&key);
                memory.set(&key, data);
                debug!("Applied remote update of '{}'", key);
            }
            CacheMessage::Clear { key: Some(key), .. } => {
                self.memory.write().await.remove(&key);
                debug!("Applied remote delete of '{}'", key);
            }
            CacheMessage::Clear { key: None, .. } => {
                self.memory.write().await.clear();
                debug!("Applied remote clear");
            }
            CacheMessage::Sync { timestamp } => {
                debug!("Received cache sync from peer (sent at {})", timestamp);
            }
        }
    }

    pub(crate) async fn on_connectivity_change(&self, online: bool) {
        if !online {
            info!("Network offline");
            self.emit(CacheEvent::Offline);
            return;
        }

        info!("Network back online");
        self.emit(CacheEvent::Online);

        let mut missing = Vec::new();
        for key in &self.config.critical_keys {
            if !self.has_live(key).await {
                missing.push(key.clone());
            }
        }
        if !missing.is_empty() {
            info!("Critical entries missing after reconnect: {:?}", missing);
            self.emit(CacheEvent::ReloadCritical { keys: missing });
        }
    }

    fn broadcast(&self, message: CacheMessage) {
        if let Err(e) = self.broadcaster.send(&message) {
            warn!("Cross-context {} not delivered: {}", message.kind(), e);
        }
    }

    fn emit(&self, event: CacheEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

// == Builder ==
/// Assembles a [`CacheService`] from its collaborators. Anything not supplied
/// falls back to a process-local default: an unbounded memory backend, no
/// cross-context transport, and an always-online monitor.
pub struct CacheServiceBuilder {
    config: CacheConfig,
    backend: Option<Arc<dyn StorageBackend>>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    network: Option<Arc<dyn NetworkMonitor>>,
}

impl CacheServiceBuilder {
    pub fn backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn network(mut self, network: Arc<dyn NetworkMonitor>) -> Self {
        self.network = Some(network);
        self
    }

    /// Builds the service and starts its background tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> CacheService {
        let config = self.config;
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryBackend::unbounded()));
        let broadcaster = self.broadcaster.unwrap_or_else(|| {
            info!("No cross-context transport configured, cache is local to this context");
            Arc::new(NoopBroadcaster)
        });
        let network = self
            .network
            .unwrap_or_else(|| Arc::new(ConnectivityMonitor::default()));
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);

        let core = Arc::new(CacheCore {
            memory: RwLock::new(MemoryStore::new(config.max_memory_entries)),
            durable: DurableStore::new(
                backend,
                config.storage_prefix.as_str(),
                config.version.as_str(),
            ),
            broadcaster,
            network,
            events,
            config,
        });

        let mut tasks = Vec::new();
        if let Some(handle) = spawn_cleanup_task(Arc::clone(&core), core.config.cleanup_interval) {
            tasks.push(handle);
        }
        match core.broadcaster.subscribe() {
            Some(receiver) => tasks.push(spawn_message_listener(Arc::clone(&core), receiver)),
            None => debug!("Broadcaster offers no receiver, not listening for peers"),
        }
        let network_rx = core.network.subscribe();
        tasks.push(spawn_network_listener(Arc::clone(&core), network_rx));

        info!(
            "Cache service started: version={}, prefix={}, max_memory_entries={}",
            core.config.version, core.config.storage_prefix, core.config.max_memory_entries
        );

        CacheService {
            core,
            tasks: Mutex::new(tasks),
            destroyed: AtomicBool::new(false),
        }
    }
}

// == Cache Service ==
/// One cache context: memory + durable tiers kept in sync with peer contexts.
pub struct CacheService {
    core: Arc<CacheCore>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl CacheService {
    /// Builds a service with default collaborators.
    pub fn new(config: CacheConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: CacheConfig) -> CacheServiceBuilder {
        CacheServiceBuilder {
            config,
            backend: None,
            broadcaster: None,
            network: None,
        }
    }

    // == Set ==
    /// Caches `data` under `key`, replacing any previous entry.
    ///
    /// Evicts the least recently used entry when memory is full, persists
    /// best-effort and notifies peer contexts.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T, options: SetOptions) {
        match serde_json::to_value(data) {
            Ok(value) => self.core.set_value(key, value, options).await,
            Err(e) => warn!("Not caching '{}', payload does not serialize: {}", key, e),
        }
    }

    // == Get ==
    /// Returns the live value under `key`, or None on any kind of miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.core.lookup(key).await?;
        match serde_json::from_value(entry.data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Cached value of '{}' does not match the requested type: {}", key, e);
                None
            }
        }
    }

    /// Returns the raw entry under `key`, with the same semantics as `get`.
    pub async fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        self.core.lookup(key).await
    }

    // == Delete ==
    /// Removes `key` from both tiers and tells peers to drop it.
    pub async fn delete(&self, key: &str) {
        self.core.memory.write().await.remove(key);
        let owned = key.to_string();
        self.core
            .with_durable(move |durable| durable.remove(&owned))
            .await;
        self.core.broadcast(CacheMessage::clear(Some(key.to_string())));
    }

    // == Clear ==
    /// Removes every entry of this cache from both tiers and tells peers to
    /// clear their memory.
    pub async fn clear(&self) {
        self.core.memory.write().await.clear();
        let removed = self
            .core
            .with_durable(|durable| durable.clear())
            .await
            .unwrap_or(0);
        debug!("Cleared cache, {} durable records removed", removed);
        self.core.broadcast(CacheMessage::clear(None));
    }

    // == Cleanup ==
    /// Removes expired entries from memory and sweeps the durable store.
    pub async fn cleanup(&self) -> CleanupReport {
        self.core.cleanup().await
    }

    // == Preload Critical ==
    /// Runs the loaders of all keys not already cached, concurrently, and
    /// caches each success as a priority entry. A failing or panicking loader
    /// only affects its own key. Resolves once every loader has settled.
    pub async fn preload_critical(
        &self,
        loaders: HashMap<String, CriticalLoader>,
    ) -> PreloadReport {
        let mut report = PreloadReport::default();
        let mut pending = JoinSet::new();

        for (key, loader) in loaders {
            if self.core.lookup(&key).await.is_some() {
                report.skipped.push(key);
                continue;
            }

            let core = Arc::clone(&self.core);
            pending.spawn(async move {
                // Run the loader as its own task so a panic surfaces as a JoinError.
                match tokio::spawn(loader).await {
                    Ok(Ok(value)) => {
                        core.set_value(&key, value, SetOptions::priority()).await;
                        Ok(key)
                    }
                    Ok(Err(e)) => {
                        warn!("Critical loader for '{}' failed: {:#}", key, e);
                        Err(key)
                    }
                    Err(e) => {
                        warn!("Critical loader for '{}' aborted: {}", key, e);
                        Err(key)
                    }
                }
            });
        }

        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok(Ok(key)) => report.loaded.push(key),
                Ok(Err(key)) => report.failed.push(key),
                Err(e) => warn!("Critical preload task failed: {}", e),
            }
        }

        info!(
            "Critical preload finished: {} loaded, {} already cached, {} failed",
            report.loaded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    // == Stats ==
    /// Returns a read-only snapshot of the cache.
    pub async fn stats(&self) -> CacheStats {
        let memory = self.core.memory.read().await;
        CacheStats::new(
            memory.len(),
            memory.max_entries(),
            memory.access_counter(),
            memory.counters(),
            self.core.network.is_online(),
            self.core.config.version.as_str(),
        )
    }

    /// Applies a cross-context message as if it had arrived from a peer.
    pub async fn apply_message(&self, message: CacheMessage) {
        self.core.apply_message(message).await;
    }

    /// Subscribes to connectivity and reload events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<CacheEvent> {
        self.core.events.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.core.network.is_online()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.core.config
    }

    /// Whether `key` is resident in memory, without touching LRU order.
    pub async fn in_memory(&self, key: &str) -> bool {
        self.core.memory.read().await.contains(key)
    }

    /// Number of background tasks still running.
    pub fn active_tasks(&self) -> usize {
        self.lock_tasks().iter().filter(|h| !h.is_finished()).count()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    // == Destroy ==
    /// Stops background tasks, closes the broadcaster and empties memory.
    /// Safe to call any number of times.
    pub async fn destroy(&self) {
        let first = !self.destroyed.swap(true, Ordering::AcqRel);

        self.abort_tasks();
        self.core.broadcaster.close();
        self.core.memory.write().await.clear();

        if first {
            info!("Cache service destroyed");
        }
    }

    fn abort_tasks(&self) {
        for handle in self.lock_tasks().drain(..) {
            handle.abort();
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        // A poisoned list of handles is still a valid list of handles.
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for CacheService {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("version", &self.core.config.version)
            .field("prefix", &self.core.config.storage_prefix)
            .field("durable", &self.core.durable)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
