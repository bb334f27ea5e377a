//! Broadcast transports between cache contexts.
//!
//! A [`BroadcastHub`] plays the role of a same-origin broadcast channel: every
//! context connected to it receives every message sent by the others, at
//! most once and in send order. Messages travel as JSON so that peers agree
//! only on the wire schema.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::sync::CacheMessage;

/// Default buffer size of the hub channel.
/// Slow receivers lose the oldest messages beyond this limit.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// Capability interface of a cross-context transport.
pub trait Broadcaster: Send + Sync {
    /// Sends `message` to every other connected context.
    fn send(&self, message: &CacheMessage) -> Result<()>;

    /// Opens a receiver for messages from other contexts. None when the
    /// transport cannot deliver messages.
    fn subscribe(&self) -> Option<MessageReceiver>;

    /// Disconnects this context. Later sends fail and later subscriptions
    /// return None.
    fn close(&self);
}

#[derive(Debug, Clone)]
struct Envelope {
    origin: u64,
    payload: Arc<str>,
}

// == Broadcast Hub ==
/// Shared channel that connects cache contexts of one origin.
#[derive(Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<Envelope>,
    next_origin: Arc<AtomicU64>,
}

impl BroadcastHub {
    /// Create a new hub with default buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new hub with custom buffer size.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_origin: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Connects a new context to the hub.
    pub fn connect(&self) -> ChannelBroadcaster {
        ChannelBroadcaster {
            origin: self.next_origin.fetch_add(1, Ordering::Relaxed),
            sender: self.sender.clone(),
            closed: AtomicBool::new(false),
        }
    }

    /// Delivers a raw JSON payload to every connected context, as if sent by
    /// a peer outside this process.
    pub fn inject_raw(&self, payload: &str) -> usize {
        self.sender
            .send(Envelope {
                origin: 0,
                payload: Arc::from(payload),
            })
            .unwrap_or_default()
    }

    /// Number of open receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("receiver_count", &self.receiver_count())
            .finish()
    }
}

// == Channel Broadcaster ==
/// One context's connection to a [`BroadcastHub`].
#[derive(Debug)]
pub struct ChannelBroadcaster {
    origin: u64,
    sender: broadcast::Sender<Envelope>,
    closed: AtomicBool,
}

impl Broadcaster for ChannelBroadcaster {
    fn send(&self, message: &CacheMessage) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Broadcast("channel closed".to_string()));
        }

        let payload = serde_json::to_string(message)?;
        // No receivers just means no other context is listening.
        let delivered = self
            .sender
            .send(Envelope {
                origin: self.origin,
                payload: Arc::from(payload),
            })
            .unwrap_or_default();
        debug!("Broadcast {} to {} receivers", message.kind(), delivered);
        Ok(())
    }

    fn subscribe(&self) -> Option<MessageReceiver> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        Some(MessageReceiver {
            origin: self.origin,
            inner: self.sender.subscribe(),
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

// == Noop Broadcaster ==
/// Transport used when no cross-context channel is available. The cache then
/// only stays consistent within its own context.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn send(&self, _message: &CacheMessage) -> Result<()> {
        Ok(())
    }

    fn subscribe(&self) -> Option<MessageReceiver> {
        None
    }

    fn close(&self) {}
}

// == Message Receiver ==
/// Stream of messages sent by other contexts.
#[derive(Debug)]
pub struct MessageReceiver {
    origin: u64,
    inner: broadcast::Receiver<Envelope>,
}

impl MessageReceiver {
    /// Waits for the next message from another context.
    ///
    /// Own messages and malformed payloads are skipped. Messages lost to lag
    /// are not redelivered. Returns None once the hub is gone.
    pub async fn recv(&mut self) -> Option<CacheMessage> {
        loop {
            match self.inner.recv().await {
                Ok(envelope) if envelope.origin == self.origin => continue,
                Ok(envelope) => match serde_json::from_str(&envelope.payload) {
                    Ok(message) => return Some(message),
                    Err(e) => warn!("Ignoring malformed cache message: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Cache message receiver lagged, {} messages dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
