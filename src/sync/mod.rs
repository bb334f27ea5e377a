//! Cross-Context Sync Module
//!
//! Fire-and-forget propagation of cache mutations between cache contexts
//! sharing one origin.
//!
//! # Messages
//! - `cache_update` - a context wrote an entry
//! - `cache_clear` - a context deleted one key, or everything
//! - `cache_sync` - reserved, acknowledged only

mod broadcaster;
mod message;

pub use broadcaster::{
    BroadcastHub, Broadcaster, ChannelBroadcaster, MessageReceiver, NoopBroadcaster,
};
pub use message::CacheMessage;
