//! Durable keyed storage of channel records.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::channel::Channel;
use crate::codec::types::ChannelId;

/// Failures of the storage backend.
///
/// These are infrastructure errors, distinct from the engine's validation
/// taxonomy: callers may retry the operation that surfaced them.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("channel store unavailable: {0}")]
    Unavailable(String),
    /// A record violates the engine's own invariants (e.g. a closing channel
    /// without a pending state). Not produced by [MemoryStore]; backends
    /// deserializing foreign bytes may surface it.
    #[error("corrupt channel record: {0}")]
    Corrupt(String),
}

/// Keyed storage of [Channel] records, indexed by [ChannelId].
///
/// Implementations must be durable: once `put` returns `Ok`, the record has
/// to survive a process restart, because the engine keeps no channel state
/// in memory and recovers purely from this store.
pub trait ChannelStore: Send + Sync {
    fn put(&self, channel: Channel) -> Result<(), StoreError>;
    fn get(&self, id: ChannelId) -> Result<Option<Channel>, StoreError>;
    fn list(&self) -> Result<Vec<Channel>, StoreError>;
}

/// A shared store is still a store. Lets an engine be rebuilt over an
/// existing backend, which is how restart recovery works.
impl<T: ChannelStore> ChannelStore for Arc<T> {
    fn put(&self, channel: Channel) -> Result<(), StoreError> {
        (**self).put(channel)
    }

    fn get(&self, id: ChannelId) -> Result<Option<Channel>, StoreError> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<Channel>, StoreError> {
        (**self).list()
    }
}

/// Map-backed store.
///
/// Durable only for the lifetime of the process; serves as the baseline
/// backend and as the test double.
#[derive(Debug, Default)]
pub struct MemoryStore {
    channels: RwLock<HashMap<ChannelId, Channel>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChannelStore for MemoryStore {
    fn put(&self, channel: Channel) -> Result<(), StoreError> {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.id, channel);
        Ok(())
    }

    fn get(&self, id: ChannelId) -> Result<Option<Channel>, StoreError> {
        Ok(self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }

    fn list(&self) -> Result<Vec<Channel>, StoreError> {
        Ok(self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }
}
