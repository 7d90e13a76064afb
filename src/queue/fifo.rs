use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::error::QueueError;

/// Length in bytes of a content hash.
pub const HASH_LEN: usize = 32;

pub type ContentHash = [u8; HASH_LEN];

/// SHA-256 of an item, the identity used by the dedup index.
pub fn hash_item(data: &[u8]) -> ContentHash {
    Sha256::digest(data).into()
}

/// Lock-protected state: the items in arrival order plus a reference count
/// per content hash. `index[h]` always equals the number of items in `items`
/// hashing to `h`, and no zero counts are kept.
#[derive(Default)]
struct Inner {
    items: VecDeque<(ContentHash, Bytes)>,
    index: HashMap<ContentHash, usize>,
}

pub struct FifoQueue {
    name: String,
    allow_duplicates: bool,
    inner: Mutex<Inner>,
    stats: QueueStats,
}

#[derive(Debug, Default)]
pub struct QueueStats {
    enqueued_total: AtomicU64,
    dequeued_total: AtomicU64,
    duplicates_dropped: AtomicU64,
}

/// Point-in-time copy of a queue's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatsSnapshot {
    pub size: usize,
    pub allow_duplicates: bool,
    pub enqueued_total: u64,
    pub dequeued_total: u64,
    pub duplicates_dropped: u64,
}

impl QueueStats {
    pub fn enqueued_total(&self) -> u64 {
        self.enqueued_total.load(Ordering::SeqCst)
    }

    pub fn dequeued_total(&self) -> u64 {
        self.dequeued_total.load(Ordering::SeqCst)
    }

    pub fn duplicates_dropped(&self) -> u64 {
        self.duplicates_dropped.load(Ordering::SeqCst)
    }
}

impl FifoQueue {
    pub fn new(name: impl Into<String>, allow_duplicates: bool) -> Self {
        Self {
            name: name.into(),
            allow_duplicates,
            inner: Mutex::new(Inner::default()),
            stats: QueueStats::default(),
        }
    }

    /// Append an item to the tail.
    ///
    /// When duplicates are not allowed and an item with the same content is
    /// already queued, the new item is dropped and the call still succeeds.
    pub fn enqueue(&self, item: impl Into<Bytes>) -> Result<(), QueueError> {
        let item = item.into();
        let hash = hash_item(&item);

        let mut inner = self.inner.lock();
        if !self.allow_duplicates && inner.index.contains_key(&hash) {
            self.stats.duplicates_dropped.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(queue = %self.name, "duplicate item dropped");
            return Ok(());
        }

        *inner.index.entry(hash).or_insert(0) += 1;
        inner.items.push_back((hash, item));
        self.stats.enqueued_total.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Remove and return the head item.
    pub fn dequeue(&self) -> Result<Bytes, QueueError> {
        let mut inner = self.inner.lock();
        let (hash, item) = inner.items.pop_front().ok_or(QueueError::Empty)?;

        match inner.index.get_mut(&hash) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                inner.index.remove(&hash);
            }
            None => {
                tracing::error!(queue = %self.name, "dedup index lost track of a queued item");
                return Err(QueueError::Integrity);
            }
        }

        self.stats.dequeued_total.fetch_add(1, Ordering::SeqCst);
        Ok(item)
    }

    /// Membership test by content hash. Anything that is not a 32-byte hash
    /// never matches.
    pub fn has(&self, hash: &[u8]) -> bool {
        let Ok(hash) = <&ContentHash>::try_from(hash) else {
            return false;
        };
        self.inner.lock().index.contains_key(hash)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    pub fn size(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allows_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            size: self.size(),
            allow_duplicates: self.allow_duplicates,
            enqueued_total: self.stats.enqueued_total(),
            dequeued_total: self.stats.dequeued_total(),
            duplicates_dropped: self.stats.duplicates_dropped(),
        }
    }

    #[cfg(test)]
    fn corrupt_index(&self, hash: &ContentHash) {
        self.inner.lock().index.remove(hash);
    }
}

impl std::fmt::Debug for FifoQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FifoQueue")
            .field("name", &self.name)
            .field("allow_duplicates", &self.allow_duplicates)
            .field("size", &self.size())
            .finish()
    }
}
