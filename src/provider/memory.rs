//! In-Memory Hash Source
//!
//! A scripted chain used for tests, demos, and offline replays. Blocks can be
//! appended directly, scheduled to appear only after a number of polls, and
//! the whole source can be switched offline to simulate transport failures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{BlockMeta, HashSource, ProviderError, ProviderKind};
use crate::core::hash::BlockHash;

#[derive(Clone, Copy, Debug)]
struct Entry {
    hash: BlockHash,
    timestamp: u64,
    /// `hash_by_height` misses remaining before the block becomes visible.
    hidden_polls: u32,
}

/// Scripted chain of blocks.
#[derive(Debug)]
pub struct MemoryProvider {
    kind: ProviderKind,
    blocks: Mutex<BTreeMap<u64, Entry>>,
    offline: AtomicBool,
    calls: AtomicU32,
}

impl MemoryProvider {
    /// Empty chain reporting itself as `kind`.
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            blocks: Mutex::new(BTreeMap::new()),
            offline: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        }
    }

    /// Insert a visible block at `height`.
    pub async fn insert(&self, height: u64, hash: BlockHash, timestamp: u64) {
        self.schedule(height, hash, timestamp, 0).await;
    }

    /// Append a visible block on top of the current chain (height 0 when empty).
    pub async fn mine(&self, hash: BlockHash, timestamp: u64) -> u64 {
        let mut blocks = self.blocks.lock().await;
        let height = blocks.keys().next_back().map_or(0, |h| h + 1);
        blocks.insert(
            height,
            Entry {
                hash,
                timestamp,
                hidden_polls: 0,
            },
        );
        height
    }

    /// Insert a block that stays invisible for the next `hidden_polls` lookups.
    pub async fn schedule(&self, height: u64, hash: BlockHash, timestamp: u64, hidden_polls: u32) {
        self.blocks.lock().await.insert(
            height,
            Entry {
                hash,
                timestamp,
                hidden_polls,
            },
        );
    }

    /// Make every call fail with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Total capability calls received.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self, op: &str) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ProviderError::Http {
                url: format!("memory://{}/{}", self.kind.code(), op),
                message: "provider offline".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HashSource for MemoryProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn tip_height(&self) -> Result<u64, ProviderError> {
        self.record_call("tip")?;
        let blocks = self.blocks.lock().await;
        blocks
            .iter()
            .rev()
            .find(|(_, entry)| entry.hidden_polls == 0)
            .map(|(height, _)| *height)
            .ok_or(ProviderError::NotFound(0))
    }

    async fn hash_by_height(&self, height: u64) -> Result<BlockHash, ProviderError> {
        self.record_call("block-height")?;
        let mut blocks = self.blocks.lock().await;
        match blocks.get_mut(&height) {
            Some(entry) if entry.hidden_polls > 0 => {
                entry.hidden_polls -= 1;
                Err(ProviderError::NotFound(height))
            }
            Some(entry) => Ok(entry.hash),
            None => Err(ProviderError::NotFound(height)),
        }
    }

    async fn block_meta(&self, hash: &BlockHash) -> Result<BlockMeta, ProviderError> {
        self.record_call("block")?;
        let blocks = self.blocks.lock().await;
        blocks
            .values()
            .find(|entry| entry.hidden_polls == 0 && entry.hash == *hash)
            .map(|entry| BlockMeta {
                timestamp: entry.timestamp,
            })
            .ok_or_else(|| ProviderError::Status {
                url: format!("memory://{}/block/{}", self.kind.code(), hash),
                status: 404,
            })
    }
}
