//! Committed Block Window
//!
//! A [`BlockSet`] holds one slot per committed height. Only a fully populated
//! set can be turned into [`CompletedBlocks`], which is the sole input type the
//! seed engine accepts, so a partial (cancelled) set can never be drawn from.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hash::BlockHash;

/// Maximum number of committed blocks.
pub const MAX_BLOCKS: u8 = 5;

/// Errors when filling a block set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockSetError {
    /// Height lies outside the committed window.
    #[error("height {height} outside committed window [{start}, {end}]")]
    OutOfWindow {
        /// Offending height.
        height: u64,
        /// First committed height.
        start: u64,
        /// Last committed height.
        end: u64,
    },
    /// Slot already holds a different hash.
    #[error("height {0} already filled with a different hash")]
    Conflict(u64),
}

/// Slots for heights `start_height .. start_height + K`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSet {
    start_height: u64,
    slots: Vec<Option<BlockHash>>,
}

impl BlockSet {
    /// Empty set of `block_count` slots starting at `start_height`.
    pub fn new(start_height: u64, block_count: u8) -> Self {
        Self {
            start_height,
            slots: vec![None; block_count as usize],
        }
    }

    /// First committed height.
    pub fn start_height(&self) -> u64 {
        self.start_height
    }

    /// Last committed height.
    pub fn end_height(&self) -> u64 {
        self.start_height + self.slots.len() as u64 - 1
    }

    /// Number of slots (K).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when K is zero.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Hash stored at `height`, if any.
    pub fn get(&self, height: u64) -> Option<BlockHash> {
        let offset = height.checked_sub(self.start_height)? as usize;
        self.slots.get(offset).copied().flatten()
    }

    /// Store the hash observed at `height`.
    ///
    /// Re-filling a slot with the same hash is a no-op.
    pub fn fill(&mut self, height: u64, hash: BlockHash) -> Result<(), BlockSetError> {
        let out_of_window = BlockSetError::OutOfWindow {
            height,
            start: self.start_height,
            end: self.end_height(),
        };
        let offset = match height.checked_sub(self.start_height) {
            Some(offset) if (offset as usize) < self.slots.len() => offset as usize,
            _ => return Err(out_of_window),
        };
        match self.slots[offset] {
            Some(existing) if existing != hash => Err(BlockSetError::Conflict(height)),
            _ => {
                self.slots[offset] = Some(hash);
                Ok(())
            }
        }
    }

    /// Lowest height still missing a hash.
    pub fn next_missing(&self) -> Option<u64> {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(|offset| self.start_height + offset as u64)
    }

    /// Number of empty slots.
    pub fn remaining(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    /// True when every slot is filled.
    pub fn is_complete(&self) -> bool {
        self.remaining() == 0 && !self.slots.is_empty()
    }

    /// Filled hashes in height order (gaps skipped).
    pub fn known_hashes(&self) -> impl Iterator<Item = (u64, BlockHash)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|hash| (self.start_height + i as u64, hash)))
    }

    /// Convert into a completed set; returns the set unchanged if slots remain empty.
    pub fn into_completed(self) -> Result<CompletedBlocks, BlockSet> {
        if !self.is_complete() {
            return Err(self);
        }
        let hashes = self.slots.iter().flatten().copied().collect();
        Ok(CompletedBlocks {
            start_height: self.start_height,
            hashes,
        })
    }
}

/// A fully populated committed window, ascending by height.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedBlocks {
    start_height: u64,
    hashes: Vec<BlockHash>,
}

impl CompletedBlocks {
    /// Build from already-known hashes (e.g. when replaying a transcript).
    ///
    /// Returns `None` when the list is empty or longer than [`MAX_BLOCKS`].
    pub fn from_hashes(start_height: u64, hashes: Vec<BlockHash>) -> Option<Self> {
        if hashes.is_empty() || hashes.len() > MAX_BLOCKS as usize {
            return None;
        }
        Some(Self {
            start_height,
            hashes,
        })
    }

    /// First committed height.
    pub fn start_height(&self) -> u64 {
        self.start_height
    }

    /// Hashes in ascending height order.
    pub fn hashes(&self) -> &[BlockHash] {
        &self.hashes
    }

    /// Number of blocks (K).
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Always false for a constructed value.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Concatenated raw hash bytes, the base material for every draw.
    pub fn base_material(&self) -> Vec<u8> {
        self.hashes.iter().flat_map(|h| h.as_bytes().iter().copied()).collect()
    }
}
