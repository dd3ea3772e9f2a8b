//! Core deterministic primitives.
//!
//! Everything here is pure: no I/O, no clocks. Given the same committed block
//! hashes, these functions produce identical output on every platform.

pub mod blocks;
pub mod checksum;
pub mod hash;
pub mod rng;

// Re-export core types
pub use blocks::{BlockSet, BlockSetError, CompletedBlocks, MAX_BLOCKS};
pub use checksum::{checksum, checksum_matches};
pub use hash::{BlockHash, Digest, HashParseError};
pub use rng::{DrawRange, DrawResult, SeedEngine, SeedError, MAX_ITERATIONS, MAX_RANGE_SPAN};
