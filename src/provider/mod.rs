//! Block Hash Sources
//!
//! Abstraction over block explorer backends. Every backend exposes the same
//! three capabilities: current tip height, hash at a height, and block
//! metadata. Callers may wrap a preferred backend in [`FailoverProvider`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      HASH SOURCES                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  esplora.rs   - HTTP backends (mempool.space, blockstream)   │
//! │  failover.rs  - preferred backend, one retry on the other    │
//! │  memory.rs    - scripted in-memory chain                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::core::hash::BlockHash;

pub mod esplora;
pub mod failover;
pub mod memory;

pub use esplora::EsploraProvider;
pub use failover::FailoverProvider;
pub use memory::MemoryProvider;

/// Known block explorer backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// mempool.space (`mp`).
    Mempool,
    /// blockstream.info (`bs`).
    Blockstream,
}

impl ProviderKind {
    /// Short code used in commitments and proofs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Mempool => "mp",
            Self::Blockstream => "bs",
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mempool => "mempool",
            Self::Blockstream => "blockstream",
        }
    }

    /// Public API root for this backend.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Mempool => "https://mempool.space/api",
            Self::Blockstream => "https://blockstream.info/api",
        }
    }

    /// The other backend, used as fail-over target.
    pub fn other(&self) -> Self {
        match self {
            Self::Mempool => Self::Blockstream,
            Self::Blockstream => Self::Mempool,
        }
    }

    /// Look up a backend by its short code only.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "mp" => Some(Self::Mempool),
            "bs" => Some(Self::Blockstream),
            _ => None,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp" | "mempool" => Ok(Self::Mempool),
            "bs" | "blockstream" => Ok(Self::Blockstream),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Block metadata we care about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    /// Block timestamp (Unix seconds).
    pub timestamp: u64,
}

/// Backend failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("request to {url} failed: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// Underlying error text.
        message: String,
    },
    /// Non-success HTTP status.
    #[error("{url}: HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status code.
        status: u16,
    },
    /// Body could not be interpreted.
    #[error("invalid response from {url}: {message}")]
    InvalidResponse {
        /// Requested URL.
        url: String,
        /// What was wrong.
        message: String,
    },
    /// No block at this height yet.
    #[error("no block at height {0}")]
    NotFound(u64),
}

/// Capability set of a block explorer backend.
#[async_trait]
pub trait HashSource: Send + Sync {
    /// Backend identity recorded in commitments.
    fn kind(&self) -> ProviderKind;

    /// Height of the most recent block the backend knows about.
    async fn tip_height(&self) -> Result<u64, ProviderError>;

    /// Hash of the block at `height`.
    async fn hash_by_height(&self, height: u64) -> Result<BlockHash, ProviderError>;

    /// Metadata for the block with `hash`.
    async fn block_meta(&self, hash: &BlockHash) -> Result<BlockMeta, ProviderError>;
}

#[async_trait]
impl<T: HashSource + ?Sized> HashSource for Arc<T> {
    fn kind(&self) -> ProviderKind {
        (**self).kind()
    }

    async fn tip_height(&self) -> Result<u64, ProviderError> {
        (**self).tip_height().await
    }

    async fn hash_by_height(&self, height: u64) -> Result<BlockHash, ProviderError> {
        (**self).hash_by_height(height).await
    }

    async fn block_meta(&self, hash: &BlockHash) -> Result<BlockMeta, ProviderError> {
        (**self).block_meta(hash).await
    }
}

/// Build the configured backend, wrapped in fail-over when enabled.
pub fn from_config(config: &Config) -> Result<Arc<dyn HashSource>, ProviderError> {
    let preferred = EsploraProvider::from_config(config, config.provider)?;
    if !config.failover {
        return Ok(Arc::new(preferred));
    }
    let fallback = EsploraProvider::from_config(config, config.provider.other())?;
    Ok(Arc::new(FailoverProvider::new(preferred, fallback)))
}
