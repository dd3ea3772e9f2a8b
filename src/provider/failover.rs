//! Fail-over Policy
//!
//! Try the preferred backend; on any error retry once against the fallback;
//! if that fails too, the fallback's error is returned.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{BlockMeta, HashSource, ProviderError, ProviderKind};
use crate::core::hash::BlockHash;

/// Preferred backend with a single retry on a second one.
///
/// Reports the preferred backend's identity, so commitments record the
/// provider the operator chose even when an individual call failed over.
#[derive(Clone, Debug)]
pub struct FailoverProvider<P, F> {
    preferred: P,
    fallback: F,
}

impl<P: HashSource, F: HashSource> FailoverProvider<P, F> {
    /// Wrap `preferred` with `fallback`.
    pub fn new(preferred: P, fallback: F) -> Self {
        Self {
            preferred,
            fallback,
        }
    }

    /// The preferred backend.
    pub fn preferred(&self) -> &P {
        &self.preferred
    }

    /// The fallback backend.
    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    fn log_failover(&self, op: &'static str, err: &ProviderError) {
        let from = self.preferred.kind().code();
        let to = self.fallback.kind().code();
        // Unmined heights are routine while waiting.
        if matches!(err, ProviderError::NotFound(_)) {
            debug!(op, from, to, error = %err, "not found, asking fallback");
        } else {
            warn!(op, from, to, error = %err, "provider call failed, retrying on fallback");
        }
    }
}

#[async_trait]
impl<P: HashSource, F: HashSource> HashSource for FailoverProvider<P, F> {
    fn kind(&self) -> ProviderKind {
        self.preferred.kind()
    }

    async fn tip_height(&self) -> Result<u64, ProviderError> {
        match self.preferred.tip_height().await {
            Ok(height) => Ok(height),
            Err(err) => {
                self.log_failover("tip_height", &err);
                self.fallback.tip_height().await
            }
        }
    }

    async fn hash_by_height(&self, height: u64) -> Result<BlockHash, ProviderError> {
        match self.preferred.hash_by_height(height).await {
            Ok(hash) => Ok(hash),
            Err(err) => {
                self.log_failover("hash_by_height", &err);
                self.fallback.hash_by_height(height).await
            }
        }
    }

    async fn block_meta(&self, hash: &BlockHash) -> Result<BlockMeta, ProviderError> {
        match self.preferred.block_meta(hash).await {
            Ok(meta) => Ok(meta),
            Err(err) => {
                self.log_failover("block_meta", &err);
                self.fallback.block_meta(hash).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;

    fn hash(byte: u8) -> BlockHash {
        BlockHash::from_bytes([byte; 32])
    }

    #[tokio::test]
    async fn test_preferred_used_when_healthy() {
        let preferred = MemoryProvider::new(ProviderKind::Mempool);
        preferred.mine(hash(1), 1_700_000_000).await;
        let fallback = MemoryProvider::new(ProviderKind::Blockstream);

        let provider = FailoverProvider::new(preferred, fallback);
        assert_eq!(provider.tip_height().await.unwrap(), 0);
        assert_eq!(provider.fallback().calls(), 0);
        assert_eq!(provider.kind(), ProviderKind::Mempool);
    }

    #[tokio::test]
    async fn test_retries_once_on_fallback() {
        let preferred = MemoryProvider::new(ProviderKind::Mempool);
        preferred.set_offline(true);
        let fallback = MemoryProvider::new(ProviderKind::Blockstream);
        fallback.mine(hash(7), 1_700_000_000).await;

        let provider = FailoverProvider::new(preferred, fallback);
        assert_eq!(provider.hash_by_height(0).await.unwrap(), hash(7));
        assert_eq!(provider.preferred().calls(), 1);
        assert_eq!(provider.fallback().calls(), 1);
        // Identity stays with the operator's choice.
        assert_eq!(provider.kind(), ProviderKind::Mempool);
    }

    #[tokio::test]
    async fn test_both_failing_propagates_error() {
        let preferred = MemoryProvider::new(ProviderKind::Mempool);
        preferred.set_offline(true);
        let fallback = MemoryProvider::new(ProviderKind::Blockstream);
        fallback.set_offline(true);

        let provider = FailoverProvider::new(preferred, fallback);
        assert!(matches!(provider.tip_height().await, Err(ProviderError::Http { .. })));
        assert_eq!(provider.preferred().calls(), 1);
        assert_eq!(provider.fallback().calls(), 1);
    }

    #[tokio::test]
    async fn test_not_found_also_fails_over() {
        let preferred = MemoryProvider::new(ProviderKind::Mempool);
        let fallback = MemoryProvider::new(ProviderKind::Blockstream);
        fallback.mine(hash(3), 1_700_000_000).await;

        let provider = FailoverProvider::new(preferred, fallback);
        let meta = provider.block_meta(&hash(3)).await.unwrap();
        assert_eq!(meta.timestamp, 1_700_000_000);
    }
}
