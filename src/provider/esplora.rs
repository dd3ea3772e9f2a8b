//! Esplora HTTP Backend
//!
//! mempool.space and blockstream.info expose the same Esplora REST API:
//!
//! - `GET /blocks/tip/height` → decimal height as text
//! - `GET /block-height/<h>` → 64-char hex hash as text (404 until mined)
//! - `GET /block/<hash>` → JSON object with a `timestamp` field

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{BlockMeta, HashSource, ProviderError, ProviderKind};
use crate::config::Config;
use crate::core::hash::BlockHash;

/// Esplora-compatible block explorer client.
#[derive(Clone, Debug)]
pub struct EsploraProvider {
    kind: ProviderKind,
    base_url: String,
    client: Client,
}

impl EsploraProvider {
    /// Client for `kind` rooted at `base_url`.
    pub fn new(kind: ProviderKind, base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bbrng/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Http {
                url: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            kind,
            base_url,
            client,
        })
    }

    /// Client for `kind` using the URL and timeout from `config`.
    pub fn from_config(config: &Config, kind: ProviderKind) -> Result<Self, ProviderError> {
        Self::new(kind, config.base_url(kind), config.http_timeout)
    }

    /// API root this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str) -> Result<(String, reqwest::Response), ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(provider = self.kind.code(), %url, "GET");
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                url: url.clone(),
                message: e.to_string(),
            })?;
        Ok((url, response))
    }

    async fn get_text(&self, path: &str) -> Result<(String, String), ProviderError> {
        let (url, response) = self.get(path).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(|e| ProviderError::Http {
            url: url.clone(),
            message: e.to_string(),
        })?;
        Ok((url, body))
    }
}

#[async_trait]
impl HashSource for EsploraProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn tip_height(&self) -> Result<u64, ProviderError> {
        let (url, body) = self.get_text("/blocks/tip/height").await?;
        parse_height(&body).ok_or(ProviderError::InvalidResponse {
            url,
            message: format!("expected block height, got {:?}", body.trim()),
        })
    }

    async fn hash_by_height(&self, height: u64) -> Result<BlockHash, ProviderError> {
        let (url, body) = match self.get_text(&format!("/block-height/{height}")).await {
            Err(ProviderError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Err(ProviderError::NotFound(height));
            }
            other => other?,
        };
        if body.trim().is_empty() {
            return Err(ProviderError::NotFound(height));
        }
        body.parse().map_err(|e| ProviderError::InvalidResponse {
            url,
            message: format!("{e}"),
        })
    }

    async fn block_meta(&self, hash: &BlockHash) -> Result<BlockMeta, ProviderError> {
        let (url, response) = self.get(&format!("/block/{hash}")).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                url,
                status: status.as_u16(),
            });
        }
        response
            .json::<BlockMeta>()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                url,
                message: e.to_string(),
            })
    }
}

fn parse_height(body: &str) -> Option<u64> {
    body.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let provider =
            EsploraProvider::new(ProviderKind::Mempool, "https://mempool.space/api/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.base_url(), "https://mempool.space/api");
        assert_eq!(provider.kind(), ProviderKind::Mempool);
    }

    #[test]
    fn test_from_config_uses_backend_url() {
        let config = Config {
            blockstream_url: "http://127.0.0.1:3002/api".to_string(),
            ..Default::default()
        };
        let provider = EsploraProvider::from_config(&config, ProviderKind::Blockstream).unwrap();
        assert_eq!(provider.base_url(), "http://127.0.0.1:3002/api");
    }

    #[test]
    fn test_parse_height() {
        assert_eq!(parse_height("800000"), Some(800_000));
        assert_eq!(parse_height(" 812345\n"), Some(812_345));
        assert_eq!(parse_height("<html>"), None);
        assert_eq!(parse_height("-1"), None);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let provider =
            EsploraProvider::new(ProviderKind::Mempool, "http://127.0.0.1:9/api", Duration::from_secs(2))
                .unwrap();
        assert!(matches!(provider.tip_height().await, Err(ProviderError::Http { .. })));
    }
}
