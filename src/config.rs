//! Runtime Configuration
//!
//! Defaults, environment overrides, and the validation errors shared by every
//! layer that accepts user input.

use std::time::Duration;

use thiserror::Error;

use crate::provider::ProviderKind;

/// Longest allowed gap between cancellation checks during backoff.
pub const MAX_CANCEL_CHECK: Duration = Duration::from_secs(1);

/// Invalid user or environment input. Always raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `max < min`.
    #[error("invalid range: max {max} is below min {min}")]
    InvertedRange {
        /// Lower bound given.
        min: i64,
        /// Upper bound given.
        max: i64,
    },
    /// `max - min` exceeds the span cap.
    #[error("range too large: [{min}, {max}] spans more than 1e12")]
    RangeTooLarge {
        /// Lower bound given.
        min: i64,
        /// Upper bound given.
        max: i64,
    },
    /// Draw count outside `1..=10`.
    #[error("draw count {0} outside 1..=10")]
    DrawCount(u8),
    /// Block count outside `1..=5`.
    #[error("block count {0} outside 1..=5")]
    BlockCount(u8),
    /// Unrecognised provider code or name.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    /// Environment variable could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
    /// Cancellation sub-interval too coarse or zero.
    #[error("cancel check interval must be between 1ms and 1s, got {0:?}")]
    CancelCheck(Duration),
}

/// Application configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Preferred block explorer backend.
    pub provider: ProviderKind,
    /// Base URL of the mempool.space-compatible API.
    pub mempool_url: String,
    /// Base URL of the blockstream.info-compatible API.
    pub blockstream_url: String,
    /// Wrap the preferred backend in the fail-over policy.
    pub failover: bool,
    /// Backoff between polls while waiting for a block.
    pub poll_interval: Duration,
    /// Cancellation check granularity during backoff.
    pub cancel_check: Duration,
    /// Background tip-metadata refresh period.
    pub meta_refresh: Duration,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mempool,
            mempool_url: ProviderKind::Mempool.default_base_url().to_string(),
            blockstream_url: ProviderKind::Blockstream.default_base_url().to_string(),
            failover: true,
            poll_interval: Duration::from_secs(10),
            cancel_check: Duration::from_millis(250),
            meta_refresh: Duration::from_secs(60),
            http_timeout: Duration::from_secs(15),
        }
    }
}

impl Config {
    /// Defaults overridden by `BBRNG_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(code) = lookup("BBRNG_PROVIDER") {
            config.provider = code.parse()?;
        }
        if let Some(url) = lookup("BBRNG_MEMPOOL_URL") {
            config.mempool_url = url;
        }
        if let Some(url) = lookup("BBRNG_BLOCKSTREAM_URL") {
            config.blockstream_url = url;
        }
        if let Some(raw) = lookup("BBRNG_FAILOVER") {
            config.failover = match raw.trim() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(ConfigError::InvalidEnv { var: "BBRNG_FAILOVER", value: raw }),
            };
        }
        if let Some(secs) = parse_env(&lookup, "BBRNG_POLL_INTERVAL_SECS")? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_env(&lookup, "BBRNG_CANCEL_CHECK_MS")? {
            config.cancel_check = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_env(&lookup, "BBRNG_META_REFRESH_SECS")? {
            config.meta_refresh = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env(&lookup, "BBRNG_HTTP_TIMEOUT_SECS")? {
            config.http_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that span fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cancel_check.is_zero() || self.cancel_check > MAX_CANCEL_CHECK {
            return Err(ConfigError::CancelCheck(self.cancel_check));
        }
        Ok(())
    }

    /// Base URL configured for a backend.
    pub fn base_url(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::Mempool => &self.mempool_url,
            ProviderKind::Blockstream => &self.blockstream_url,
        }
    }
}

fn parse_env<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value: raw }),
    }
}
