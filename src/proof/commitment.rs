//! Draw Commitment Protocol
//!
//! Publish the draw parameters and the first future block height before that
//! block exists. Once the blocks are mined, the outcome is fixed by their
//! hashes, so the operator cannot pick a favourable result after the fact.
//!
//! Wire format:
//!
//! ```text
//! BBRNG-commit prov=<code>|tip=<t>|start=<t+1>|k=<K>|min=<min>|max=<max>|n=<n>|crc=<XXXX>
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::fields::{extract_tagged_line, Fields, ProofParseError};
use crate::config::ConfigError;
use crate::core::blocks::MAX_BLOCKS;
use crate::core::checksum::{checksum, checksum_matches};
use crate::core::rng::DrawRange;
use crate::provider::{HashSource, ProviderError, ProviderKind};

/// Tag prefixing published commitment text.
pub const COMMITMENT_TAG: &str = "BBRNG-commit";

/// Maximum draws per session.
pub const MAX_DRAWS: u8 = 10;

/// Validated draw parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawParams {
    /// Target range.
    pub range: DrawRange,
    /// Number of draws (1..=10).
    pub draw_count: u8,
    /// Number of committed blocks K (1..=5).
    pub block_count: u8,
}

impl DrawParams {
    /// Validate all parameters.
    pub fn new(min: i64, max: i64, draw_count: u8, block_count: u8) -> Result<Self, ConfigError> {
        let range = DrawRange::new(min, max)?;
        if !(1..=MAX_DRAWS).contains(&draw_count) {
            return Err(ConfigError::DrawCount(draw_count));
        }
        if !(1..=MAX_BLOCKS).contains(&block_count) {
            return Err(ConfigError::BlockCount(block_count));
        }
        Ok(Self {
            range,
            draw_count,
            block_count,
        })
    }
}

/// Published commitment. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    provider: ProviderKind,
    tip_at_commit: u64,
    start_height: u64,
    params: DrawParams,
    checksum: String,
}

impl Commitment {
    /// Commit to `params` against the tip height observed on `provider`.
    pub fn new(provider: ProviderKind, tip_at_commit: u64, params: DrawParams) -> Self {
        let start_height = tip_at_commit + 1;
        let canonical = canonical_string(provider.code(), tip_at_commit, start_height, &params);
        Self {
            provider,
            tip_at_commit,
            start_height,
            params,
            checksum: checksum(&canonical),
        }
    }

    /// Backend the tip height was read from.
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Tip height when the commitment was made.
    pub fn tip_at_commit(&self) -> u64 {
        self.tip_at_commit
    }

    /// First committed height (`tip_at_commit + 1`).
    pub fn start_height(&self) -> u64 {
        self.start_height
    }

    /// Last committed height.
    pub fn end_height(&self) -> u64 {
        self.start_height + self.params.block_count as u64 - 1
    }

    /// Committed draw parameters.
    pub fn params(&self) -> &DrawParams {
        &self.params
    }

    /// Number of committed blocks K.
    pub fn block_count(&self) -> u8 {
        self.params.block_count
    }

    /// Number of draws.
    pub fn draw_count(&self) -> u8 {
        self.params.draw_count
    }

    /// Draw range.
    pub fn range(&self) -> DrawRange {
        self.params.range
    }

    /// Four-digit checksum.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Canonical field string covered by the checksum.
    pub fn canonical(&self) -> String {
        canonical_string(
            self.provider.code(),
            self.tip_at_commit,
            self.start_height,
            &self.params,
        )
    }

    /// Full commitment text for publishing.
    pub fn to_text(&self) -> String {
        format!("{} {}|crc={}", COMMITMENT_TAG, self.canonical(), self.checksum)
    }

    /// Parse and check commitment text, possibly embedded in a larger blob.
    pub fn parse(text: &str) -> Result<Self, ProofParseError> {
        let line = extract_tagged_line(text, COMMITMENT_TAG)
            .ok_or(ProofParseError::MissingTag(COMMITMENT_TAG))?;
        let body = &line[COMMITMENT_TAG.len()..];
        let fields = Fields::parse(body);

        let code = fields.raw("prov")?;
        let provider = ProviderKind::from_code(code).ok_or_else(|| ProofParseError::InvalidField {
            field: "prov",
            value: code.to_string(),
        })?;
        let tip_at_commit: u64 = fields.get("tip")?;
        let start_height: u64 = fields.get("start")?;
        let params = DrawParams::new(
            fields.get("min")?,
            fields.get("max")?,
            fields.get("n")?,
            fields.get("k")?,
        )
        .map_err(|e| ProofParseError::Inconsistent(e.to_string()))?;
        let embedded = fields.raw("crc")?;

        if tip_at_commit.checked_add(1) != Some(start_height) {
            return Err(ProofParseError::Inconsistent(format!(
                "start {start_height} is not tip {tip_at_commit} + 1"
            )));
        }

        let commitment = Self::new(provider, tip_at_commit, params);
        if !checksum_matches(&commitment.canonical(), embedded) {
            return Err(ProofParseError::ChecksumMismatch {
                embedded: embedded.to_string(),
                computed: commitment.checksum.clone(),
            });
        }
        Ok(commitment)
    }
}

/// Canonical commitment string with fixed field order.
pub fn canonical_string(provider_code: &str, tip: u64, start: u64, params: &DrawParams) -> String {
    format!(
        "prov={}|tip={}|start={}|k={}|min={}|max={}|n={}",
        provider_code,
        tip,
        start,
        params.block_count,
        params.range.min(),
        params.range.max(),
        params.draw_count,
    )
}

/// True when `text` contains a well-formed commitment with a matching checksum.
pub fn verify_commitment(text: &str) -> bool {
    match Commitment::parse(text) {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, "commitment rejected");
            false
        }
    }
}

/// Errors while creating a commitment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    /// Parameters rejected before any network call.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Tip height could not be read. Retry by building again.
    #[error("commit failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Builder for creating commitments.
#[derive(Clone, Debug)]
pub struct CommitmentBuilder {
    min: i64,
    max: i64,
    draw_count: u8,
    block_count: u8,
}

impl Default for CommitmentBuilder {
    fn default() -> Self {
        Self {
            min: 1,
            max: 100,
            draw_count: 1,
            block_count: 1,
        }
    }
}

impl CommitmentBuilder {
    /// Builder with defaults: range `[1, 100]`, one draw, one block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inclusive range.
    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the number of draws.
    pub fn draws(mut self, draw_count: u8) -> Self {
        self.draw_count = draw_count;
        self
    }

    /// Set the number of committed blocks K.
    pub fn blocks(mut self, block_count: u8) -> Self {
        self.block_count = block_count;
        self
    }

    /// Validate the configured parameters.
    pub fn params(&self) -> Result<DrawParams, ConfigError> {
        DrawParams::new(self.min, self.max, self.draw_count, self.block_count)
    }

    /// Commit against a known tip height, without network access.
    pub fn at_tip(&self, provider: ProviderKind, tip_at_commit: u64) -> Result<Commitment, ConfigError> {
        Ok(Commitment::new(provider, tip_at_commit, self.params()?))
    }

    /// Validate, read the current tip from `source`, and commit to the next height.
    ///
    /// Holds no state between attempts; on a provider failure call again.
    pub async fn build<S: HashSource + ?Sized>(&self, source: &S) -> Result<Commitment, CommitError> {
        let params = self.params()?;
        let tip = source.tip_height().await?;
        if tip.checked_add(1).is_none() {
            return Err(ProviderError::InvalidResponse {
                url: format!("{}:tip", source.kind().code()),
                message: format!("tip height {tip} leaves no next block"),
            }
            .into());
        }
        let commitment = Commitment::new(source.kind(), tip, params);
        info!(
            provider = commitment.provider().code(),
            tip,
            start = commitment.start_height(),
            k = params.block_count,
            crc = commitment.checksum(),
            "commitment created"
        );
        Ok(commitment)
    }
}
