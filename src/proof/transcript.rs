//! Draw Transcript and Long Proof
//!
//! Records everything needed to recompute a session's draws: the commitment,
//! the committed block hashes in height order, and every accepted draw.
//! Renders the human-auditable long proof and serializes compactly with
//! bincode or readably with JSON.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::commitment::Commitment;
use super::fields::join_list;
use super::short_proof::{ShortProof, PROOF_TAG};
use crate::core::blocks::CompletedBlocks;
use crate::core::hash::BlockHash;
use crate::core::rng::DrawResult;

/// Current transcript version.
pub const TRANSCRIPT_VERSION: u8 = 1;

/// Complete record of one drawn session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Version for forward compatibility.
    pub version: u8,

    /// Published commitment.
    pub commitment: Commitment,

    /// Committed block hashes, ascending by height.
    pub hashes: Vec<BlockHash>,

    /// Accepted draws, in index order.
    pub draws: Vec<DrawResult>,
}

/// Options for rendering the long proof.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LongProofOptions {
    /// Add `H_dec=[...]` with each hash as a decimal integer (only when K >= 2).
    pub include_decimal: bool,
    /// Trailing `ref=<reference>` line.
    pub reference: Option<String>,
}

/// Errors that can occur with transcripts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    /// Serialization failed.
    #[error("transcript serialization failed: {0}")]
    SerializationFailed(String),
    /// Deserialization failed.
    #[error("transcript deserialization failed: {0}")]
    DeserializationFailed(String),
}

impl Transcript {
    /// Record a drawn session.
    pub fn new(commitment: Commitment, blocks: &CompletedBlocks, draws: Vec<DrawResult>) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            commitment,
            hashes: blocks.hashes().to_vec(),
            draws,
        }
    }

    /// Mapped results in draw order.
    pub fn results(&self) -> Vec<i64> {
        self.draws.iter().map(|d| d.mapped_result).collect()
    }

    /// Committed window, or `None` when the hash list is empty or too long.
    pub fn completed_blocks(&self) -> Option<CompletedBlocks> {
        CompletedBlocks::from_hashes(self.commitment.start_height(), self.hashes.clone())
    }

    /// Short proof for this transcript.
    pub fn short_proof(&self) -> ShortProof {
        ShortProof::new(&self.commitment, &self.draws)
    }

    /// Multi-line human-readable proof.
    ///
    /// Line order is fixed; whitespace carries no meaning.
    pub fn long_proof(&self, options: &LongProofOptions) -> String {
        let c = &self.commitment;
        let range = c.range();
        let short = self.short_proof();
        let mut out = String::new();

        // Writing into a String never fails.
        let _ = writeln!(out, "{PROOF_TAG}");
        let _ = writeln!(
            out,
            "prov={} t={} start={} k={} range=[{},{}] n={}",
            c.provider().code(),
            c.tip_at_commit(),
            c.start_height(),
            c.block_count(),
            range.min(),
            range.max(),
            c.draw_count(),
        );
        let _ = writeln!(out, "H@{}..{}=", c.start_height(), c.end_height());
        for hash in &self.hashes {
            let _ = writeln!(out, "  {hash}");
        }
        if options.include_decimal && self.hashes.len() >= 2 {
            let decimals: Vec<String> = self.hashes.iter().map(BlockHash::to_decimal).collect();
            let _ = writeln!(out, "H_dec=[{}]", decimals.join(","));
        }
        let _ = writeln!(out, "N={}", range.size());
        for draw in &self.draws {
            let _ = writeln!(
                out,
                "draw {}: X={} iterations={} result = min + (X mod N) = {} + ({} mod {}) = {}",
                draw.index,
                draw.accepted_value,
                draw.iteration_count,
                range.min(),
                draw.accepted_value,
                range.size(),
                draw.mapped_result,
            );
        }
        let _ = writeln!(out, "nums=[{}]", join_list(short.results()));
        let _ = writeln!(
            out,
            "formula: N = max-min+1; X_i = SHA-256(H || \"draw:i\") re-hashed while X_i >= 2^256 - (2^256 mod N); result_i = min + (X_i mod N)"
        );
        let _ = write!(out, "crc={}", short.checksum());
        if let Some(reference) = options.reference.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            let _ = write!(out, "\nref={reference}");
        }
        out
    }

    /// Serialize to bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TranscriptError> {
        bincode::serialize(self).map_err(|e| TranscriptError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TranscriptError> {
        bincode::deserialize(data).map_err(|e| TranscriptError::DeserializationFailed(e.to_string()))
    }

    /// Pretty JSON for publishing alongside the proofs.
    pub fn to_json(&self) -> Result<String, TranscriptError> {
        serde_json::to_string_pretty(self).map_err(|e| TranscriptError::SerializationFailed(e.to_string()))
    }

    /// Parse JSON produced by [`Transcript::to_json`].
    pub fn from_json(json: &str) -> Result<Self, TranscriptError> {
        serde_json::from_str(json).map_err(|e| TranscriptError::DeserializationFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::{DrawRange, SeedEngine};
    use crate::proof::commitment::CommitmentBuilder;
    use crate::proof::short_proof::verify_short_proof;
    use crate::provider::ProviderKind;

    const H1: &str = "00000000000000000002a7c4c1e48d76c5a37902165a270156b7a8d72728a054";
    const H2: &str = "0000000000000000000320283a032748cef8227873ff4872689bf23f1cda83a5";

    fn drawn(hexes: &[&str], min: i64, max: i64, n: u8) -> Transcript {
        let commitment = CommitmentBuilder::new()
            .range(min, max)
            .draws(n)
            .blocks(hexes.len() as u8)
            .at_tip(ProviderKind::Mempool, 800_000)
            .unwrap();
        let hashes = hexes.iter().map(|h| h.parse().unwrap()).collect();
        let blocks = CompletedBlocks::from_hashes(commitment.start_height(), hashes).unwrap();
        let draws = SeedEngine::new(&blocks, DrawRange::new(min, max).unwrap())
            .draw_many(n)
            .unwrap();
        Transcript::new(commitment, &blocks, draws)
    }

    #[test]
    fn test_long_proof_layout() {
        let transcript = drawn(&[H1], 1, 6, 3);
        let long = transcript.long_proof(&LongProofOptions::default());
        let lines: Vec<&str> = long.lines().collect();

        assert_eq!(lines[0], "BBRNG v1");
        assert_eq!(lines[1], "prov=mp t=800000 start=800001 k=1 range=[1,6] n=3");
        assert_eq!(lines[2], "H@800001..800001=");
        assert_eq!(lines[3], format!("  {H1}"));
        assert_eq!(lines[4], "N=6");
        assert!(lines[5].starts_with(
            "draw 0: X=100689883646279171554659554316572710937813079226424960654619870320830768476449 iterations=1"
        ));
        assert!(lines[5].ends_with("= 6"));
        assert!(long.contains("nums=[6,4,3]"));
        assert!(long.ends_with("crc=6D54"));
        assert!(!long.contains("H_dec"));
        assert!(!long.contains("ref="));
    }

    #[test]
    fn test_short_proof_from_transcript() {
        let transcript = drawn(&[H1], 1, 6, 3);
        assert_eq!(transcript.results(), vec![6, 4, 3]);
        let short = transcript.short_proof().to_text();
        assert!(verify_short_proof(&short));

        // A pasted long proof followed by the short line still verifies.
        let long = transcript.long_proof(&LongProofOptions::default());
        assert!(!verify_short_proof(&long));
        assert!(verify_short_proof(&format!("{long}\n\n{short}")));
    }

    #[test]
    fn test_decimal_hashes_only_for_multi_block() {
        let options = LongProofOptions {
            include_decimal: true,
            reference: Some("https://example.org/draw".to_string()),
        };

        let single = drawn(&[H1], 1, 6, 1).long_proof(&options);
        assert!(!single.contains("H_dec"));

        let double = drawn(&[H1, H2], 1, 100, 3).long_proof(&options);
        let h1: BlockHash = H1.parse().unwrap();
        let h2: BlockHash = H2.parse().unwrap();
        assert!(double.contains(&format!("H_dec=[{},{}]", h1.to_decimal(), h2.to_decimal())));
        assert!(double.contains("nums=[7,87,22]"));
        assert!(double.ends_with("\nref=https://example.org/draw"));
    }

    #[test]
    fn test_bincode_and_json_roundtrip() {
        let transcript = drawn(&[H1, H2], 1, 100, 3);

        let bytes = transcript.to_bytes().unwrap();
        assert_eq!(Transcript::from_bytes(&bytes).unwrap(), transcript);

        let json = transcript.to_json().unwrap();
        assert_eq!(Transcript::from_json(&json).unwrap(), transcript);

        assert!(matches!(
            Transcript::from_bytes(&[0xFF, 0x01]),
            Err(TranscriptError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_completed_blocks_recovered() {
        let transcript = drawn(&[H1, H2], 1, 100, 1);
        let blocks = transcript.completed_blocks().unwrap();
        assert_eq!(blocks.start_height(), 800_001);
        assert_eq!(blocks.len(), 2);
    }
}
