//! Verification API
//!
//! Two levels of checking:
//! - [`verify_short_proof`](super::verify_short_proof) and
//!   [`verify_commitment`](super::verify_commitment) check text integrity only.
//! - [`verify_transcript`] re-runs the draw engine over the recorded block
//!   hashes and compares every draw, the way an auditor would by hand.

use thiserror::Error;
use tracing::{debug, info};

use super::commitment::Commitment;
use super::transcript::{Transcript, TRANSCRIPT_VERSION};
use crate::core::rng::{DrawResult, SeedEngine, SeedError};

/// Outcome of replaying a transcript.
#[derive(Debug)]
pub struct VerificationResult {
    /// Did verification pass?
    pub valid: bool,

    /// Draws recomputed from the recorded hashes.
    pub recomputed: Vec<DrawResult>,

    /// Indices whose recorded draw differs from the recomputed one.
    pub mismatched: Vec<u32>,

    /// Detailed error if verification failed.
    pub error: Option<VerificationError>,
}

impl VerificationResult {
    fn failed(error: VerificationError) -> Self {
        Self {
            valid: false,
            recomputed: Vec::new(),
            mismatched: Vec::new(),
            error: Some(error),
        }
    }
}

/// Reasons a transcript fails replay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Transcript version mismatch.
    #[error("version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// Supported version.
        expected: u8,
        /// Version found.
        got: u8,
    },
    /// Embedded commitment does not check out against its own checksum.
    #[error("commitment invalid: {0}")]
    InvalidCommitment(String),
    /// Number of hashes differs from the committed K.
    #[error("expected {expected} block hashes, got {got}")]
    BlockCount {
        /// Committed K.
        expected: usize,
        /// Hashes present.
        got: usize,
    },
    /// Number of draws differs from the committed n.
    #[error("expected {expected} draws, got {got}")]
    DrawCount {
        /// Committed n.
        expected: usize,
        /// Draws present.
        got: usize,
    },
    /// The engine failed while replaying.
    #[error(transparent)]
    Seed(#[from] SeedError),
    /// At least one recorded draw differs from the replay.
    #[error("draw {0} does not match replay")]
    DrawMismatch(u32),
}

/// Verify a transcript by replaying every draw.
///
/// This is the authoritative check of a session's outcome.
pub fn verify_transcript(transcript: &Transcript) -> VerificationResult {
    if transcript.version != TRANSCRIPT_VERSION {
        return VerificationResult::failed(VerificationError::VersionMismatch {
            expected: TRANSCRIPT_VERSION,
            got: transcript.version,
        });
    }

    // Round-trip through text so a hand-edited transcript cannot carry
    // parameters that disagree with its checksum.
    let commitment = match Commitment::parse(&transcript.commitment.to_text()) {
        Ok(c) if c == transcript.commitment => c,
        Ok(_) => {
            return VerificationResult::failed(VerificationError::InvalidCommitment(
                "fields changed on re-parse".to_string(),
            ))
        }
        Err(e) => return VerificationResult::failed(VerificationError::InvalidCommitment(e.to_string())),
    };

    let expected_blocks = commitment.block_count() as usize;
    if transcript.hashes.len() != expected_blocks {
        return VerificationResult::failed(VerificationError::BlockCount {
            expected: expected_blocks,
            got: transcript.hashes.len(),
        });
    }
    let expected_draws = commitment.draw_count() as usize;
    if transcript.draws.len() != expected_draws {
        return VerificationResult::failed(VerificationError::DrawCount {
            expected: expected_draws,
            got: transcript.draws.len(),
        });
    }

    let Some(blocks) = transcript.completed_blocks() else {
        return VerificationResult::failed(VerificationError::BlockCount {
            expected: expected_blocks,
            got: transcript.hashes.len(),
        });
    };

    let engine = SeedEngine::new(&blocks, commitment.range());
    let recomputed = match engine.draw_many(commitment.draw_count()) {
        Ok(draws) => draws,
        Err(e) => return VerificationResult::failed(e.into()),
    };

    let mismatched: Vec<u32> = recomputed
        .iter()
        .zip(&transcript.draws)
        .filter(|(replayed, recorded)| replayed != recorded)
        .map(|(replayed, _)| replayed.index)
        .collect();

    for index in &mismatched {
        debug!(index, "recorded draw differs from replay");
    }

    let valid = mismatched.is_empty();
    let error = mismatched.first().map(|&i| VerificationError::DrawMismatch(i));
    info!(
        start = commitment.start_height(),
        draws = recomputed.len(),
        valid,
        "transcript replayed"
    );

    VerificationResult {
        valid,
        recomputed,
        mismatched,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::blocks::CompletedBlocks;
    use crate::core::hash::BlockHash;
    use crate::proof::commitment::CommitmentBuilder;
    use crate::provider::ProviderKind;

    const H1: &str = "00000000000000000002a7c4c1e48d76c5a37902165a270156b7a8d72728a054";
    const H2: &str = "0000000000000000000320283a032748cef8227873ff4872689bf23f1cda83a5";

    fn transcript() -> Transcript {
        let commitment = CommitmentBuilder::new()
            .range(1, 100)
            .draws(3)
            .blocks(2)
            .at_tip(ProviderKind::Blockstream, 850_000)
            .unwrap();
        let hashes: Vec<BlockHash> = [H1, H2].iter().map(|h| h.parse().unwrap()).collect();
        let blocks = CompletedBlocks::from_hashes(850_001, hashes).unwrap();
        let draws = SeedEngine::new(&blocks, commitment.range()).draw_many(3).unwrap();
        Transcript::new(commitment, &blocks, draws)
    }

    #[test]
    fn test_valid_transcript_verifies() {
        let result = verify_transcript(&transcript());
        assert!(result.valid);
        assert!(result.error.is_none());
        assert_eq!(
            result.recomputed.iter().map(|d| d.mapped_result).collect::<Vec<_>>(),
            vec![7, 87, 22]
        );
    }

    #[test]
    fn test_altered_result_detected() {
        let mut t = transcript();
        t.draws[1].mapped_result = 88;
        let result = verify_transcript(&t);
        assert!(!result.valid);
        assert_eq!(result.mismatched, vec![1]);
        assert_eq!(result.error, Some(VerificationError::DrawMismatch(1)));
    }

    #[test]
    fn test_swapped_hashes_detected() {
        let mut t = transcript();
        t.hashes.swap(0, 1);
        let result = verify_transcript(&t);
        assert!(!result.valid);
        assert!(!result.mismatched.is_empty());
    }

    #[test]
    fn test_missing_hash_rejected() {
        let mut t = transcript();
        t.hashes.pop();
        assert_eq!(
            verify_transcript(&t).error,
            Some(VerificationError::BlockCount { expected: 2, got: 1 })
        );
    }

    #[test]
    fn test_missing_draw_rejected() {
        let mut t = transcript();
        t.draws.pop();
        assert_eq!(
            verify_transcript(&t).error,
            Some(VerificationError::DrawCount { expected: 3, got: 2 })
        );
    }

    #[test]
    fn test_version_mismatch() {
        let mut t = transcript();
        t.version = 9;
        assert!(matches!(
            verify_transcript(&t).error,
            Some(VerificationError::VersionMismatch { expected: 1, got: 9 })
        ));
    }

    #[test]
    fn test_edited_commitment_json_rejected() {
        let json = transcript().to_json().unwrap().replace("\"max\": 100", "\"max\": 99");
        let edited = Transcript::from_json(&json).unwrap();
        assert!(matches!(
            verify_transcript(&edited).error,
            Some(VerificationError::InvalidCommitment(_))
        ));
    }
}
