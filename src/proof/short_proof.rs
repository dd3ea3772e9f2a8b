//! Short Proof
//!
//! Single-line, self-certifying summary of a session:
//!
//! ```text
//! BBRNG v1|p=<code>|t=<tip>|s=<start>|k=<K>|r=<min>-<max>|n=<count>|x=[<results>]|crc=<XXXX>
//! ```
//!
//! The checksum covers the commitment's canonical fields plus the results, so
//! the line verifies on its own without the original commitment text.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::commitment::{Commitment, DrawParams};
use super::fields::{extract_tagged_line, join_list, parse_list, parse_range, Fields, ProofParseError};
use crate::core::checksum::{checksum, checksum_matches};
use crate::core::rng::DrawResult;
use crate::provider::ProviderKind;

/// Tag opening every short proof (and the first line of a long proof).
pub const PROOF_TAG: &str = "BBRNG v1";

/// Parsed or freshly rendered short proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortProof {
    commitment: Commitment,
    results: Vec<i64>,
    checksum: String,
}

impl ShortProof {
    /// Proof for `draws` made under `commitment`.
    pub fn new(commitment: &Commitment, draws: &[DrawResult]) -> Self {
        let results: Vec<i64> = draws.iter().map(|d| d.mapped_result).collect();
        Self::from_results(commitment.clone(), results)
    }

    fn from_results(commitment: Commitment, results: Vec<i64>) -> Self {
        let checksum = checksum(&proof_canonical(&commitment, &results));
        Self {
            commitment,
            results,
            checksum,
        }
    }

    /// Commitment the proof restates.
    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }

    /// Mapped results, in draw order.
    pub fn results(&self) -> &[i64] {
        &self.results
    }

    /// Four-digit checksum.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Canonical string covered by the checksum.
    pub fn canonical(&self) -> String {
        proof_canonical(&self.commitment, &self.results)
    }

    /// The single proof line.
    pub fn to_text(&self) -> String {
        let c = &self.commitment;
        format!(
            "{}|p={}|t={}|s={}|k={}|r={}-{}|n={}|x=[{}]|crc={}",
            PROOF_TAG,
            c.provider().code(),
            c.tip_at_commit(),
            c.start_height(),
            c.block_count(),
            c.range().min(),
            c.range().max(),
            c.draw_count(),
            join_list(&self.results),
            self.checksum,
        )
    }

    /// Proof line with a trailing reference (URL or note); empty refs are dropped.
    pub fn to_text_with_ref(&self, reference: &str) -> String {
        let reference = reference.trim();
        if reference.is_empty() {
            self.to_text()
        } else {
            format!("{}|ref={}", self.to_text(), reference)
        }
    }

    /// Parse and check a short proof, possibly embedded in a pasted blob.
    pub fn parse(text: &str) -> Result<Self, ProofParseError> {
        // The long proof opens with a bare tag line; skip it.
        let marker = format!("{PROOF_TAG}|");
        let line = extract_tagged_line(text, &marker).ok_or(ProofParseError::MissingTag(PROOF_TAG))?;
        let fields = Fields::parse(line);

        let code = fields.raw("p")?;
        let provider = ProviderKind::from_code(code).ok_or_else(|| ProofParseError::InvalidField {
            field: "p",
            value: code.to_string(),
        })?;
        let tip: u64 = fields.get("t")?;
        let start: u64 = fields.get("s")?;
        let block_count: u8 = fields.get("k")?;
        let raw_range = fields.raw("r")?;
        let (min, max) = parse_range(raw_range).ok_or_else(|| ProofParseError::InvalidField {
            field: "r",
            value: raw_range.to_string(),
        })?;
        let draw_count: u8 = fields.get("n")?;
        let raw_results = fields.raw("x")?;
        let results = parse_list(raw_results).ok_or_else(|| ProofParseError::InvalidField {
            field: "x",
            value: raw_results.to_string(),
        })?;
        let embedded = fields.raw("crc")?;

        let params = DrawParams::new(min, max, draw_count, block_count)
            .map_err(|e| ProofParseError::Inconsistent(e.to_string()))?;
        if tip.checked_add(1) != Some(start) {
            return Err(ProofParseError::Inconsistent(format!(
                "start {start} is not tip {tip} + 1"
            )));
        }
        if results.len() != draw_count as usize {
            return Err(ProofParseError::Inconsistent(format!(
                "{} results for n={}",
                results.len(),
                draw_count
            )));
        }
        if let Some(outside) = results.iter().find(|v| !params.range.contains(**v)) {
            return Err(ProofParseError::Inconsistent(format!(
                "result {outside} outside [{min}, {max}]"
            )));
        }

        let proof = Self::from_results(Commitment::new(provider, tip, params), results);
        if !checksum_matches(&proof.canonical(), embedded) {
            return Err(ProofParseError::ChecksumMismatch {
                embedded: embedded.to_string(),
                computed: proof.checksum.clone(),
            });
        }
        Ok(proof)
    }
}

/// Commitment canonical string followed by `|x=<results>`.
pub fn proof_canonical(commitment: &Commitment, results: &[i64]) -> String {
    format!("{}|x={}", commitment.canonical(), join_list(results))
}

/// True when `text` contains a well-formed short proof whose checksum matches.
///
/// Checks integrity only; it does not recompute draws from block hashes.
pub fn verify_short_proof(text: &str) -> bool {
    match ShortProof::parse(text) {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, "short proof rejected");
            false
        }
    }
}
