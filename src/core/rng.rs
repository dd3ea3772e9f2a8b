//! Deterministic Draw Engine
//!
//! Maps a completed set of committed block hashes into integers in
//! `[min, max]` without modulo bias.
//!
//! For draw `i` the engine hashes `base || "draw:<i>"` with SHA-256, reads the
//! digest as a big-endian 256-bit integer `X`, and accepts it when
//! `X < 2^256 - (2^256 mod N)`. A rejected digest is re-hashed as
//! `digest || "draw:<i>"`. The accepted result is `min + (X mod N)`.
//!
//! Given the same block hashes and index, every platform produces the same
//! [`DrawResult`].

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::blocks::CompletedBlocks;
use super::hash::{sha256_parts, Digest};
use crate::config::ConfigError;

/// Maximum span `max - min` accepted for a draw range.
pub const MAX_RANGE_SPAN: i64 = 1_000_000_000_000;

/// Defensive bound on SHA-256 evaluations per draw.
///
/// Rejection probability per iteration is below `N / 2^256`, so this is never
/// reached unless something is badly wrong.
pub const MAX_ITERATIONS: u32 = 1000;

/// Inclusive integer range for draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRange {
    min: i64,
    max: i64,
}

impl DrawRange {
    /// Validate `min <= max` and `max - min <= 1e12`.
    pub fn new(min: i64, max: i64) -> Result<Self, ConfigError> {
        if max < min {
            return Err(ConfigError::InvertedRange { min, max });
        }
        let span = max as i128 - min as i128;
        if span > MAX_RANGE_SPAN as i128 {
            return Err(ConfigError::RangeTooLarge { min, max });
        }
        Ok(Self { min, max })
    }

    /// Lower bound.
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Upper bound.
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Number of possible outcomes, `N = max - min + 1`.
    pub fn size(&self) -> u64 {
        (self.max as i128 - self.min as i128 + 1) as u64
    }

    /// True when `value` lies in the range.
    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// One accepted draw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    /// Draw index (0-based).
    pub index: u32,
    /// Accepted 256-bit integer `X`.
    #[serde(with = "biguint_decimal")]
    pub accepted_value: BigUint,
    /// `min + (X mod N)`.
    pub mapped_result: i64,
    /// SHA-256 evaluations taken (1 = accepted first time).
    pub iteration_count: u32,
}

/// Errors from the draw engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeedError {
    /// Iteration ceiling exceeded. Indicates a defect, never expected in practice.
    #[error("draw {index} exceeded {ceiling} rejection iterations")]
    IterationCeiling {
        /// Draw index.
        index: u32,
        /// Ceiling that was hit.
        ceiling: u32,
    },
}

/// Per-index domain separator, `"draw:<i>"` as UTF-8.
pub fn domain_tag(index: u32) -> Vec<u8> {
    format!("draw:{index}").into_bytes()
}

/// Largest multiple of `n` that fits in `[0, 2^256]`: `2^256 - (2^256 mod n)`.
pub fn acceptance_threshold(n: u64) -> BigUint {
    let modulus = BigUint::one() << 256u32;
    let rem = &modulus % n;
    modulus - rem
}

/// Apply the acceptance rule to one digest.
///
/// Returns `(X, min + (X mod N))` on acceptance, `None` on rejection.
pub fn accept(digest: &Digest, range: &DrawRange, threshold: &BigUint) -> Option<(BigUint, i64)> {
    let x = BigUint::from_bytes_be(digest);
    if &x >= threshold {
        return None;
    }
    let offset = (&x % range.size()).to_u64()?;
    let mapped = (range.min as i128 + offset as i128) as i64;
    Some((x, mapped))
}

/// Deterministic draw engine bound to one completed block window and range.
#[derive(Clone, Debug)]
pub struct SeedEngine {
    base_material: Vec<u8>,
    range: DrawRange,
    threshold: BigUint,
    max_iterations: u32,
}

impl SeedEngine {
    /// Create an engine over a completed block window.
    pub fn new(blocks: &CompletedBlocks, range: DrawRange) -> Self {
        Self {
            base_material: blocks.base_material(),
            range,
            threshold: acceptance_threshold(range.size()),
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Range this engine maps into.
    pub fn range(&self) -> DrawRange {
        self.range
    }

    /// Compute draw `index`.
    pub fn draw(&self, index: u32) -> Result<DrawResult, SeedError> {
        let tag = domain_tag(index);
        let mut digest = sha256_parts(&[&self.base_material, &tag]);

        for iteration in 1..=self.max_iterations {
            if let Some((accepted_value, mapped_result)) = accept(&digest, &self.range, &self.threshold) {
                return Ok(DrawResult {
                    index,
                    accepted_value,
                    mapped_result,
                    iteration_count: iteration,
                });
            }

            #[cfg(feature = "debug-tracing")]
            tracing::trace!(index, iteration, digest = %hex::encode(digest), "digest rejected");

            digest = sha256_parts(&[&digest, &tag]);
        }

        debug!(index, ceiling = self.max_iterations, "draw hit iteration ceiling");
        Err(SeedError::IterationCeiling {
            index,
            ceiling: self.max_iterations,
        })
    }

    /// Compute draws `0..count`.
    pub fn draw_many(&self, count: u8) -> Result<Vec<DrawResult>, SeedError> {
        (0..count as u32).map(|i| self.draw(i)).collect()
    }
}

/// Serde adapter: `BigUint` as a decimal string.
mod biguint_decimal {
    use num_bigint::BigUint;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let text = String::deserialize(deserializer)?;
        BigUint::parse_bytes(text.as_bytes(), 10)
            .ok_or_else(|| D::Error::custom(format!("invalid decimal integer: {text}")))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::BlockHash;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, RngCore, SeedableRng};

    const H1: &str = "00000000000000000002a7c4c1e48d76c5a37902165a270156b7a8d72728a054";
    const H2: &str = "0000000000000000000320283a032748cef8227873ff4872689bf23f1cda83a5";

    fn blocks(hexes: &[&str]) -> CompletedBlocks {
        let hashes = hexes.iter().map(|h| h.parse::<BlockHash>().unwrap()).collect();
        CompletedBlocks::from_hashes(800_001, hashes).unwrap()
    }

    #[test]
    fn test_range_validation() {
        assert!(DrawRange::new(1, 6).is_ok());
        assert!(DrawRange::new(5, 5).is_ok());
        assert!(DrawRange::new(-50, 50).is_ok());
        assert!(DrawRange::new(0, MAX_RANGE_SPAN).is_ok());
        assert!(matches!(DrawRange::new(7, 6), Err(ConfigError::InvertedRange { .. })));
        assert!(matches!(
            DrawRange::new(0, MAX_RANGE_SPAN + 1),
            Err(ConfigError::RangeTooLarge { .. })
        ));
        assert!(matches!(
            DrawRange::new(i64::MIN, i64::MAX),
            Err(ConfigError::RangeTooLarge { .. })
        ));
        assert_eq!(DrawRange::new(0, MAX_RANGE_SPAN).unwrap().size(), 1_000_000_000_001);
    }

    #[test]
    fn test_known_values_single_block() {
        // These values must never change!
        // If they do, previously published proofs stop reproducing.
        let engine = SeedEngine::new(&blocks(&[H1]), DrawRange::new(1, 6).unwrap());
        let draws = engine.draw_many(3).unwrap();

        assert_eq!(
            draws.iter().map(|d| d.mapped_result).collect::<Vec<_>>(),
            vec![6, 4, 3]
        );
        assert_eq!(
            draws[0].accepted_value.to_str_radix(10),
            "100689883646279171554659554316572710937813079226424960654619870320830768476449"
        );
        assert!(draws.iter().all(|d| d.iteration_count == 1));
        assert_eq!(draws[2].index, 2);
    }

    #[test]
    fn test_known_values_two_blocks() {
        let engine = SeedEngine::new(&blocks(&[H1, H2]), DrawRange::new(1, 100).unwrap());
        let results: Vec<i64> = engine
            .draw_many(3)
            .unwrap()
            .into_iter()
            .map(|d| d.mapped_result)
            .collect();
        assert_eq!(results, vec![7, 87, 22]);
    }

    #[test]
    fn test_known_values_negative_and_wide_ranges() {
        let set = blocks(&[H1]);
        let negative = SeedEngine::new(&set, DrawRange::new(-50, 50).unwrap());
        assert_eq!(negative.draw(0).unwrap().mapped_result, -34);

        let wide = SeedEngine::new(&set, DrawRange::new(0, MAX_RANGE_SPAN).unwrap());
        assert_eq!(wide.draw(0).unwrap().mapped_result, 353_677_469_111);
    }

    #[test]
    fn test_draw_determinism() {
        let engine = SeedEngine::new(&blocks(&[H1, H2]), DrawRange::new(1, 1000).unwrap());
        for i in 0..10 {
            assert_eq!(engine.draw(i).unwrap(), engine.draw(i).unwrap());
        }
    }

    #[test]
    fn test_block_order_matters() {
        let range = DrawRange::new(0, MAX_RANGE_SPAN).unwrap();
        let forward = SeedEngine::new(&blocks(&[H1, H2]), range).draw(0).unwrap();
        let reversed = SeedEngine::new(&blocks(&[H2, H1]), range).draw(0).unwrap();
        assert_ne!(forward.accepted_value, reversed.accepted_value);
    }

    #[test]
    fn test_indices_use_distinct_material() {
        let engine = SeedEngine::new(&blocks(&[H1]), DrawRange::new(0, MAX_RANGE_SPAN).unwrap());
        let a = engine.draw(0).unwrap();
        let b = engine.draw(1).unwrap();
        assert_ne!(a.accepted_value, b.accepted_value);
        assert_ne!(domain_tag(1), domain_tag(10));
        assert_eq!(domain_tag(7), b"draw:7".to_vec());
    }

    #[test]
    fn test_single_value_range() {
        let engine = SeedEngine::new(&blocks(&[H1]), DrawRange::new(42, 42).unwrap());
        assert_eq!(engine.draw(0).unwrap().mapped_result, 42);
        assert_eq!(acceptance_threshold(1), BigUint::one() << 256u32);
    }

    #[test]
    fn test_threshold_rejects_top_of_domain() {
        // 2^256 mod 3 == 1, so the all-ones digest lies above the threshold.
        let range = DrawRange::new(0, 2).unwrap();
        let threshold = acceptance_threshold(3);
        assert_eq!(threshold, (BigUint::one() << 256u32) - 1u32);
        assert!(accept(&[0xFF; 32], &range, &threshold).is_none());

        let mut below = [0xFF; 32];
        below[31] = 0xFE;
        let (x, mapped) = accept(&below, &range, &threshold).unwrap();
        assert_eq!(mapped as u64, (&x % 3u64).to_u64().unwrap());
    }

    #[test]
    fn test_power_of_two_range_never_rejects() {
        let range = DrawRange::new(0, 1).unwrap();
        let threshold = acceptance_threshold(2);
        assert_eq!(threshold, BigUint::one() << 256u32);
        assert_eq!(accept(&[0xFF; 32], &range, &threshold).unwrap().1, 1);
    }

    #[test]
    fn test_iteration_ceiling_reported() {
        let mut engine = SeedEngine::new(&blocks(&[H1]), DrawRange::new(0, 2).unwrap());
        // Force every digest to be rejected.
        engine.threshold = BigUint::from(0u32);
        engine.max_iterations = 5;
        assert_eq!(
            engine.draw(3),
            Err(SeedError::IterationCeiling { index: 3, ceiling: 5 })
        );
    }

    #[test]
    fn test_uniformity_chi_square() {
        // 10,000 synthetic uniform digests into N = 2.
        let range = DrawRange::new(0, 1).unwrap();
        let threshold = acceptance_threshold(range.size());
        let mut rng = StdRng::seed_from_u64(0xB10C);
        let mut counts = [0u32; 2];
        let mut digest = [0u8; 32];

        for _ in 0..10_000 {
            rng.fill_bytes(&mut digest);
            let (_, mapped) = accept(&digest, &range, &threshold).unwrap();
            counts[mapped as usize] += 1;
        }

        let expected = 5_000.0f64;
        let chi_square: f64 = counts
            .iter()
            .map(|&c| (c as f64 - expected).powi(2) / expected)
            .sum();
        // df = 1; 10.83 is the p = 0.001 critical value.
        assert!(chi_square < 10.83, "chi-square {} too large: {:?}", chi_square, counts);
    }

    #[test]
    fn test_draw_result_serde_decimal() {
        let engine = SeedEngine::new(&blocks(&[H1]), DrawRange::new(1, 6).unwrap());
        let draw = engine.draw(0).unwrap();
        let json = serde_json::to_string(&draw).unwrap();
        assert!(json.contains("\"100689883646279171554659554316572710937813079226424960654619870320830768476449\""));
        let back: DrawResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, draw);
    }

    proptest! {
        #[test]
        fn prop_results_stay_in_range(
            seed in any::<[u8; 32]>(),
            min in -1_000_000_000_000i64..1_000_000_000_000i64,
            span in 0i64..=MAX_RANGE_SPAN,
            index in 0u32..10,
        ) {
            let range = DrawRange::new(min, min + span).unwrap();
            let set = CompletedBlocks::from_hashes(1, vec![BlockHash::from_bytes(seed)]).unwrap();
            let draw = SeedEngine::new(&set, range).draw(index).unwrap();
            prop_assert!(range.contains(draw.mapped_result));
        }
    }
}
