//! Block Hash Primitives
//!
//! Validated block hashes and SHA-256 helpers used by seed derivation.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

/// Raw SHA-256 output (256 bits / 32 bytes).
pub type Digest = [u8; 32];

/// Length of a block hash rendered as hex.
pub const BLOCK_HASH_HEX_LEN: usize = 64;

/// A 256-bit block hash in big-endian display order.
///
/// Block explorers report hashes as 64 hex characters; the bytes kept here are
/// exactly those characters decoded left to right, so the raw material fed to
/// the seed engine matches what a verifier reads off a block explorer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockHash([u8; 32]);

/// Errors from parsing a block hash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashParseError {
    /// Wrong number of hex characters.
    #[error("expected {BLOCK_HASH_HEX_LEN} hex characters, got {0}")]
    Length(usize),
    /// Non-hex character in input.
    #[error("invalid hex: {0}")]
    Hex(String),
}

impl BlockHash {
    /// Wrap raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes in display order.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lower-case hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The hash read as a big-endian unsigned integer.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// Decimal rendering of [`Self::to_biguint`].
    pub fn to_decimal(&self) -> String {
        self.to_biguint().to_str_radix(10)
    }
}

impl FromStr for BlockHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clean = s.trim();
        let clean = clean
            .strip_prefix("0x")
            .or_else(|| clean.strip_prefix("0X"))
            .unwrap_or(clean);
        if clean.len() != BLOCK_HASH_HEX_LEN {
            return Err(HashParseError::Length(clean.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(clean, &mut bytes).map_err(|e| HashParseError::Hex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for BlockHash {
    type Error = HashParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlockHash> for String {
    fn from(hash: BlockHash) -> Self {
        hash.to_hex()
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self.to_hex())
    }
}

/// Compute SHA-256 of arbitrary data.
pub fn sha256(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// Compute SHA-256 over several parts without concatenating them first.
pub fn sha256_parts(parts: &[&[u8]]) -> Digest {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_HEX: &str = "00000000000000000002a7c4c1e48d76c5a37902165a270156b7a8d72728a054";

    #[test]
    fn test_parse_and_render() {
        let hash: BlockHash = HASH_HEX.parse().unwrap();
        assert_eq!(hash.to_hex(), HASH_HEX);
        assert_eq!(hash.as_bytes()[0], 0x00);
        assert_eq!(hash.as_bytes()[31], 0x54);
    }

    #[test]
    fn test_parse_trims_and_accepts_upper_case() {
        let noisy = format!("  {}\n", HASH_HEX.to_uppercase());
        let hash: BlockHash = noisy.parse().unwrap();
        assert_eq!(hash.to_hex(), HASH_HEX);

        let prefixed: BlockHash = format!("0x{}", HASH_HEX).parse().unwrap();
        assert_eq!(prefixed, hash);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!("abcd".parse::<BlockHash>(), Err(HashParseError::Length(4)));
        assert!("".parse::<BlockHash>().is_err());

        let bad = format!("zz{}", &HASH_HEX[2..]);
        assert!(matches!(bad.parse::<BlockHash>(), Err(HashParseError::Hex(_))));
    }

    #[test]
    fn test_decimal_form() {
        let one: BlockHash = format!("{}1", "0".repeat(63)).parse().unwrap();
        assert_eq!(one.to_decimal(), "1");

        let max = BlockHash::from_bytes([0xFF; 32]);
        assert_eq!(
            max.to_decimal(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash: BlockHash = HASH_HEX.parse().unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", HASH_HEX));

        let back: BlockHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
        assert!(serde_json::from_str::<BlockHash>("\"1234\"").is_err());
    }

    #[test]
    fn test_sha256_parts_matches_concatenation() {
        let whole = sha256(b"hello world");
        let split = sha256_parts(&[b"hello", b" ", b"world"]);
        assert_eq!(whole, split);
    }
}
