//! Canonical String Checksum
//!
//! Commitments and short proofs are self-certifying through a CRC-32 over
//! their canonical field string. Only the low 16 bits are published, rendered
//! as four upper-case hex digits.

/// Number of hex digits in a published checksum.
pub const CHECKSUM_LEN: usize = 4;

/// Full CRC-32 (reflected polynomial `0xEDB88320`, all-ones init, inverted output)
/// over the string's bytes.
pub fn crc32(canonical: &str) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(canonical.as_bytes());
    hasher.finalize()
}

/// Published checksum: low 4 hex digits of the CRC-32, upper-cased.
pub fn checksum(canonical: &str) -> String {
    format!("{:04X}", crc32(canonical) & 0xFFFF)
}

/// Check an embedded checksum against the canonical string (case-insensitive).
///
/// Canonical strings are ASCII by construction; anything else never matches.
pub fn checksum_matches(canonical: &str, embedded: &str) -> bool {
    if !canonical.is_ascii() {
        return false;
    }
    if embedded.len() != CHECKSUM_LEN || !embedded.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }
    checksum(canonical).eq_ignore_ascii_case(embedded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_reference_value() {
        // Standard CRC-32 check value.
        assert_eq!(crc32("123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_commitment_reference_checksum() {
        let canonical = "prov=mp|tip=800000|start=800001|k=1|min=1|max=6|n=1";
        assert_eq!(crc32(canonical), 1_036_083_669);
        assert_eq!(checksum(canonical), "61D5");
    }

    #[test]
    fn test_checksum_is_zero_padded() {
        for input in ["", "a", "prov=bs", "k=5"] {
            let sum = checksum(input);
            assert_eq!(sum.len(), CHECKSUM_LEN);
            assert!(sum.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        }
        // CRC-32 of the empty string is zero.
        assert_eq!(checksum(""), "0000");
    }

    #[test]
    fn test_checksum_matches() {
        let canonical = "prov=mp|tip=800000|start=800001|k=1|min=1|max=6|n=1";
        assert!(checksum_matches(canonical, "61D5"));
        assert!(checksum_matches(canonical, "61d5"));
        assert!(!checksum_matches(canonical, "61D6"));
        assert!(!checksum_matches(canonical, "061D5"));
        assert!(!checksum_matches(canonical, "61G5"));
    }

    #[test]
    fn test_non_ascii_never_matches() {
        let canonical = "prov=m\u{e9}";
        let sum = checksum(canonical);
        assert!(!checksum_matches(canonical, &sum));
    }
}
