//! Pipe-delimited `key=value` text fields.
//!
//! Commitments and short proofs share one layout: a tag, then `key=value`
//! segments separated by `|`. Pasted text is often wrapped in quotes or
//! embedded in a larger blob, so parsing starts by locating the tagged line.

use std::collections::BTreeMap;
use std::str::FromStr;

use thiserror::Error;

/// Errors when reading commitment or proof text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofParseError {
    /// The expected tag does not occur in the input.
    #[error("no line tagged {0:?} found")]
    MissingTag(&'static str),
    /// A required key is absent.
    #[error("missing field {0:?}")]
    MissingField(&'static str),
    /// A value could not be parsed.
    #[error("invalid value {value:?} for field {field:?}")]
    InvalidField {
        /// Field key.
        field: &'static str,
        /// Raw value.
        value: String,
    },
    /// Fields parse but contradict each other.
    #[error("inconsistent fields: {0}")]
    Inconsistent(String),
    /// Embedded checksum does not match the recomputed one.
    #[error("checksum mismatch: embedded {embedded}, computed {computed}")]
    ChecksumMismatch {
        /// Checksum found in the text.
        embedded: String,
        /// Checksum over the parsed fields.
        computed: String,
    },
}

/// Find the first line containing `tag` and return it from the tag onward.
///
/// Surrounding quotes and whitespace are stripped.
pub fn extract_tagged_line<'a>(blob: &'a str, tag: &str) -> Option<&'a str> {
    blob.lines().find_map(|line| {
        let start = line.find(tag)?;
        let tail = line[start..].trim();
        Some(tail.trim_end_matches(['"', '\'']).trim_end())
    })
}

/// Parsed `key=value` segments of a tagged line.
#[derive(Debug, Default)]
pub struct Fields {
    values: BTreeMap<String, String>,
}

impl Fields {
    /// Split `body` on `|` into trimmed `key=value` pairs.
    ///
    /// Segments without `=` are skipped; a repeated key keeps its last value.
    pub fn parse(body: &str) -> Self {
        let values = body
            .split('|')
            .filter_map(|segment| {
                let (key, value) = segment.split_once('=')?;
                Some((key.trim().to_string(), value.trim().to_string()))
            })
            .collect();
        Self { values }
    }

    /// Raw value of a required key.
    pub fn raw(&self, key: &'static str) -> Result<&str, ProofParseError> {
        match self.values.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ProofParseError::MissingField(key)),
        }
    }

    /// Parsed value of a required key.
    pub fn get<T: FromStr>(&self, key: &'static str) -> Result<T, ProofParseError> {
        let raw = self.raw(key)?;
        raw.parse().map_err(|_| ProofParseError::InvalidField {
            field: key,
            value: raw.to_string(),
        })
    }

    /// Raw value of an optional key.
    pub fn optional(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Parse `"<min>-<max>"`, allowing negative bounds such as `"-10--1"`.
pub fn parse_range(raw: &str) -> Option<(i64, i64)> {
    let first = raw.chars().next()?;
    let sep = raw[first.len_utf8()..].find('-')? + first.len_utf8();
    let min = raw[..sep].trim().parse().ok()?;
    let max = raw[sep + 1..].trim().parse().ok()?;
    Some((min, max))
}

/// Parse `"[a,b,c]"`; brackets are required, empty entries are skipped.
pub fn parse_list(raw: &str) -> Option<Vec<i64>> {
    let inner = raw.strip_prefix('[')?.strip_suffix(']')?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse().ok())
        .collect()
}

/// Render values as `a,b,c`.
pub fn join_list(values: &[i64]) -> String {
    values.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}
