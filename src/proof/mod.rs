//! Commit-Reveal Proof System
//!
//! Provides auditable draws through:
//! - A checksummed commitment published before the blocks exist
//! - A one-line short proof that verifies on its own
//! - A long proof and transcript for recomputing every draw
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF SYSTEM                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  fields.rs      - pipe-delimited key=value text parsing     │
//! │  commitment.rs  - pre-draw commitment protocol              │
//! │  short_proof.rs - single-line self-certifying proof         │
//! │  transcript.rs  - draw transcript and long proof            │
//! │  verify.rs      - verification by replay                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod commitment;
pub mod fields;
pub mod short_proof;
pub mod transcript;
pub mod verify;

// Re-export key types
pub use commitment::{
    verify_commitment, CommitError, Commitment, CommitmentBuilder, DrawParams, COMMITMENT_TAG, MAX_DRAWS,
};
pub use fields::ProofParseError;
pub use short_proof::{verify_short_proof, ShortProof, PROOF_TAG};
pub use transcript::{LongProofOptions, Transcript, TranscriptError, TRANSCRIPT_VERSION};
pub use verify::{verify_transcript, VerificationError, VerificationResult};
