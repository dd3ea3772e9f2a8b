//! # Bitcoin Block RNG
//!
//! Publicly auditable random numbers seeded by the hashes of future Bitcoin
//! blocks. The operator publishes a checksummed commitment naming the next
//! block heights before they are mined, waits for those blocks, and maps their
//! hashes into the requested range with bias-free rejection sampling.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    BITCOIN BLOCK RNG                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── hash.rs     - Block hashes, SHA-256                     │
//! │  ├── checksum.rs - CRC-32 canonical string checksum          │
//! │  ├── blocks.rs   - Committed block window                    │
//! │  └── rng.rs      - Rejection-sampling draw engine            │
//! │                                                              │
//! │  provider/       - Block explorer backends                   │
//! │  ├── esplora.rs  - mempool.space / blockstream.info HTTP     │
//! │  ├── failover.rs - One retry on the other backend            │
//! │  └── memory.rs   - Scripted in-memory chain                  │
//! │                                                              │
//! │  proof/          - Commit-reveal proofs                      │
//! │  ├── commitment.rs - Pre-draw commitment                     │
//! │  ├── short_proof.rs- One-line self-certifying proof          │
//! │  ├── transcript.rs - Long proof and replayable transcript    │
//! │  └── verify.rs     - Verification by replay                  │
//! │                                                              │
//! │  session/        - Waiting and orchestration                 │
//! │  ├── waiter.rs   - Cancellable block waiter                  │
//! │  ├── telemetry.rs- Tip tracker and background monitor        │
//! │  └── session.rs  - Single-session controller                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `proof/` modules are **100% deterministic**:
//! - No floating-point arithmetic
//! - No system time dependencies
//! - Draws depend only on the committed block hashes and the draw index
//!
//! Given the same committed blocks, every verifier computes **identical
//! draws** on any platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod proof;
pub mod provider;
pub mod session;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use crate::core::blocks::{BlockSet, CompletedBlocks};
pub use crate::core::hash::BlockHash;
pub use crate::core::rng::{DrawRange, DrawResult, SeedEngine, SeedError};
pub use proof::{
    verify_commitment, verify_short_proof, verify_transcript, Commitment, CommitmentBuilder, ShortProof,
    Transcript,
};
pub use provider::{HashSource, ProviderError, ProviderKind};
pub use session::{BlockWaiter, ProofReady, SessionController, SessionError, StopHandle, WaitOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
