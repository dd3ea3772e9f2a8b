//! Session Layer
//!
//! Drives one draw from commitment to proofs.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SESSION LAYER                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  clock.rs     - injectable sleep / wall clock               │
//! │  waiter.rs    - cancellable block waiter state machine      │
//! │  telemetry.rs - tip tracker and background monitor          │
//! │  session.rs   - single-session controller, proof broadcast  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod clock;
#[allow(clippy::module_inception)]
pub mod session;
pub mod telemetry;
pub mod waiter;

pub use clock::{Clock, ManualClock, TokioClock};
pub use session::{
    ProofReady, Session, SessionController, SessionError, SessionId, SessionOutcome, SessionState, StopHandle,
};
pub use telemetry::{refresh_tip, Eta, TipMonitor, TipSnapshot, TipTracker, TARGET_BLOCK_INTERVAL};
pub use waiter::{BlockWaiter, WaitConfig, WaitError, WaitOutcome, WaiterState};
