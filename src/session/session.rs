//! Draw Session Management
//!
//! Owns the single active session and drives it from commitment to proofs.
//! Results are announced as [`ProofReady`] messages; the controller never
//! renders or copies anything itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::clock::Clock;
use super::telemetry::{TipMonitor, TipTracker};
use super::waiter::{BlockWaiter, WaitConfig, WaitError, WaitOutcome};
use crate::core::blocks::BlockSet;
use crate::core::rng::{SeedEngine, SeedError};
use crate::proof::commitment::{CommitError, Commitment, CommitmentBuilder};
use crate::proof::transcript::{LongProofOptions, Transcript};
use crate::provider::HashSource;

/// Unique session identifier.
pub type SessionId = Uuid;

/// Capacity of the proof announcement channel.
const PROOF_CHANNEL_CAPACITY: usize = 16;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Commitment published, not yet waiting.
    Committed,
    /// Waiting for committed blocks.
    Waiting,
    /// All blocks known, draws not yet computed.
    Completed,
    /// Draws computed and proofs rendered.
    Drawn,
    /// Stopped before all blocks were known.
    Cancelled,
}

/// Proofs for a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofReady {
    /// Session the proofs belong to.
    pub session_id: SessionId,
    /// Single-line proof.
    pub short_proof: String,
    /// Multi-line transcript.
    pub long_proof: String,
    /// Commitment text published before the blocks existed.
    pub commitment: String,
}

/// How [`SessionController::begin`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Draws made; the same message was broadcast to subscribers.
    Drawn(ProofReady),
    /// Stopped; the partial window was discarded from drawing.
    Cancelled {
        /// Cancelled session.
        session_id: SessionId,
        /// Heights found before the stop.
        filled: usize,
    },
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A session is already waiting or drawing.
    #[error("a session is already in progress")]
    Busy,
    /// Commitment could not be made.
    #[error(transparent)]
    Commit(#[from] CommitError),
    /// The waiter was misused.
    #[error(transparent)]
    Wait(#[from] WaitError),
    /// The draw engine failed.
    #[error(transparent)]
    Seed(#[from] SeedError),
}

/// One commit-wait-draw cycle.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session ID.
    pub id: SessionId,
    /// When the commitment was made.
    pub created_at: DateTime<Utc>,
    /// Current state.
    pub state: SessionState,
    /// Published commitment.
    pub commitment: Commitment,
    /// Blocks found so far (partial when cancelled).
    pub blocks: BlockSet,
    /// Draw record, once drawn.
    pub transcript: Option<Transcript>,
    /// Rendered proofs, once drawn.
    pub proofs: Option<ProofReady>,
}

impl Session {
    fn new(commitment: Commitment) -> Self {
        let blocks = BlockSet::new(commitment.start_height(), commitment.block_count());
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            state: SessionState::Committed,
            commitment,
            blocks,
            transcript: None,
            proofs: None,
        }
    }
}

/// Cooperative stop for the session in flight.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    /// Ask the waiter to stop at its next check point.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// True once stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Clears the in-flight flag and resumes telemetry however `begin` exits.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    monitor: Option<&'a TipMonitor>,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SessionError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SessionError::Busy)?;
        Ok(Self { flag, monitor: None })
    }

    fn pause(&mut self, monitor: Option<&'a TipMonitor>) {
        if let Some(monitor) = monitor {
            monitor.pause();
        }
        self.monitor = monitor;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor {
            monitor.resume();
        }
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Owner of the single active session.
pub struct SessionController<P: ?Sized, C: ?Sized> {
    source: Arc<P>,
    clock: Arc<C>,
    wait: WaitConfig,
    tracker: Arc<TipTracker>,
    monitor: Option<TipMonitor>,
    proof_options: LongProofOptions,
    session: Mutex<Option<Session>>,
    stop: Mutex<CancellationToken>,
    in_flight: AtomicBool,
    proofs_tx: broadcast::Sender<ProofReady>,
}

impl<P, C> SessionController<P, C>
where
    P: HashSource + ?Sized,
    C: Clock + ?Sized,
{
    /// Controller with no session.
    pub fn new(source: Arc<P>, clock: Arc<C>, wait: WaitConfig) -> Self {
        let (proofs_tx, _) = broadcast::channel(PROOF_CHANNEL_CAPACITY);
        Self {
            source,
            clock,
            wait,
            tracker: Arc::new(TipTracker::new()),
            monitor: None,
            proof_options: LongProofOptions::default(),
            session: Mutex::new(None),
            stop: Mutex::new(CancellationToken::new()),
            in_flight: AtomicBool::new(false),
            proofs_tx,
        }
    }

    /// Share `tracker` with the waiter.
    pub fn with_tracker(mut self, tracker: Arc<TipTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Pause `monitor` while a wait is active.
    pub fn with_monitor(mut self, monitor: TipMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Long proof rendering options.
    pub fn with_proof_options(mut self, options: LongProofOptions) -> Self {
        self.proof_options = options;
        self
    }

    /// Receive a [`ProofReady`] for every drawn session.
    pub fn subscribe(&self) -> broadcast::Receiver<ProofReady> {
        self.proofs_tx.subscribe()
    }

    /// Tip telemetry shared with the waiter.
    pub fn tracker(&self) -> Arc<TipTracker> {
        self.tracker.clone()
    }

    /// Detach the background monitor, e.g. for shutdown.
    pub fn take_monitor(&mut self) -> Option<TipMonitor> {
        self.monitor.take()
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    /// True while a session is waiting or drawing.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Handle that stops the session in flight, or the next one to begin.
    ///
    /// A handle stays bound to that one session.
    pub async fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.stop.lock().await.clone(),
        }
    }

    /// Stop the session in flight. Returns false if none was running.
    pub async fn stop(&self) -> bool {
        if !self.is_busy() {
            return false;
        }
        self.stop.lock().await.cancel();
        true
    }

    /// Publish a commitment without waiting yet, replacing any idle session.
    #[instrument(skip_all)]
    pub async fn prepare_commitment(&self, builder: &CommitmentBuilder) -> Result<Commitment, SessionError> {
        let _guard = InFlight::acquire(&self.in_flight)?;
        let result = builder.build(&*self.source).await;
        // A stop that lands while committing has no wait to end; it must not
        // cancel the session that `begin` will start.
        {
            let mut stop = self.stop.lock().await;
            if stop.is_cancelled() {
                debug!("discarding stop requested during commitment");
                *stop = CancellationToken::new();
            }
        }
        let commitment = result?;
        let session = Session::new(commitment.clone());
        info!(session = %session.id, text = %commitment.to_text(), "commitment prepared");
        *self.session.lock().await = Some(session);
        Ok(commitment)
    }

    /// Wait for the committed blocks, draw, and announce the proofs.
    ///
    /// Uses the prepared commitment if one is pending; otherwise commits with
    /// `builder` first. Any finished previous session is discarded.
    #[instrument(skip_all)]
    pub async fn begin(&self, builder: &CommitmentBuilder) -> Result<SessionOutcome, SessionError> {
        let mut guard = InFlight::acquire(&self.in_flight)?;
        let token = self.stop.lock().await.clone();
        let result = self.run_session(builder, &token, &mut guard).await;
        // Handles taken for this session must not reach the next one.
        *self.stop.lock().await = CancellationToken::new();
        result
    }

    async fn run_session<'a>(
        &'a self,
        builder: &CommitmentBuilder,
        token: &CancellationToken,
        guard: &mut InFlight<'a>,
    ) -> Result<SessionOutcome, SessionError> {
        let prepared = {
            let mut slot = self.session.lock().await;
            match slot.take() {
                Some(session) if session.state == SessionState::Committed => Some(session),
                Some(old) => {
                    debug!(session = %old.id, state = ?old.state, "discarding previous session");
                    None
                }
                None => None,
            }
        };
        let mut session = match prepared {
            Some(session) => session,
            None => {
                let commitment = builder.build(&*self.source).await?;
                info!(text = %commitment.to_text(), "commitment created");
                Session::new(commitment)
            }
        };

        session.state = SessionState::Waiting;
        let session_id = session.id;
        let window = session.blocks.clone();
        *self.session.lock().await = Some(session.clone());

        guard.pause(self.monitor.as_ref());
        let mut waiter = BlockWaiter::new(self.source.clone(), self.clock.clone(), self.wait)
            .with_tracker(self.tracker.clone());
        let outcome = waiter.wait(window, token).await?;

        let completed = match outcome {
            WaitOutcome::Cancelled(partial) => {
                let filled = partial.len() - partial.remaining();
                session.blocks = partial;
                session.state = SessionState::Cancelled;
                *self.session.lock().await = Some(session);
                info!(session = %session_id, filled, "session cancelled");
                return Ok(SessionOutcome::Cancelled { session_id, filled });
            }
            WaitOutcome::Completed(completed) => completed,
        };

        for (offset, hash) in completed.hashes().iter().enumerate() {
            session.blocks.fill(completed.start_height() + offset as u64, *hash).map_err(WaitError::from)?;
        }
        session.state = SessionState::Completed;

        let draws = SeedEngine::new(&completed, session.commitment.range())
            .draw_many(session.commitment.draw_count())?;
        let transcript = Transcript::new(session.commitment.clone(), &completed, draws);
        let short_proof = transcript.short_proof();
        let ready = ProofReady {
            session_id,
            short_proof: match &self.proof_options.reference {
                Some(reference) => short_proof.to_text_with_ref(reference),
                None => short_proof.to_text(),
            },
            long_proof: transcript.long_proof(&self.proof_options),
            commitment: session.commitment.to_text(),
        };

        session.transcript = Some(transcript);
        session.proofs = Some(ready.clone());
        session.state = SessionState::Drawn;
        *self.session.lock().await = Some(session);

        info!(session = %session_id, proof = %ready.short_proof, "draw complete");
        if self.proofs_tx.send(ready.clone()).is_err() {
            debug!(session = %session_id, "no proof subscribers");
        }
        Ok(SessionOutcome::Drawn(ready))
    }
}
