//! Block Waiter
//!
//! Polls a hash source, one height at a time in ascending order, until every
//! slot of the committed window is filled.
//!
//! ```text
//!   Idle ──wait()──▶ Waiting ──all K filled──▶ Completed
//!                       │
//!                       └──cancel observed──▶ Cancelled
//! ```
//!
//! A failed or empty lookup means "not mined yet": the waiter backs off for the
//! poll interval, checking the cancellation token every `cancel_check`, and
//! tries the same height again. Provider errors never end a wait.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::clock::Clock;
use super::telemetry::TipTracker;
use crate::config::Config;
use crate::core::blocks::{BlockSet, BlockSetError, CompletedBlocks};
use crate::core::hash::BlockHash;
use crate::provider::HashSource;

/// Waiter lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterState {
    /// Not started.
    Idle,
    /// Polling for blocks.
    Waiting,
    /// Every committed block is known.
    Completed,
    /// Stopped before completion.
    Cancelled,
}

/// Polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Backoff between polls of a missing height.
    pub poll_interval: Duration,
    /// Longest stretch of backoff without a cancellation check.
    pub cancel_check: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for WaitConfig {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            cancel_check: config.cancel_check,
        }
    }
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Full window, ready for drawing.
    Completed(CompletedBlocks),
    /// Partial window. Kept for display only; it cannot be drawn from.
    Cancelled(BlockSet),
}

/// Misuse of a waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// `wait` called on a waiter that already ran.
    #[error("waiter already {0:?}")]
    NotIdle(WaiterState),
    /// The window has no slots.
    #[error("empty block window")]
    EmptyWindow,
    /// A polled hash could not be stored.
    #[error(transparent)]
    BlockSet(#[from] BlockSetError),
}

/// Single-use state machine filling one committed window.
pub struct BlockWaiter<P: ?Sized, C: ?Sized> {
    source: Arc<P>,
    clock: Arc<C>,
    tracker: Option<Arc<TipTracker>>,
    config: WaitConfig,
    state: WaiterState,
}

impl<P, C> BlockWaiter<P, C>
where
    P: HashSource + ?Sized,
    C: Clock + ?Sized,
{
    /// Idle waiter over `source`.
    pub fn new(source: Arc<P>, clock: Arc<C>, config: WaitConfig) -> Self {
        Self {
            source,
            clock,
            tracker: None,
            config,
            state: WaiterState::Idle,
        }
    }

    /// Update `tracker` with each found block's timestamp.
    pub fn with_tracker(mut self, tracker: Arc<TipTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Current state.
    pub fn state(&self) -> WaiterState {
        self.state
    }

    /// Fill `blocks`, starting from its lowest empty slot.
    ///
    /// Slots already filled (back-fill at initialization) are kept and not
    /// polled again. Returns once the window is complete or `cancel` fires.
    #[instrument(skip_all, fields(start = blocks.start_height(), k = blocks.len()))]
    pub async fn wait(&mut self, mut blocks: BlockSet, cancel: &CancellationToken) -> Result<WaitOutcome, WaitError> {
        if self.state != WaiterState::Idle {
            return Err(WaitError::NotIdle(self.state));
        }
        if blocks.is_empty() {
            return Err(WaitError::EmptyWindow);
        }
        self.state = WaiterState::Waiting;
        info!(remaining = blocks.remaining(), "waiting for committed blocks");

        while let Some(height) = blocks.next_missing() {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(blocks));
            }

            match self.source.hash_by_height(height).await {
                Ok(hash) => {
                    blocks.fill(height, hash)?;
                    info!(height, %hash, remaining = blocks.remaining(), "committed block found");
                    self.record_block(height, &hash).await;
                    continue;
                }
                Err(e) => debug!(height, error = %e, "block not available yet"),
            }

            if !self.backoff(cancel).await {
                return Ok(self.cancelled(blocks));
            }
        }

        let completed = blocks.into_completed().map_err(|_| WaitError::EmptyWindow)?;
        self.state = WaiterState::Completed;
        info!("all committed blocks found");
        Ok(WaitOutcome::Completed(completed))
    }

    fn cancelled(&mut self, blocks: BlockSet) -> WaitOutcome {
        self.state = WaiterState::Cancelled;
        info!(filled = blocks.len() - blocks.remaining(), "wait cancelled");
        WaitOutcome::Cancelled(blocks)
    }

    /// Sleep one poll interval in `cancel_check` slices. False if cancelled.
    async fn backoff(&self, cancel: &CancellationToken) -> bool {
        let slice = self.config.cancel_check.max(Duration::from_millis(1));
        let mut remaining = self.config.poll_interval;
        while !remaining.is_zero() {
            if cancel.is_cancelled() {
                return false;
            }
            let step = remaining.min(slice);
            self.clock.sleep(step).await;
            remaining -= step;
        }
        !cancel.is_cancelled()
    }

    async fn record_block(&self, height: u64, hash: &BlockHash) {
        let Some(tracker) = &self.tracker else {
            return;
        };
        match self.source.block_meta(hash).await {
            Ok(meta) => tracker.observe(height, meta.timestamp, self.clock.now_unix()).await,
            Err(e) => debug!(height, error = %e, "block metadata unavailable"),
        }
    }
}
