//! Tip Telemetry
//!
//! Tracks the latest known block so the operator can see how long ago it was
//! mined and roughly when the committed blocks should arrive. Nothing here
//! affects draws; every failure simply leaves the last value in place.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::clock::Clock;
use crate::provider::{HashSource, ProviderError};

/// Target spacing between Bitcoin blocks.
pub const TARGET_BLOCK_INTERVAL: Duration = Duration::from_secs(600);

/// Latest known block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TipSnapshot {
    /// Block height.
    pub height: u64,
    /// Block timestamp (Unix seconds), never later than the observation time.
    pub timestamp: u64,
}

/// Expected arrival of a target height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eta {
    /// Expected in this long.
    Remaining(Duration),
    /// Expected this long ago.
    Overdue(Duration),
}

/// Shared latest-tip state.
#[derive(Debug, Default)]
pub struct TipTracker {
    latest: RwLock<Option<TipSnapshot>>,
}

impl TipTracker {
    /// Tracker with no observation yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a block. Older heights than the current snapshot are ignored.
    ///
    /// Miner timestamps can run ahead of local time; they are clamped to `now`.
    pub async fn observe(&self, height: u64, timestamp: u64, now: u64) {
        let snapshot = TipSnapshot {
            height,
            timestamp: timestamp.min(now),
        };
        let mut latest = self.latest.write().await;
        if latest.map_or(true, |current| height >= current.height) {
            *latest = Some(snapshot);
        }
    }

    /// Latest snapshot, if any.
    pub async fn snapshot(&self) -> Option<TipSnapshot> {
        *self.latest.read().await
    }

    /// Time since the latest known block.
    pub async fn since_last_block(&self, now: u64) -> Option<Duration> {
        self.snapshot()
            .await
            .map(|tip| Duration::from_secs(now.saturating_sub(tip.timestamp)))
    }

    /// Rough arrival estimate for `target_height`: `remaining * 600s - since`.
    pub async fn eta(&self, target_height: u64, now: u64) -> Option<Eta> {
        let tip = self.snapshot().await?;
        let remaining = target_height.saturating_sub(tip.height);
        let expected = TARGET_BLOCK_INTERVAL.as_secs() * remaining;
        let since = now.saturating_sub(tip.timestamp);
        Some(if expected >= since {
            Eta::Remaining(Duration::from_secs(expected - since))
        } else {
            Eta::Overdue(Duration::from_secs(since - expected))
        })
    }
}

/// Read the tip and its timestamp once and record them.
pub async fn refresh_tip<P, C>(source: &P, clock: &C, tracker: &TipTracker) -> Result<TipSnapshot, ProviderError>
where
    P: HashSource + ?Sized,
    C: Clock + ?Sized,
{
    let height = source.tip_height().await?;
    let hash = source.hash_by_height(height).await?;
    let meta = source.block_meta(&hash).await?;
    let now = clock.now_unix();
    tracker.observe(height, meta.timestamp, now).await;
    Ok(TipSnapshot {
        height,
        timestamp: meta.timestamp.min(now),
    })
}

/// Periodic background refresh of a [`TipTracker`].
#[derive(Debug)]
pub struct TipMonitor {
    paused: watch::Sender<bool>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TipMonitor {
    /// Start refreshing every `period`.
    pub fn spawn<P, C>(source: Arc<P>, clock: Arc<C>, tracker: Arc<TipTracker>, period: Duration) -> Self
    where
        P: HashSource + ?Sized + 'static,
        C: Clock + ?Sized + 'static,
    {
        let (paused, mut paused_rx) = watch::channel(false);
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        let handle = tokio::spawn(async move {
            loop {
                while *paused_rx.borrow_and_update() {
                    tokio::select! {
                        changed = paused_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                        _ = stop.cancelled() => return,
                    }
                }

                match refresh_tip(&*source, &*clock, &tracker).await {
                    Ok(tip) => debug!(height = tip.height, "tip refreshed"),
                    Err(e) => debug!(error = %e, "tip refresh failed, keeping last value"),
                }

                tokio::select! {
                    _ = clock.sleep(period) => {}
                    changed = paused_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = stop.cancelled() => return,
                }
            }
        });

        Self {
            paused,
            shutdown,
            handle,
        }
    }

    /// Stop refreshing until [`Self::resume`].
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Resume refreshing.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// True while paused.
    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            debug!(error = %e, "tip monitor task ended abnormally");
        }
        info!("tip monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::BlockHash;
    use crate::provider::{MemoryProvider, ProviderKind};
    use crate::session::clock::ManualClock;

    #[tokio::test]
    async fn test_since_and_eta() {
        let tracker = TipTracker::new();
        assert_eq!(tracker.eta(10, 0).await, None);

        tracker.observe(800_000, 1_000, 1_120).await;
        assert_eq!(tracker.since_last_block(1_120).await, Some(Duration::from_secs(120)));
        // One block to go, two minutes since the tip.
        assert_eq!(tracker.eta(800_001, 1_120).await, Some(Eta::Remaining(Duration::from_secs(480))));
        // Three blocks to go.
        assert_eq!(tracker.eta(800_003, 1_120).await, Some(Eta::Remaining(Duration::from_secs(1_680))));
        // Slow block.
        assert_eq!(tracker.eta(800_001, 1_000 + 900).await, Some(Eta::Overdue(Duration::from_secs(300))));
    }

    #[tokio::test]
    async fn test_future_timestamp_clamped_and_old_heights_ignored() {
        let tracker = TipTracker::new();
        tracker.observe(10, 5_000, 4_000).await;
        assert_eq!(tracker.snapshot().await, Some(TipSnapshot { height: 10, timestamp: 4_000 }));

        tracker.observe(9, 3_000, 4_000).await;
        assert_eq!(tracker.snapshot().await.unwrap().height, 10);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_stale_value() {
        let provider = MemoryProvider::new(ProviderKind::Mempool);
        provider.insert(100, BlockHash::from_bytes([1; 32]), 1_700_000_000).await;
        let clock = ManualClock::new(1_700_000_060);
        let tracker = TipTracker::new();

        let tip = refresh_tip(&provider, &clock, &tracker).await.unwrap();
        assert_eq!(tip.height, 100);

        provider.set_offline(true);
        assert!(refresh_tip(&provider, &clock, &tracker).await.is_err());
        assert_eq!(tracker.snapshot().await.unwrap().height, 100);
        assert_eq!(tracker.since_last_block(clock.now_unix()).await, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_monitor_pause_stops_provider_calls() {
        let provider = Arc::new(MemoryProvider::new(ProviderKind::Mempool));
        provider.insert(5, BlockHash::from_bytes([5; 32]), 1_700_000_000).await;
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let tracker = Arc::new(TipTracker::new());

        let monitor = TipMonitor::spawn(provider.clone(), clock, tracker.clone(), Duration::from_secs(60));
        while provider.calls() < 6 {
            tokio::task::yield_now().await;
        }
        assert_eq!(tracker.snapshot().await.unwrap().height, 5);

        monitor.pause();
        assert!(monitor.is_paused());
        // Let any refresh already in flight finish.
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        let frozen = provider.calls();
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(provider.calls(), frozen);

        monitor.resume();
        while provider.calls() < frozen + 3 {
            tokio::task::yield_now().await;
        }
        monitor.shutdown().await;
    }
}
