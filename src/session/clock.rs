//! Time Source
//!
//! Waiting and telemetry never call the runtime's timers directly. A real
//! deployment uses [`TokioClock`]; tests use [`ManualClock`], whose sleeps
//! advance virtual time instantly.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Sleep and wall-clock capability.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);

    /// Current Unix time in seconds.
    fn now_unix(&self) -> u64;
}

/// Runtime timers and system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now_unix(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Virtual clock. `sleep` advances time immediately and yields to the scheduler.
#[derive(Debug)]
pub struct ManualClock {
    elapsed_ms: AtomicU64,
    epoch_unix: u64,
    sleeps: AtomicU32,
    cancel_at: Mutex<Vec<(Duration, CancellationToken)>>,
}

impl ManualClock {
    /// Clock whose `now_unix` starts at `epoch_unix`.
    pub fn new(epoch_unix: u64) -> Self {
        Self {
            elapsed_ms: AtomicU64::new(0),
            epoch_unix,
            sleeps: AtomicU32::new(0),
            cancel_at: Mutex::new(Vec::new()),
        }
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
    }

    /// Number of completed sleeps.
    pub fn sleeps(&self) -> u32 {
        self.sleeps.load(Ordering::SeqCst)
    }

    /// Move time forward without sleeping.
    pub fn advance(&self, by: Duration) {
        self.elapsed_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Cancel `token` once virtual time reaches `at`.
    pub async fn cancel_at(&self, at: Duration, token: CancellationToken) {
        self.cancel_at.lock().await.push((at, token));
    }

    async fn fire_due(&self) {
        let now = self.elapsed();
        self.cancel_at.lock().await.retain(|(at, token)| {
            if *at <= now {
                token.cancel();
                false
            } else {
                true
            }
        });
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.fire_due().await;
        tokio::task::yield_now().await;
    }

    fn now_unix(&self) -> u64 {
        self.epoch_unix + self.elapsed().as_secs()
    }
}
