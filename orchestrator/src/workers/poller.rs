//! Progressive polling worker
//!
//! Generic recurring-task scheduler: invokes an async callback on a
//! schedule whose interval grows per a backoff strategy up to a maximum,
//! then holds there. Supports pause/resume and an immediate reset that
//! cancels the pending tick. Callback invocations never overlap: the next
//! tick is scheduled only after the previous invocation settles.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Notify;
use tracing::debug;

use crate::utils::exp_backoff_interval;

type PollCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// How successive intervals grow
pub enum BackoffStrategy {
    /// `base * 2^attempt`, capped at the maximum interval
    Exponential,

    /// Caller-supplied `(attempt, base) -> interval`; the result is still
    /// capped at the maximum interval
    Custom(Arc<dyn Fn(u32, Duration) -> Duration + Send + Sync>),
}

impl BackoffStrategy {
    fn next_interval(&self, attempt: u32, base: Duration, max: Duration) -> Duration {
        match self {
            BackoffStrategy::Exponential => exp_backoff_interval(attempt, base, max),
            BackoffStrategy::Custom(strategy) => strategy(attempt, base).min(max),
        }
    }
}

/// When the first invocation happens after `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    /// Fire right away
    #[default]
    Immediate,

    /// Wait one full base interval first
    Delayed,
}

/// What `reset_polling` cancels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Cancel the pending tick and clear the attempt counter
    Immediate,

    /// Only clear the attempt counter; the pending tick stays scheduled
    AttemptsOnly,
}

/// Poller options
pub struct PollerOptions {
    /// First interval of the schedule
    pub base_interval: Duration,

    /// Upper bound every interval is capped at
    pub max_interval: Duration,

    /// Interval growth strategy
    pub strategy: BackoffStrategy,

    /// First-invocation behavior
    pub start_mode: StartMode,
}

struct PollerShared {
    options: PollerOptions,
    callback: PollCallback,
    attempt: AtomicU32,
    running: AtomicBool,
    epoch: AtomicU64,
    wake: Notify,
}

impl PollerShared {
    fn alive(&self, epoch: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.epoch.load(Ordering::SeqCst) == epoch
    }
}

/// Recurring-task scheduler with progressive backoff
pub struct ProgressivePoller {
    shared: Arc<PollerShared>,
}

impl ProgressivePoller {
    pub fn new<F, Fut>(options: PollerOptions, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            shared: Arc::new(PollerShared {
                options,
                callback: Arc::new(move || callback().boxed()),
                attempt: AtomicU32::new(0),
                running: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                wake: Notify::new(),
            }),
        }
    }

    /// Whether the polling loop is active
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Start polling. No-op while already running.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }
        // A fresh epoch invalidates any loop left over from a previous run
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let shared = Arc::clone(&self.shared);
        tokio::spawn(run_loop(shared, epoch));
    }

    /// Stop polling. The callback is never invoked again until `start`.
    pub fn pause(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.wake.notify_waiters();
    }

    /// Reset the backoff schedule
    pub fn reset_polling(&self, mode: ResetMode) {
        self.shared.attempt.store(0, Ordering::SeqCst);
        if matches!(mode, ResetMode::Immediate) {
            // Cancels the pending tick; a running loop reschedules from
            // the base interval
            self.shared.wake.notify_waiters();
        }
    }
}

impl Drop for ProgressivePoller {
    fn drop(&mut self) {
        self.pause();
    }
}

async fn run_loop(shared: Arc<PollerShared>, epoch: u64) {
    debug!(epoch, "poller loop starting");

    // An immediate first invocation sits outside the backoff schedule:
    // the first scheduled wait still uses the base interval
    if matches!(shared.options.start_mode, StartMode::Immediate) {
        if !shared.alive(epoch) {
            return;
        }
        (shared.callback)().await;
    }

    loop {
        if !shared.alive(epoch) {
            debug!(epoch, "poller loop stopping");
            return;
        }

        let attempt = shared.attempt.load(Ordering::SeqCst);
        let interval = shared.options.strategy.next_interval(
            attempt,
            shared.options.base_interval,
            shared.options.max_interval,
        );
        debug!(epoch, attempt, ?interval, "next poll scheduled");

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shared.wake.notified() => {
                // Woken by pause or an immediate reset; either way the
                // pending tick is cancelled and the schedule recomputes
                continue;
            }
        }

        if !shared.alive(epoch) {
            debug!(epoch, "poller loop stopping");
            return;
        }

        (shared.callback)().await;
        shared.attempt.fetch_add(1, Ordering::SeqCst);
    }
}
