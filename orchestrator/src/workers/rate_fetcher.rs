//! Conversion-rate auto-fetcher
//!
//! Keeps the token/cycles conversion rate fresh while the user is about to
//! start a deployment. Polls with a slowly doubling interval, and only
//! while the page is focused and no deployment action is running.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::ConfigService;
use crate::utils::half_step_backoff_interval;
use crate::workers::poller::{
    BackoffStrategy, PollerOptions, ProgressivePoller, ResetMode, StartMode,
};

const FETCH_INTERVAL: Duration = Duration::from_secs(30);
const FETCH_MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Rapid focus flaps are ignored within this window
const FOCUS_DEBOUNCE: Duration = Duration::from_millis(500);

/// Poller around [`ConfigService::fetch_with_conversion_rate`], gated by
/// page focus and deployment activity
pub struct ConversionRateAutoFetcher {
    poller: ProgressivePoller,
    focused: AtomicBool,
    action_in_progress: AtomicBool,
    debounce_epoch: AtomicU64,
}

impl ConversionRateAutoFetcher {
    pub fn new(config: Arc<ConfigService>) -> Arc<Self> {
        let poller = ProgressivePoller::new(
            PollerOptions {
                base_interval: FETCH_INTERVAL,
                max_interval: FETCH_MAX_INTERVAL,
                strategy: BackoffStrategy::Custom(Arc::new(|attempt, base| {
                    half_step_backoff_interval(attempt, base, FETCH_MAX_INTERVAL)
                })),
                start_mode: StartMode::Delayed,
            },
            move || {
                let config = Arc::clone(&config);
                async move {
                    config.fetch_with_conversion_rate().await;
                }
            },
        );

        Arc::new(Self {
            poller,
            focused: AtomicBool::new(false),
            action_in_progress: AtomicBool::new(false),
            debounce_epoch: AtomicU64::new(0),
        })
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Report a page focus change. Applied after a debounce window so a
    /// quick alt-tab does not restart the schedule.
    pub fn set_page_focused(self: &Arc<Self>, focused: bool) {
        let epoch = self.debounce_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(FOCUS_DEBOUNCE).await;
            if this.debounce_epoch.load(Ordering::SeqCst) != epoch {
                // Superseded by a newer focus change
                return;
            }
            this.focused.store(focused, Ordering::SeqCst);
            this.apply_gate();
        });
    }

    /// Report whether a deployment action is in flight. Polling is
    /// suppressed while one is.
    pub fn set_deployment_action_in_progress(&self, in_progress: bool) {
        self.action_in_progress.store(in_progress, Ordering::SeqCst);
        self.apply_gate();
    }

    fn apply_gate(&self) {
        let focused = self.focused.load(Ordering::SeqCst);
        let action_in_progress = self.action_in_progress.load(Ordering::SeqCst);

        let can_poll = focused && !action_in_progress;
        if can_poll && !self.poller.is_running() {
            debug!("conversion rate polling starting");
            self.poller.start();
            return;
        }

        if !can_poll && self.poller.is_running() {
            debug!(
                focused,
                action_in_progress, "conversion rate polling pausing"
            );
            self.poller.pause();
            self.poller.reset_polling(ResetMode::Immediate);
        }
    }
}
