//! Utility functions

use std::time::Duration;

use crate::models::TimestampMillis;

/// Version information for the orchestrator
#[derive(Debug, Clone)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
    }
}

/// Current wall-clock time in milliseconds since the UNIX epoch
pub fn now_millis() -> TimestampMillis {
    chrono::Utc::now().timestamp_millis().max(0) as TimestampMillis
}

/// Upper bound on a lock-window wait. Protects against a hub clock far
/// ahead of ours producing a multi-day timer.
pub const MAX_LOCK_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// How long to wait before a hub call so that an active lock window has
/// passed. Zero when there is no lock or it already expired.
pub fn lock_delay(locked_till_millis: Option<TimestampMillis>, now: TimestampMillis) -> Duration {
    let Some(locked_till) = locked_till_millis else {
        return Duration::ZERO;
    };
    let delay = Duration::from_millis(locked_till.saturating_sub(now));
    delay.min(MAX_LOCK_DELAY)
}

/// Exponential backoff interval: `base * 2^attempt`, capped at `max`
pub fn exp_backoff_interval(attempt: u32, base: Duration, max: Duration) -> Duration {
    let base_millis = base.as_millis();
    let factor = 1u128.checked_shl(attempt).unwrap_or(u128::MAX);
    let millis = base_millis.saturating_mul(factor).min(max.as_millis());
    Duration::from_millis(millis.min(u64::MAX as u128) as u64)
}

/// Half-step exponential backoff interval: `base * 2^(attempt / 2)`,
/// capped at `max`. Doubles every second attempt.
pub fn half_step_backoff_interval(attempt: u32, base: Duration, max: Duration) -> Duration {
    exp_backoff_interval(attempt / 2, base, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_delay_no_lock() {
        assert_eq!(lock_delay(None, 1_000), Duration::ZERO);
    }

    #[test]
    fn test_lock_delay_expired_lock() {
        assert_eq!(lock_delay(Some(500), 1_000), Duration::ZERO);
    }

    #[test]
    fn test_lock_delay_active_lock() {
        assert_eq!(lock_delay(Some(4_500), 1_000), Duration::from_millis(3_500));
    }

    #[test]
    fn test_lock_delay_capped() {
        let far_future = 1_000 + 10 * MAX_LOCK_DELAY.as_millis() as u64;
        assert_eq!(lock_delay(Some(far_future), 1_000), MAX_LOCK_DELAY);
    }

    #[test]
    fn test_exp_backoff_interval() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(86_400);

        assert_eq!(exp_backoff_interval(0, base, max), Duration::from_secs(5));
        assert_eq!(exp_backoff_interval(1, base, max), Duration::from_secs(10));
        assert_eq!(exp_backoff_interval(2, base, max), Duration::from_secs(20));
        assert_eq!(exp_backoff_interval(60, base, max), max);
        // No overflow on absurd attempt counts
        assert_eq!(exp_backoff_interval(u32::MAX, base, max), max);
    }

    #[test]
    fn test_half_step_backoff_interval() {
        let base = Duration::from_secs(30);
        let max = Duration::from_secs(86_400);

        assert_eq!(half_step_backoff_interval(0, base, max), base);
        assert_eq!(half_step_backoff_interval(1, base, max), base);
        assert_eq!(half_step_backoff_interval(2, base, max), Duration::from_secs(60));
        assert_eq!(half_step_backoff_interval(3, base, max), Duration::from_secs(60));
        assert_eq!(half_step_backoff_interval(4, base, max), Duration::from_secs(120));
    }
}
