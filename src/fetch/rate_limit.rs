//! Two interchangeable throttling strategies that gate outbound requests:
//! a quota model fed from server-reported headers, and a cadence model for
//! limits with no explicit remaining-count feedback.
//!
//! Each adapter owns its limiter instances; `apply`/`update` are only safe
//! when driven from a single fetch loop.

use chrono::{DateTime, Utc};
use core::time::Duration;
use tokio::time::Instant;

const LOG_TARGET: &str = " rate_limit";

/// Remaining-quota-plus-reset-time limiter.
#[derive(Debug)]
pub struct QuotaLimit {
    remaining: i64,
    reset_at: DateTime<Utc>,
}

impl QuotaLimit {
    #[must_use]
    pub const fn new(initial_remaining: i64) -> Self {
        Self {
            remaining: initial_remaining,
            reset_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Suspend until the next call is permitted: sleeps only when the quota
    /// is exhausted, for the time until the reported reset.
    pub async fn apply(&self) {
        if self.remaining > 0 {
            return;
        }
        if let Ok(wait) = (self.reset_at - Utc::now()).to_std()
            && !wait.is_zero()
        {
            log::info!(target: LOG_TARGET, "hit rate limit, now waiting {:.3} seconds...", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
    }

    /// Overwrite both fields from authoritative server-reported values. The
    /// count is never decremented locally, so a quota shared with other
    /// consumers stays correct.
    pub fn update(&mut self, remaining: i64, reset_at: DateTime<Utc>) {
        self.remaining = remaining;
        self.reset_at = reset_at;
    }
}

/// Last-call-plus-minimum-spacing limiter.
#[derive(Debug)]
pub struct CadenceLimit {
    spacing: Duration,
    last_call: Option<Instant>,
}

impl CadenceLimit {
    #[must_use]
    pub const fn new(spacing: Duration) -> Self {
        Self { spacing, last_call: None }
    }

    /// Suspend until the minimum spacing since the last call has passed.
    /// The first call is always free.
    pub async fn apply(&self) {
        let Some(last_call) = self.last_call else {
            return;
        };
        let elapsed = last_call.elapsed();
        if elapsed < self.spacing {
            let wait = self.spacing - elapsed;
            log::debug!(target: LOG_TARGET, "limit request rate by waiting {:.3} seconds...", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
    }

    /// Stamp the completion of the call just made.
    pub fn update(&mut self) {
        self.last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_quota_blocks_until_reset() {
        let mut limit = QuotaLimit::new(30);
        limit.update(0, Utc::now() + chrono::Duration::seconds(5));

        let start = Instant::now();
        limit.apply().await;
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_with_remaining_budget_does_not_block() {
        let mut limit = QuotaLimit::new(0);
        limit.update(10, Utc::now() + chrono::Duration::seconds(3600));

        let start = Instant::now();
        limit.apply().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_fresh_quota_limit_with_past_reset_does_not_sleep() {
        let limit = QuotaLimit::new(0);
        let start = std::time::Instant::now();
        limit.apply().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cadence_enforces_minimum_spacing() {
        let mut limit = CadenceLimit::new(Duration::from_secs(5));

        let start = Instant::now();
        limit.apply().await; // first call is free
        limit.update();
        limit.apply().await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cadence_without_update_does_not_block_again() {
        let mut limit = CadenceLimit::new(Duration::from_secs(5));
        limit.apply().await;
        limit.update();
        limit.apply().await;

        // no update() in between, the spacing from the stamped call still counts
        let start = Instant::now();
        limit.apply().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
