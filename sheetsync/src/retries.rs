//! Retry coordination for failed sync runs.
//!
//! A run failing for a transient reason is re-attempted from the committed
//! checkpoint with capped, jittered exponential backoff, up to the configured
//! bound. Non-transient failures surface immediately and are left to manual
//! correction: a fixed sheet, an administrative checkpoint reset, or an
//! explicit re-run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use config::shared::RetryConfig;
use rand::Rng;

use crate::error::{ErrorKind, SyncError};

/// Defines the retry strategy for a failed run.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RetryPolicy {
    /// No retry makes sense; another run is already progressing the source.
    NoRetry,
    /// Retry only after external correction and an explicit re-run.
    ManualRetry,
    /// Retry automatically after the specified timestamp.
    TimedRetry { next_retry: DateTime<Utc> },
}

impl RetryPolicy {
    pub fn retry_in(duration: Duration) -> Self {
        Self::TimedRetry {
            next_retry: Utc::now()
                + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero()),
        }
    }
}

/// Bounds and schedules re-attempts of a run after failure.
#[derive(Debug, Clone)]
pub struct RetryCoordinator {
    config: RetryConfig,
}

impl RetryCoordinator {
    /// Creates a coordinator with the given retry configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the retry policy for an error, based on its kind.
    pub fn policy_for(&self, error: &SyncError) -> RetryPolicy {
        let kind = error.kind();

        if kind.is_transient() {
            return RetryPolicy::retry_in(self.delay_for(1));
        }

        match kind {
            // The competing run is making progress; re-running would only
            // collide with its lease again.
            ErrorKind::ConcurrentRunRejected => RetryPolicy::NoRetry,
            // Everything else needs external correction first: a fixed sheet
            // for structure mismatches, an administrative reset for corrupted
            // checkpoints, a fixed deployment for config errors.
            _ => RetryPolicy::ManualRetry,
        }
    }

    /// Returns `true` when a failed attempt should be automatically
    /// re-attempted given the run's retry bookkeeping.
    pub fn should_retry(&self, error: &SyncError, retry_count: u32, max_retries: u32) -> bool {
        matches!(self.policy_for(error), RetryPolicy::TimedRetry { .. }) && retry_count < max_retries
    }

    /// Calculates the backoff delay before re-attempt number `attempt`
    /// (1-indexed).
    ///
    /// Uses exponential backoff: `initial_backoff * multiplier^(attempt - 1)`,
    /// capped at the configured maximum, with up to 30% random jitter added
    /// to prevent synchronized re-attempts across sources.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.config.backoff_multiplier.powi(exponent as i32);
        let base_delay_ms = self.config.initial_backoff_ms as f64 * multiplier;

        let capped_delay_ms = base_delay_ms.min(self.config.max_backoff_ms as f64);

        let jitter = rand::thread_rng().gen_range(0.0..0.3);
        Duration::from_millis((capped_delay_ms * (1.0 + jitter)) as u64)
    }
}
