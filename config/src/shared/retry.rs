use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Retry behavior for runs that fail for a transient reason.
///
/// Backoff between attempts is exponential: `initial_backoff_ms *
/// backoff_multiplier^attempt`, capped at `max_backoff_ms`, with jitter added
/// by the retry coordinator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of automatic re-attempts for one run.
    ///
    /// Zero disables automatic retries entirely; the run fails on the first
    /// transient error.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first re-attempt, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the delay on every further re-attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound for a single backoff delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl RetryConfig {
    /// Default number of automatic re-attempts.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Default first backoff delay in milliseconds.
    pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;

    /// Default backoff multiplier.
    pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Default backoff cap in milliseconds.
    pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

    /// Validates retry configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.backoff_multiplier < 1.0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "retry.backoff_multiplier".to_string(),
                constraint: "must be at least 1.0".to_string(),
            });
        }

        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "retry.initial_backoff_ms".to_string(),
                constraint: "must not exceed `retry.max_backoff_ms`".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    RetryConfig::DEFAULT_MAX_RETRIES
}

fn default_initial_backoff_ms() -> u64 {
    RetryConfig::DEFAULT_INITIAL_BACKOFF_MS
}

fn default_backoff_multiplier() -> f64 {
    RetryConfig::DEFAULT_BACKOFF_MULTIPLIER
}

fn default_max_backoff_ms() -> u64 {
    RetryConfig::DEFAULT_MAX_BACKOFF_MS
}
