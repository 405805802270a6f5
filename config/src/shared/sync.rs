use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::{RetryConfig, ValidationError};

/// Configuration for the sheet sync engine.
///
/// Contains the lease, timeout, and retry settings applied to every sync run.
/// Sources themselves are configured separately via [`crate::shared::SheetSourceConfig`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// How long a run's exclusive lease on a source remains valid without
    /// renewal, in milliseconds. A crashed holder stops blocking the source
    /// once this expires.
    #[serde(default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: u64,
    /// Per-row application timeout, in milliseconds. A single row exceeding
    /// this is counted as failed; the run continues.
    #[serde(default = "default_row_timeout_ms")]
    pub row_timeout_ms: u64,
    /// Wall-clock ceiling for one run attempt, in milliseconds. An attempt
    /// exceeding this is aborted and eligible for retry from the committed
    /// checkpoint.
    #[serde(default = "default_run_timeout_ms")]
    pub run_timeout_ms: u64,
    /// Retry behavior for transiently failed runs.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Default lease TTL in milliseconds.
    pub const DEFAULT_LEASE_TTL_MS: u64 = 60_000;

    /// Default per-row timeout in milliseconds.
    pub const DEFAULT_ROW_TIMEOUT_MS: u64 = 10_000;

    /// Default per-run timeout in milliseconds.
    pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 600_000;

    /// Validates sync configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lease_ttl_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "lease_ttl_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.row_timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "row_timeout_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.run_timeout_ms < self.row_timeout_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "run_timeout_ms".to_string(),
                constraint: "must be at least `row_timeout_ms`".to_string(),
            });
        }

        self.retry.validate()
    }

    /// Returns the lease TTL as a [`Duration`].
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_millis(self.lease_ttl_ms)
    }

    /// Returns the per-row timeout as a [`Duration`].
    pub fn row_timeout(&self) -> Duration {
        Duration::from_millis(self.row_timeout_ms)
    }

    /// Returns the per-run timeout as a [`Duration`].
    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lease_ttl_ms: default_lease_ttl_ms(),
            row_timeout_ms: default_row_timeout_ms(),
            run_timeout_ms: default_run_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_lease_ttl_ms() -> u64 {
    SyncConfig::DEFAULT_LEASE_TTL_MS
}

fn default_row_timeout_ms() -> u64 {
    SyncConfig::DEFAULT_ROW_TIMEOUT_MS
}

fn default_run_timeout_ms() -> u64 {
    SyncConfig::DEFAULT_RUN_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn rejects_run_timeout_below_row_timeout() {
        let config = SyncConfig {
            row_timeout_ms: 5_000,
            run_timeout_ms: 1_000,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
