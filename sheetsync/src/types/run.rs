use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorKind, SyncError};
use crate::types::{SourceId, SyncSource};

/// Tag recorded as the author of engine-written status records.
pub const CREATED_BY: &str = "sync-engine";

/// Version tag recorded on runs so operators can correlate behavior changes
/// with deployments.
pub const SYNC_VERSION: &str = "2.0";

/// Maximum number of row-failure details retained on one run.
///
/// Counters keep the full totals; details beyond the cap are dropped to keep
/// run records small when a sheet is pervasively broken.
pub const MAX_ROW_FAILURES: usize = 50;

/// Lifecycle status of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    /// The run is executing.
    Running,
    /// Every processed row succeeded and the source was fully consumed.
    Succeeded,
    /// Some rows failed, or the run was halted before consuming the source.
    Partial,
    /// Every processed row failed, or the run aborted before any write.
    Failed,
}

impl SyncRunStatus {
    /// Returns `true` for statuses a run can finalize into.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncRunStatus::Running)
    }

    pub fn as_static_str(&self) -> &'static str {
        match self {
            SyncRunStatus::Running => "running",
            SyncRunStatus::Succeeded => "succeeded",
            SyncRunStatus::Partial => "partial",
            SyncRunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_static_str())
    }
}

/// Classification of one processed row. Each row yields exactly one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcome {
    /// A new record was created.
    Inserted,
    /// An existing record was changed.
    Updated,
    /// The row required no change, or was flagged inactive/duplicate.
    Skipped,
    /// The row failed local validation or timed out.
    Failed,
}

/// Row classification counters accumulated over a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunCounters {
    pub processed: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl RunCounters {
    /// Records one row outcome.
    pub fn record(&mut self, outcome: RowOutcome) {
        self.processed += 1;
        match outcome {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Skipped => self.skipped += 1,
            RowOutcome::Failed => self.failed += 1,
        }
    }

    /// Derives the terminal status for a run that finished row intake.
    ///
    /// `exhausted` is `false` when intake halted early (cancellation), in
    /// which case the run is at best partial even without row failures.
    pub fn terminal_status(&self, exhausted: bool) -> SyncRunStatus {
        if !exhausted {
            return SyncRunStatus::Partial;
        }

        if self.failed == 0 {
            SyncRunStatus::Succeeded
        } else if self.failed == self.processed {
            SyncRunStatus::Failed
        } else {
            SyncRunStatus::Partial
        }
    }
}

/// Checkpoint advancement granularity, recorded on every run so operators
/// know the maximum at-least-once replay window after a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointGranularity {
    /// The checkpoint advances after every committed row; at most one row is
    /// replayed after a crash.
    PerRow,
    /// The checkpoint advances after each batch of rows.
    PerBatch,
}

/// Error classification persisted on finished runs and log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorType {
    StructureMismatch,
    TransientStorage,
    SourceUnavailable,
    Timeout,
    CheckpointCorruption,
    ConcurrentRun,
    Unknown,
}

impl From<ErrorKind> for RunErrorType {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::StructureMismatch => RunErrorType::StructureMismatch,
            ErrorKind::StorageUnavailable | ErrorKind::StorageQueryFailed => {
                RunErrorType::TransientStorage
            }
            ErrorKind::SourceUnavailable | ErrorKind::SourceReadFailed => {
                RunErrorType::SourceUnavailable
            }
            ErrorKind::Timeout => RunErrorType::Timeout,
            ErrorKind::CheckpointCorruption => RunErrorType::CheckpointCorruption,
            // A lapsed lease means another run took the source over.
            ErrorKind::ConcurrentRunRejected | ErrorKind::LeaseExpired => {
                RunErrorType::ConcurrentRun
            }
            _ => RunErrorType::Unknown,
        }
    }
}

/// Terminal error information attached to a run that did not succeed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub error_type: RunErrorType,
    pub message: String,
    /// Structured diagnosis, e.g. the column diff of a structure mismatch.
    pub details: Option<serde_json::Value>,
}

impl RunError {
    /// Builds the persisted error record from an engine error.
    ///
    /// The detail string is kept as structured JSON when it parses as such,
    /// so structure diffs survive into operator tooling intact.
    pub fn from_sync_error(error: &SyncError) -> Self {
        let details = error.detail().map(|detail| {
            serde_json::from_str(detail)
                .unwrap_or_else(|_| serde_json::Value::String(detail.to_string()))
        });

        Self {
            error_type: error.kind().into(),
            message: error.description().to_string(),
            details,
        }
    }
}

/// Detail of one row that failed local validation or timed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    /// 1-based ordinal of the offending row.
    pub ordinal: u64,
    /// Offending column, when one can be named.
    pub column: Option<String>,
    /// Human-readable reason, kept precise enough for manual correction.
    pub reason: String,
}

/// One execution instance of a source sync.
///
/// Created in [`SyncRunStatus::Running`] state, mutated incrementally as rows
/// are processed, and finalized exactly once into a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub source_id: SourceId,
    pub sheet_name: String,
    pub status: SyncRunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub counters: RunCounters,
    /// Number of re-attempts performed so far; incremented and persisted
    /// before each re-attempt so a crash mid-retry cannot exceed the bound
    /// undetected.
    pub retry_count: u32,
    pub max_retries: u32,
    /// Whether the observed columns matched the expected layout exactly.
    /// `None` until structure validation ran.
    pub structure_match: Option<bool>,
    pub expected_columns: Vec<String>,
    pub observed_columns: Vec<String>,
    pub checkpoint_granularity: CheckpointGranularity,
    /// Details for failed rows, capped at [`MAX_ROW_FAILURES`].
    pub row_failures: Vec<RowFailure>,
    pub error: Option<RunError>,
    pub created_by: String,
    pub sync_version: String,
}

impl SyncRun {
    /// Creates a new running sync run for `source`.
    pub fn begin(id: Uuid, source: &SyncSource, max_retries: u32) -> Self {
        Self {
            id,
            source_id: source.id.clone(),
            sheet_name: source.sheet_name.clone(),
            status: SyncRunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            counters: RunCounters::default(),
            retry_count: 0,
            max_retries,
            structure_match: None,
            expected_columns: source.expected_columns.clone(),
            observed_columns: Vec::new(),
            checkpoint_granularity: CheckpointGranularity::PerRow,
            row_failures: Vec::new(),
            error: None,
            created_by: CREATED_BY.to_string(),
            sync_version: SYNC_VERSION.to_string(),
        }
    }

    /// Records one row outcome on the run counters.
    pub fn record_row(&mut self, outcome: RowOutcome) {
        self.counters.record(outcome);
    }

    /// Retains a row-failure detail, dropping it once the cap is reached.
    pub fn push_row_failure(&mut self, failure: RowFailure) {
        if self.row_failures.len() < MAX_ROW_FAILURES {
            self.row_failures.push(failure);
        }
    }

    /// Finalizes the run into a terminal status.
    ///
    /// Must be called exactly once per run; callers go through the reporter,
    /// which also emits the status record and log entry.
    pub fn complete(&mut self, status: SyncRunStatus, error: Option<RunError>) {
        debug_assert!(status.is_terminal());
        debug_assert!(self.completed_at.is_none());

        self.status = status;
        self.completed_at = Some(Utc::now());
        self.error = error;
    }

    /// Wall-clock duration of the run, once finished.
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|completed| (completed - self.started_at).num_milliseconds())
    }
}
