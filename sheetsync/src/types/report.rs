use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{
    CheckpointGranularity, RunCounters, RunError, RunErrorType, SourceId, SyncRun, SyncRunStatus,
};

/// The single mutable "what happened most recently" record kept per source.
///
/// Overwritten on every run finalize. Historical questions are answered by
/// [`SyncLogEntry`] instead; the two are written independently from one
/// finalize operation and must agree on terminal counters and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSyncStatus {
    pub source_id: SourceId,
    pub sheet_name: String,
    pub run_id: Uuid,
    pub status: SyncRunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub counters: RunCounters,
    pub error: Option<RunError>,
    pub expected_columns: Vec<String>,
    pub observed_columns: Vec<String>,
    pub structure_match: Option<bool>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub checkpoint_granularity: CheckpointGranularity,
    pub created_by: String,
    pub sync_version: String,
    pub updated_at: DateTime<Utc>,
}

impl SourceSyncStatus {
    /// Snapshots the current status record from a finalized run.
    pub fn from_run(run: &SyncRun) -> Self {
        Self {
            source_id: run.source_id.clone(),
            sheet_name: run.sheet_name.clone(),
            run_id: run.id,
            status: run.status,
            started_at: run.started_at,
            completed_at: run.completed_at,
            duration_ms: run.duration_ms(),
            counters: run.counters,
            error: run.error.clone(),
            expected_columns: run.expected_columns.clone(),
            observed_columns: run.observed_columns.clone(),
            structure_match: run.structure_match,
            retry_count: run.retry_count,
            max_retries: run.max_retries,
            checkpoint_granularity: run.checkpoint_granularity,
            created_by: run.created_by.clone(),
            sync_version: run.sync_version.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// Immutable historical snapshot of one finished run.
///
/// Appended on finalize, never mutated or deleted thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: Uuid,
    pub run_id: Uuid,
    pub source_id: SourceId,
    pub sheet_name: String,
    pub status: SyncRunStatus,
    pub counters: RunCounters,
    pub error_type: Option<RunErrorType>,
    pub error_message: Option<String>,
    /// Column diff persisted for operator diagnosis when a run aborted on a
    /// hard structure mismatch.
    pub structure_mismatch_details: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SyncLogEntry {
    /// Snapshots a log entry from a finalized run.
    pub fn from_run(run: &SyncRun) -> Self {
        let structure_mismatch_details = run.error.as_ref().and_then(|error| {
            (error.error_type == RunErrorType::StructureMismatch)
                .then(|| error.details.clone())
                .flatten()
        });

        Self {
            id: Uuid::new_v4(),
            run_id: run.id,
            source_id: run.source_id.clone(),
            sheet_name: run.sheet_name.clone(),
            status: run.status,
            counters: run.counters,
            error_type: run.error.as_ref().map(|error| error.error_type),
            error_message: run.error.as_ref().map(|error| error.message.clone()),
            structure_mismatch_details,
            started_at: run.started_at,
            completed_at: run.completed_at,
            created_at: Utc::now(),
        }
    }
}
