//! Run finalization: current status and historical log.
//!
//! Finalizing a run issues two independent writes from one operation: the
//! source's single mutable current-status record is overwritten, and one
//! immutable entry is appended to the historical log. The two answer
//! different questions ("what happened most recently" vs "what happened over
//! time") and are deliberately separate structs and separate writes, checked
//! for agreement after every finalize.

use tracing::info;

use crate::error::{ErrorKind, SyncResult};
use crate::store::StateStore;
use crate::sync_error;
use crate::types::{RunError, SourceSyncStatus, SyncLogEntry, SyncRun, SyncRunStatus};

/// Finalizes `run` into a terminal status and publishes both reporting
/// records.
///
/// Every run passes through here exactly once, whatever its outcome; the
/// invariant check below guarantees the status record and the just-appended
/// log entry report identical terminal counters and status.
pub async fn finalize_run<S>(
    store: &S,
    run: &mut SyncRun,
    status: SyncRunStatus,
    error: Option<RunError>,
) -> SyncResult<()>
where
    S: StateStore + Send + Sync,
{
    run.complete(status, error);
    store.persist_run(run).await?;

    let current_status = SourceSyncStatus::from_run(run);
    store.write_source_status(&current_status).await?;

    let log_entry = SyncLogEntry::from_run(run);
    store.append_log_entry(log_entry).await?;

    verify_reports_agree(store, run).await?;

    info!(
        "finalized run {} for source {} as {} (processed {}, inserted {}, updated {}, skipped {}, failed {})",
        run.id,
        run.source_id,
        run.status,
        run.counters.processed,
        run.counters.inserted,
        run.counters.updated,
        run.counters.skipped,
        run.counters.failed,
    );

    Ok(())
}

/// Re-reads both reporting records and checks they describe the same run
/// identically.
async fn verify_reports_agree<S>(store: &S, run: &SyncRun) -> SyncResult<()>
where
    S: StateStore + Send + Sync,
{
    let current = store.get_source_status(&run.source_id).await?;
    let last_entry = store
        .get_log_entries(&run.source_id)
        .await?
        .into_iter()
        .last();

    let agree = match (&current, &last_entry) {
        (Some(current), Some(entry)) => {
            current.run_id == run.id
                && entry.run_id == run.id
                && current.status == entry.status
                && current.counters == entry.counters
        }
        _ => false,
    };

    if !agree {
        return Err(sync_error!(
            ErrorKind::InvalidState,
            "Status record and log entry disagree after finalize",
            format!(
                "run {} for source {}: status record {current:?}, log entry {last_entry:?}",
                run.id, run.source_id
            )
        ));
    }

    Ok(())
}
