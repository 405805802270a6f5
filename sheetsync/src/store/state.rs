use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncResult;
use crate::types::{Checkpoint, SourceId, SourceSyncStatus, SyncLogEntry, SyncRun};

/// A time-bounded exclusive claim on a sync source.
///
/// The lease, not incidental locking, is the sole mechanism preventing
/// concurrent mutation of a source's checkpoint and status: at most one
/// unexpired lease exists per source, and checkpoint advancement is gated on
/// holding it. The bounded expiry guarantees a crashed holder cannot
/// permanently block the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLease {
    /// The leased source.
    pub source_id: SourceId,
    /// The run holding the lease.
    pub run_id: Uuid,
    /// When the claim lapses unless renewed.
    pub expires_at: DateTime<Utc>,
}

impl SyncLease {
    /// Returns `true` once the claim has lapsed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Trait for storing checkpoints, leases, and run bookkeeping.
///
/// [`StateStore`] implementations own all durable sync state apart from the
/// issue records themselves. Implementations must ensure thread-safety and
/// handle concurrent access across sources; per-source exclusivity is
/// provided by the lease operations.
pub trait StateStore {
    /// Claims the exclusive lease on `source_id` for `run_id`.
    ///
    /// Fails with [`crate::error::ErrorKind::ConcurrentRunRejected`] while a
    /// different run holds an unexpired lease. An expired lease is
    /// reclaimable. Re-acquiring an own lease renews it.
    fn acquire_lease(
        &self,
        source_id: &SourceId,
        run_id: Uuid,
        ttl: Duration,
    ) -> impl Future<Output = SyncResult<SyncLease>> + Send;

    /// Extends the expiry of a held lease.
    ///
    /// Fails when the lease is no longer held by `lease.run_id`.
    fn renew_lease(
        &self,
        lease: &SyncLease,
        ttl: Duration,
    ) -> impl Future<Output = SyncResult<SyncLease>> + Send;

    /// Releases a held lease. Releasing a lease that already lapsed or was
    /// taken over is a no-op.
    fn release_lease(&self, lease: &SyncLease) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns the source's checkpoint, or `None` when no row was ever
    /// applied.
    ///
    /// An unreadable stored checkpoint surfaces as
    /// [`crate::error::ErrorKind::CheckpointCorruption`]; it is never
    /// silently treated as "start".
    fn get_checkpoint(
        &self,
        source_id: &SourceId,
    ) -> impl Future<Output = SyncResult<Option<Checkpoint>>> + Send;

    /// Advances the checkpoint of the leased source to `ordinal`.
    ///
    /// Only the lease holder may advance, and the cursor is monotonic
    /// non-decreasing: moving backwards fails, advancing to the current
    /// position is a no-op. Called only after the corresponding row write is
    /// durably committed.
    fn advance_checkpoint(
        &self,
        lease: &SyncLease,
        ordinal: u64,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Administrative reset: deletes the source's checkpoint so the next run
    /// starts from the beginning. This is the only sanctioned way to move a
    /// cursor backwards or to recover from a corrupted checkpoint.
    fn reset_checkpoint(&self, source_id: &SourceId)
    -> impl Future<Output = SyncResult<()>> + Send;

    /// Creates or overwrites the persisted run record.
    ///
    /// Called at run start, before every re-attempt (so `retry_count` is
    /// durable ahead of the attempt), and at finalize.
    fn persist_run(&self, run: &SyncRun) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns a persisted run by id.
    fn get_run(&self, run_id: Uuid) -> impl Future<Output = SyncResult<Option<SyncRun>>> + Send;

    /// Overwrites the single current-status record of the status' source.
    fn write_source_status(
        &self,
        status: &SourceSyncStatus,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns the current-status record for a source, if any run finished.
    fn get_source_status(
        &self,
        source_id: &SourceId,
    ) -> impl Future<Output = SyncResult<Option<SourceSyncStatus>>> + Send;

    /// Appends one immutable entry to the historical log.
    fn append_log_entry(
        &self,
        entry: SyncLogEntry,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns the historical log entries for a source, oldest first.
    fn get_log_entries(
        &self,
        source_id: &SourceId,
    ) -> impl Future<Output = SyncResult<Vec<SyncLogEntry>>> + Send;
}
