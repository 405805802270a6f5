use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{ErrorKind, SyncResult};
use crate::store::{StateStore, SyncLease};
use crate::sync_error;
use crate::types::{Checkpoint, RowCursor, SourceId, SourceSyncStatus, SyncLogEntry, SyncRun};

/// Stored checkpoint row, mirroring the destination's legacy layout where the
/// cursor is free text.
#[derive(Debug, Clone)]
struct StoredCheckpoint {
    last_synced_row: String,
    updated_at: DateTime<Utc>,
}

/// Inner state of [`MemoryStateStore`].
#[derive(Debug, Default)]
struct Inner {
    /// Cursor text per source. Kept in the legacy text form so the boundary
    /// conversion into [`RowCursor`] is exercised, corruption included.
    checkpoints: HashMap<SourceId, StoredCheckpoint>,
    /// At most one lease per source; expired leases are reclaimed on acquire.
    leases: HashMap<SourceId, SyncLease>,
    /// Persisted run records keyed by run id.
    runs: HashMap<Uuid, SyncRun>,
    /// The single mutable current-status record per source.
    source_status: HashMap<SourceId, SourceSyncStatus>,
    /// Append-only historical log across all sources.
    sync_log: Vec<SyncLogEntry>,
}

/// In-memory storage for sync state.
///
/// [`MemoryStateStore`] implements [`StateStore`] entirely in memory. This is
/// ideal for testing and development; all state is lost on process restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStateStore {
    /// Creates a new empty state store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds raw checkpoint text for a source, bypassing cursor validation.
    ///
    /// Exists so tests and tooling can reproduce checkpoints written by older
    /// components in the legacy free-text form, including corrupted ones.
    pub async fn seed_raw_checkpoint(&self, source_id: &SourceId, raw: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.checkpoints.insert(
            source_id.clone(),
            StoredCheckpoint {
                last_synced_row: raw.into(),
                updated_at: Utc::now(),
            },
        );
    }

    /// Returns all log entries across sources, oldest first.
    pub async fn all_log_entries(&self) -> Vec<SyncLogEntry> {
        self.inner.lock().await.sync_log.clone()
    }
}

impl StateStore for MemoryStateStore {
    async fn acquire_lease(
        &self,
        source_id: &SourceId,
        run_id: Uuid,
        ttl: Duration,
    ) -> SyncResult<SyncLease> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        if let Some(held) = inner.leases.get(source_id) {
            if held.run_id != run_id && !held.is_expired(now) {
                return Err(sync_error!(
                    ErrorKind::ConcurrentRunRejected,
                    "Another run holds the lease for this source",
                    format!(
                        "source {source_id} is leased to run {} until {}",
                        held.run_id, held.expires_at
                    )
                ));
            }
        }

        let lease = SyncLease {
            source_id: source_id.clone(),
            run_id,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
        };
        inner.leases.insert(source_id.clone(), lease.clone());

        Ok(lease)
    }

    async fn renew_lease(&self, lease: &SyncLease, ttl: Duration) -> SyncResult<SyncLease> {
        let mut inner = self.inner.lock().await;

        let held = inner.leases.get_mut(&lease.source_id);
        let Some(held) = held.filter(|held| held.run_id == lease.run_id) else {
            return Err(sync_error!(
                ErrorKind::LeaseExpired,
                "Lease is no longer held by this run",
                format!("source {} lease lapsed or was taken over", lease.source_id)
            ));
        };

        held.expires_at =
            Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());

        Ok(held.clone())
    }

    async fn release_lease(&self, lease: &SyncLease) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        // Only the holder's own lease is removed; a successor's lease on the
        // same source stays untouched.
        if inner
            .leases
            .get(&lease.source_id)
            .is_some_and(|held| held.run_id == lease.run_id)
        {
            inner.leases.remove(&lease.source_id);
        }

        Ok(())
    }

    async fn get_checkpoint(&self, source_id: &SourceId) -> SyncResult<Option<Checkpoint>> {
        let inner = self.inner.lock().await;

        let Some(stored) = inner.checkpoints.get(source_id) else {
            return Ok(None);
        };

        let cursor = RowCursor::parse_stored(&stored.last_synced_row)?;

        Ok(Some(Checkpoint {
            cursor,
            updated_at: stored.updated_at,
        }))
    }

    async fn advance_checkpoint(&self, lease: &SyncLease, ordinal: u64) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        let holds_lease = inner
            .leases
            .get(&lease.source_id)
            .is_some_and(|held| held.run_id == lease.run_id && !held.is_expired(now));
        if !holds_lease {
            return Err(sync_error!(
                ErrorKind::LeaseExpired,
                "Checkpoint advancement requires the source lease",
                format!("run {} no longer holds the lease for {}", lease.run_id, lease.source_id)
            ));
        }

        let current = match inner.checkpoints.get(&lease.source_id) {
            Some(stored) => RowCursor::parse_stored(&stored.last_synced_row)?,
            None => RowCursor::Start,
        };

        if ordinal < current.position() {
            return Err(sync_error!(
                ErrorKind::InvalidState,
                "Checkpoint may not move backwards",
                format!(
                    "source {} is at {current}, refusing to move to row {ordinal}",
                    lease.source_id
                )
            ));
        }

        inner.checkpoints.insert(
            lease.source_id.clone(),
            StoredCheckpoint {
                last_synced_row: RowCursor::At(ordinal).to_stored(),
                updated_at: now,
            },
        );

        Ok(())
    }

    async fn reset_checkpoint(&self, source_id: &SourceId) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.checkpoints.remove(source_id);

        Ok(())
    }

    async fn persist_run(&self, run: &SyncRun) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.runs.insert(run.id, run.clone());

        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> SyncResult<Option<SyncRun>> {
        let inner = self.inner.lock().await;

        Ok(inner.runs.get(&run_id).cloned())
    }

    async fn write_source_status(&self, status: &SourceSyncStatus) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .source_status
            .insert(status.source_id.clone(), status.clone());

        Ok(())
    }

    async fn get_source_status(&self, source_id: &SourceId) -> SyncResult<Option<SourceSyncStatus>> {
        let inner = self.inner.lock().await;

        Ok(inner.source_status.get(source_id).cloned())
    }

    async fn append_log_entry(&self, entry: SyncLogEntry) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.sync_log.push(entry);

        Ok(())
    }

    async fn get_log_entries(&self, source_id: &SourceId) -> SyncResult<Vec<SyncLogEntry>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .sync_log
            .iter()
            .filter(|entry| &entry.source_id == source_id)
            .cloned()
            .collect())
    }
}
