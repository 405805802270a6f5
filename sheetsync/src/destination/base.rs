use std::future::Future;

use uuid::Uuid;

use crate::error::SyncResult;
use crate::types::IssueRecord;

/// Trait for the storage that holds normalized issue records.
///
/// [`IssueStore`] exposes the two natural-key lookups plus insert and update
/// primitives; the merge decision itself belongs exclusively to the upsert
/// engine, which composes these into an idempotent per-row upsert. The sync
/// system may replay a row after a crash, so implementations must tolerate
/// an update that writes back an identical record.
pub trait IssueStore {
    /// Looks up a record by the primary natural key `(project_id, issue_id)`.
    fn get_by_issue_id(
        &self,
        project_id: Uuid,
        issue_id: &str,
    ) -> impl Future<Output = SyncResult<Option<IssueRecord>>> + Send;

    /// Looks up a record by the secondary natural key
    /// `(project_id, url_id, issue_title)`.
    fn get_by_url_title(
        &self,
        project_id: Uuid,
        url_id: &str,
        issue_title: &str,
    ) -> impl Future<Output = SyncResult<Option<IssueRecord>>> + Send;

    /// Inserts a new record.
    fn insert(&self, record: IssueRecord) -> impl Future<Output = SyncResult<()>> + Send;

    /// Replaces the stored record with the same surrogate id.
    fn update(&self, record: IssueRecord) -> impl Future<Output = SyncResult<()>> + Send;
}
