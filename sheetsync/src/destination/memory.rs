use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::destination::IssueStore;
use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;
use crate::types::IssueRecord;

/// In-memory issue store for testing and development purposes.
///
/// [`MemoryIssueStore`] keeps all records in memory and exposes them for
/// inspection after a run. Lookups are linear scans; the store exists for
/// test-sized data sets, not production volumes.
#[derive(Debug, Clone, Default)]
pub struct MemoryIssueStore {
    records: Arc<Mutex<Vec<IssueRecord>>>,
}

impl MemoryIssueStore {
    /// Creates a new empty issue store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all stored records.
    pub async fn records(&self) -> Vec<IssueRecord> {
        self.records.lock().await.clone()
    }

    /// Replaces a stored record directly, bypassing the merge engine.
    ///
    /// Lets tests model downstream workflow edits (a developer updating a
    /// status in the admin dashboard) between sync runs.
    pub async fn put(&self, record: IssueRecord) {
        let mut records = self.records.lock().await;

        if let Some(existing) = records.iter_mut().find(|existing| existing.id == record.id) {
            *existing = record;
        } else {
            records.push(record);
        }
    }
}

impl IssueStore for MemoryIssueStore {
    async fn get_by_issue_id(
        &self,
        project_id: Uuid,
        issue_id: &str,
    ) -> SyncResult<Option<IssueRecord>> {
        let records = self.records.lock().await;

        Ok(records
            .iter()
            .find(|record| {
                record.project_id == project_id && record.issue_id.as_deref() == Some(issue_id)
            })
            .cloned())
    }

    async fn get_by_url_title(
        &self,
        project_id: Uuid,
        url_id: &str,
        issue_title: &str,
    ) -> SyncResult<Option<IssueRecord>> {
        let records = self.records.lock().await;

        Ok(records
            .iter()
            .find(|record| {
                record.project_id == project_id
                    && record.url_id == url_id
                    && record.issue_title == issue_title
            })
            .cloned())
    }

    async fn insert(&self, record: IssueRecord) -> SyncResult<()> {
        let mut records = self.records.lock().await;
        records.push(record);

        Ok(())
    }

    async fn update(&self, record: IssueRecord) -> SyncResult<()> {
        let mut records = self.records.lock().await;

        let Some(existing) = records.iter_mut().find(|existing| existing.id == record.id) else {
            return Err(sync_error!(
                ErrorKind::InvalidState,
                "Cannot update a record that does not exist",
                format!("no stored issue record with id {}", record.id)
            ));
        };

        *existing = record;

        Ok(())
    }
}
