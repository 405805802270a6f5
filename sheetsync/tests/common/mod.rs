#![allow(dead_code)]

use config::shared::{RetryConfig, SyncConfig};
use sheetsync::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use sheetsync::destination::memory::MemoryIssueStore;
use sheetsync::merge::columns;
use sheetsync::runner::SyncRunner;
use sheetsync::source::memory::MemorySheet;
use sheetsync::store::{MemoryStateStore, StateStore};
use sheetsync::types::{SheetRow, SourceId, SyncRun, SyncSource};
use uuid::Uuid;

/// Everything one test needs to drive runs against in-memory collaborators.
pub struct Harness {
    pub source: SyncSource,
    pub store: MemoryStateStore,
    pub sheet: MemorySheet,
    pub issues: MemoryIssueStore,
    pub shutdown_tx: ShutdownTx,
    pub runner: SyncRunner<MemoryStateStore, MemorySheet, MemoryIssueStore>,
}

/// Column layout every test sheet starts from.
pub fn expected_columns() -> Vec<String> {
    vec![
        columns::ISSUE_ID.to_string(),
        columns::URL_ID.to_string(),
        columns::ISSUE_TITLE.to_string(),
        columns::SEVERITY.to_string(),
        columns::DEV_STATUS.to_string(),
        columns::IS_ACTIVE.to_string(),
    ]
}

pub fn test_source() -> SyncSource {
    SyncSource::new(
        SourceId::new(Uuid::new_v4(), "sheet-1"),
        "Audit Sheet",
        expected_columns(),
    )
}

/// Configuration with backoffs small enough for tests to exercise retries
/// quickly.
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        lease_ttl_ms: 60_000,
        row_timeout_ms: 200,
        run_timeout_ms: 10_000,
        retry: RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 5,
            backoff_multiplier: 1.0,
            max_backoff_ms: 20,
        },
    }
}

pub fn harness() -> Harness {
    let config = fast_config();
    let store = MemoryStateStore::new();
    let sheet = MemorySheet::with_columns(expected_columns());
    let issues = MemoryIssueStore::new();
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let runner = SyncRunner::new(
        config,
        store.clone(),
        sheet.clone(),
        issues.clone(),
        shutdown_rx,
    );

    Harness {
        source: test_source(),
        store,
        sheet,
        issues,
        shutdown_tx,
        runner,
    }
}

/// A well-formed audit row.
pub fn audit_row(ordinal: u64, url_id: &str, title: &str, severity: &str) -> SheetRow {
    SheetRow::from_pairs(
        ordinal,
        [
            (columns::URL_ID, url_id),
            (columns::ISSUE_TITLE, title),
            (columns::SEVERITY, severity),
        ],
    )
}

/// Asserts the current-status record and the latest log entry agree with the
/// finalized run.
pub async fn assert_reports_agree(store: &MemoryStateStore, run: &SyncRun) {
    let status = store
        .get_source_status(&run.source_id)
        .await
        .unwrap()
        .expect("current status record must exist after finalize");
    let entries = store.get_log_entries(&run.source_id).await.unwrap();
    let last_entry = entries.last().expect("log entry must exist after finalize");

    assert_eq!(status.run_id, run.id);
    assert_eq!(last_entry.run_id, run.id);
    assert_eq!(status.status, run.status);
    assert_eq!(last_entry.status, run.status);
    assert_eq!(status.counters, run.counters);
    assert_eq!(last_entry.counters, run.counters);
}
