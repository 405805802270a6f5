mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use common::{assert_reports_agree, audit_row, fast_config, harness, test_source};
use futures::StreamExt;
use sheetsync::concurrency::shutdown::create_shutdown_channel;
use sheetsync::destination::IssueStore;
use sheetsync::destination::memory::MemoryIssueStore;
use sheetsync::error::{ErrorKind, SyncResult};
use sheetsync::runner::SyncRunner;
use sheetsync::source::memory::MemorySheet;
use sheetsync::source::{RowReader, RowStream};
use sheetsync::store::{MemoryStateStore, StateStore};
use sheetsync::sync_error;
use sheetsync::types::{IssueRecord, RowCursor, RunErrorType, SyncRunStatus, SyncSource};
use telemetry::tracing::init_test_tracing;
use tokio::time::sleep;
use uuid::Uuid;

/// Reader that fails `read_rows_since` a fixed number of times before
/// delegating, modeling a briefly unreachable sheet provider.
#[derive(Clone)]
struct FlakyReader {
    sheet: MemorySheet,
    failures_left: Arc<AtomicU32>,
}

impl RowReader for FlakyReader {
    async fn read_columns(&self, source: &SyncSource) -> SyncResult<Vec<String>> {
        self.sheet.read_columns(source).await
    }

    async fn read_rows_since(
        &self,
        source: &SyncSource,
        cursor: RowCursor,
    ) -> SyncResult<RowStream> {
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(sync_error!(
                ErrorKind::SourceUnavailable,
                "Sheet provider unavailable",
                "injected transient failure"
            ));
        }

        self.sheet.read_rows_since(source, cursor).await
    }
}

/// Reader whose stream breaks once after a given ordinal, then recovers on
/// the next read.
#[derive(Clone)]
struct BrokenStreamReader {
    sheet: MemorySheet,
    break_after: u64,
    tripped: Arc<AtomicBool>,
}

impl RowReader for BrokenStreamReader {
    async fn read_columns(&self, source: &SyncSource) -> SyncResult<Vec<String>> {
        self.sheet.read_columns(source).await
    }

    async fn read_rows_since(
        &self,
        source: &SyncSource,
        cursor: RowCursor,
    ) -> SyncResult<RowStream> {
        let rows = self
            .sheet
            .read_rows_since(source, cursor)
            .await?
            .collect::<Vec<_>>()
            .await;

        if self.tripped.swap(true, Ordering::SeqCst) {
            return Ok(futures::stream::iter(rows).boxed());
        }

        let break_after = self.break_after;
        let mut truncated = rows
            .into_iter()
            .filter(|row| {
                row.as_ref()
                    .map(|row| row.ordinal() <= break_after)
                    .unwrap_or(true)
            })
            .collect::<Vec<_>>();
        truncated.push(Err(sync_error!(
            ErrorKind::SourceUnavailable,
            "Sheet provider dropped the connection",
            "injected mid-stream failure"
        )));

        Ok(futures::stream::iter(truncated).boxed())
    }
}

/// Reader that never yields rows past a given ordinal, so a run can be
/// cancelled while intake is pending.
#[derive(Clone)]
struct StallingReader {
    sheet: MemorySheet,
    stall_after: u64,
}

impl RowReader for StallingReader {
    async fn read_columns(&self, source: &SyncSource) -> SyncResult<Vec<String>> {
        self.sheet.read_columns(source).await
    }

    async fn read_rows_since(
        &self,
        source: &SyncSource,
        cursor: RowCursor,
    ) -> SyncResult<RowStream> {
        let rows = self
            .sheet
            .read_rows_since(source, cursor)
            .await?
            .collect::<Vec<_>>()
            .await;

        let stall_after = self.stall_after;
        let head = rows
            .into_iter()
            .filter(|row| {
                row.as_ref()
                    .map(|row| row.ordinal() <= stall_after)
                    .unwrap_or(true)
            })
            .collect::<Vec<_>>();

        Ok(futures::stream::iter(head)
            .chain(futures::stream::pending())
            .boxed())
    }
}

/// Issue store that hangs on inserts of one marked title, so the per-row
/// timeout can be exercised.
#[derive(Clone)]
struct HangingStore {
    inner: MemoryIssueStore,
    hang_on_title: String,
}

impl IssueStore for HangingStore {
    async fn get_by_issue_id(
        &self,
        project_id: Uuid,
        issue_id: &str,
    ) -> SyncResult<Option<IssueRecord>> {
        self.inner.get_by_issue_id(project_id, issue_id).await
    }

    async fn get_by_url_title(
        &self,
        project_id: Uuid,
        url_id: &str,
        issue_title: &str,
    ) -> SyncResult<Option<IssueRecord>> {
        self.inner.get_by_url_title(project_id, url_id, issue_title).await
    }

    async fn insert(&self, record: IssueRecord) -> SyncResult<()> {
        if record.issue_title == self.hang_on_title {
            futures::future::pending::<()>().await;
        }

        self.inner.insert(record).await
    }

    async fn update(&self, record: IssueRecord) -> SyncResult<()> {
        self.inner.update(record).await
    }
}

#[tokio::test]
async fn transient_failure_on_every_attempt_exhausts_the_retry_bound() {
    init_test_tracing();

    let source = test_source();
    let store = MemoryStateStore::new();
    let sheet = MemorySheet::with_columns(common::expected_columns());
    let reader = FlakyReader {
        sheet,
        failures_left: Arc::new(AtomicU32::new(u32::MAX)),
    };
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let runner = SyncRunner::new(
        fast_config(),
        store.clone(),
        reader,
        MemoryIssueStore::new(),
        shutdown_rx,
    );

    let run = runner.run(&source).await.unwrap();

    assert_eq!(run.status, SyncRunStatus::Failed);
    assert_eq!(run.retry_count, run.max_retries);
    assert_eq!(
        run.error.as_ref().unwrap().error_type,
        RunErrorType::SourceUnavailable
    );

    // The persisted run record carries the same bookkeeping.
    let persisted = store.get_run(run.id).await.unwrap().unwrap();
    assert_eq!(persisted.retry_count, run.max_retries);
    assert_eq!(persisted.status, SyncRunStatus::Failed);

    assert_reports_agree(&store, &run).await;
}

#[tokio::test]
async fn retry_resumes_from_the_committed_checkpoint() {
    init_test_tracing();

    let source = test_source();
    let store = MemoryStateStore::new();
    let sheet = MemorySheet::with_columns(common::expected_columns());
    for ordinal in 1..=5 {
        sheet
            .put_row(audit_row(ordinal, "url-1", &format!("Issue {ordinal}"), "2_high"))
            .await;
    }

    let reader = BrokenStreamReader {
        sheet,
        break_after: 2,
        tripped: Arc::new(AtomicBool::new(false)),
    };
    let issues = MemoryIssueStore::new();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let runner = SyncRunner::new(
        fast_config(),
        store.clone(),
        reader,
        issues.clone(),
        shutdown_rx,
    );

    let run = runner.run(&source).await.unwrap();

    assert_eq!(run.status, SyncRunStatus::Succeeded);
    assert_eq!(run.retry_count, 1);
    // Rows 1 and 2 were committed before the failure and are not reprocessed.
    assert_eq!(run.counters.processed, 5);
    assert_eq!(run.counters.inserted, 5);
    assert_eq!(issues.records().await.len(), 5);

    let checkpoint = store.get_checkpoint(&source.id).await.unwrap().unwrap();
    assert_eq!(checkpoint.cursor, RowCursor::At(5));
}

#[tokio::test]
async fn second_run_on_a_leased_source_is_rejected_immediately() {
    init_test_tracing();

    let harness = harness();
    harness.sheet.put_row(audit_row(1, "u1", "Issue 1", "2_high")).await;

    // Another run currently holds the lease.
    let other_lease = harness
        .store
        .acquire_lease(&harness.source.id, Uuid::new_v4(), Duration::from_secs(60))
        .await
        .unwrap();

    let rejection = harness.runner.run(&harness.source).await.unwrap_err();
    assert_eq!(rejection.kind(), ErrorKind::ConcurrentRunRejected);

    // The rejected attempt left no trace: no status record, no log entry.
    assert!(
        harness
            .store
            .get_source_status(&harness.source.id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        harness
            .store
            .get_log_entries(&harness.source.id)
            .await
            .unwrap()
            .is_empty()
    );

    // Once the holder releases, the source syncs normally.
    harness.store.release_lease(&other_lease).await.unwrap();
    let run = harness.runner.run(&harness.source).await.unwrap();
    assert_eq!(run.status, SyncRunStatus::Succeeded);
}

#[tokio::test]
async fn corrupted_checkpoint_fails_the_run_until_reset() {
    init_test_tracing();

    let harness = harness();
    harness.sheet.put_row(audit_row(1, "u1", "Issue 1", "2_high")).await;
    harness
        .store
        .seed_raw_checkpoint(&harness.source.id, "row seven-ish")
        .await;

    let run = harness.runner.run(&harness.source).await.unwrap();

    assert_eq!(run.status, SyncRunStatus::Failed);
    assert_eq!(run.retry_count, 0);
    assert_eq!(
        run.error.as_ref().unwrap().error_type,
        RunErrorType::CheckpointCorruption
    );
    assert!(harness.issues.records().await.is_empty());

    // Recovery is an explicit administrative reset, never an implicit restart.
    harness
        .store
        .reset_checkpoint(&harness.source.id)
        .await
        .unwrap();
    let recovered = harness.runner.run(&harness.source).await.unwrap();
    assert_eq!(recovered.status, SyncRunStatus::Succeeded);
    assert_eq!(recovered.counters.inserted, 1);
}

#[tokio::test]
async fn cancellation_finalizes_committed_progress() {
    init_test_tracing();

    let source = test_source();
    let store = MemoryStateStore::new();
    let sheet = MemorySheet::with_columns(common::expected_columns());
    for ordinal in 1..=4 {
        sheet
            .put_row(audit_row(ordinal, "url-1", &format!("Issue {ordinal}"), "2_high"))
            .await;
    }

    let reader = StallingReader {
        sheet,
        stall_after: 2,
    };
    let issues = MemoryIssueStore::new();
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let runner = Arc::new(SyncRunner::new(
        fast_config(),
        store.clone(),
        reader,
        issues.clone(),
        shutdown_rx,
    ));

    let handle = tokio::spawn({
        let runner = runner.clone();
        let source = source.clone();
        async move { runner.run(&source).await }
    });

    // Wait until the first two rows are committed, then cancel.
    loop {
        let position = store
            .get_checkpoint(&source.id)
            .await
            .unwrap()
            .map(|checkpoint| checkpoint.cursor.position());
        if position == Some(2) {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    shutdown_tx.shutdown();

    let run = handle.await.unwrap().unwrap();

    // Cancellation is not an error: the run reflects committed progress.
    assert_eq!(run.status, SyncRunStatus::Partial);
    assert!(run.error.is_none());
    assert_eq!(run.counters.processed, 2);
    assert_eq!(run.counters.failed, 0);

    let checkpoint = store.get_checkpoint(&source.id).await.unwrap().unwrap();
    assert_eq!(checkpoint.cursor, RowCursor::At(2));

    assert_reports_agree(&store, &run).await;

    // The lease was released; a later run picks up after the checkpoint.
    let records_before = issues.records().await.len();
    assert_eq!(records_before, 2);
}

#[tokio::test]
async fn pathological_row_write_is_bounded_by_the_row_timeout() {
    init_test_tracing();

    let source = test_source();
    let store = MemoryStateStore::new();
    let sheet = MemorySheet::with_columns(common::expected_columns());
    sheet.put_row(audit_row(1, "u1", "Issue 1", "2_high")).await;
    sheet.put_row(audit_row(2, "u1", "Hang", "2_high")).await;
    sheet.put_row(audit_row(3, "u1", "Issue 3", "2_high")).await;

    let issues = MemoryIssueStore::new();
    let destination = HangingStore {
        inner: issues.clone(),
        hang_on_title: "Hang".to_string(),
    };
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let runner = SyncRunner::new(fast_config(), store.clone(), sheet, destination, shutdown_rx);

    let run = runner.run(&source).await.unwrap();

    assert_eq!(run.status, SyncRunStatus::Partial);
    assert_eq!(run.counters.processed, 3);
    assert_eq!(run.counters.inserted, 2);
    assert_eq!(run.counters.failed, 1);
    assert_eq!(run.row_failures[0].ordinal, 2);
    assert!(run.row_failures[0].reason.contains("exceeded"));

    // The timed-out row does not stall the checkpoint.
    let checkpoint = store.get_checkpoint(&source.id).await.unwrap().unwrap();
    assert_eq!(checkpoint.cursor, RowCursor::At(3));
}
