//! Run orchestration: lease, validate, ingest, checkpoint, finalize.
//!
//! A [`SyncRunner`] executes runs for sync sources against a state store, a
//! row reader, and an issue store. Runs on different sources may execute
//! concurrently; each source is single-writer via its exclusive lease. Rows
//! are applied strictly in source order, and the checkpoint advances only
//! after a row's write is durably committed, so a crash between the write and
//! the checkpoint replays at most one row — which the upsert engine absorbs
//! idempotently.

use std::time::Instant;

use config::shared::SyncConfig;
use futures::StreamExt;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::concurrency::shutdown::ShutdownRx;
use crate::destination::IssueStore;
use crate::error::{ErrorKind, SyncResult};
use crate::merge::{RowApplication, UpsertEngine};
use crate::reporter::finalize_run;
use crate::retries::RetryCoordinator;
use crate::source::RowReader;
use crate::store::{StateStore, SyncLease};
use crate::structure::diff_columns;
use crate::{bail, sync_error};
use crate::types::{RowCursor, RowFailure, RunError, SyncRun, SyncRunStatus, SyncSource};

/// How one attempt's row intake ended.
#[derive(Debug, Clone, Copy)]
struct AttemptEnd {
    /// `true` when the row stream was fully consumed; `false` when intake
    /// halted early on cancellation.
    exhausted: bool,
}

/// Executes sync runs for sources.
#[derive(Debug)]
pub struct SyncRunner<S, R, D> {
    config: SyncConfig,
    state_store: S,
    reader: R,
    engine: UpsertEngine<D>,
    retries: RetryCoordinator,
    shutdown_rx: ShutdownRx,
}

impl<S, R, D> SyncRunner<S, R, D>
where
    S: StateStore + Send + Sync,
    R: RowReader + Send + Sync,
    D: IssueStore + Send + Sync,
{
    /// Creates a runner over the given collaborators.
    pub fn new(
        config: SyncConfig,
        state_store: S,
        reader: R,
        destination: D,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        let retries = RetryCoordinator::new(config.retry.clone());

        Self {
            config,
            state_store,
            reader,
            engine: UpsertEngine::new(destination),
            retries,
            shutdown_rx,
        }
    }

    /// Executes one sync run for `source` and returns the finalized run.
    ///
    /// Fails fast with [`ErrorKind::ConcurrentRunRejected`] when another run
    /// holds the source's lease; in that case no run record is created. Any
    /// failure after the lease is acquired is captured on the finalized run
    /// instead of being returned as an error.
    pub async fn run(&self, source: &SyncSource) -> SyncResult<SyncRun> {
        let run_id = Uuid::new_v4();
        let lease = self
            .state_store
            .acquire_lease(&source.id, run_id, self.config.lease_ttl())
            .await?;

        let mut run = SyncRun::begin(run_id, source, self.config.retry.max_retries);
        if let Err(persist_error) = self.state_store.persist_run(&run).await {
            let _ = self.state_store.release_lease(&lease).await;
            return Err(persist_error);
        }

        info!(
            "starting sync run {} for source {} ({})",
            run.id, source.id, source.sheet_name
        );

        let outcome = self.run_attempts(source, &lease, &mut run).await;

        let finalize_result = match outcome {
            Ok(end) => {
                let status = run.counters.terminal_status(end.exhausted);
                finalize_run(&self.state_store, &mut run, status, None).await
            }
            Err(run_failure) => {
                error!(
                    "sync run {} for source {} failed: {}",
                    run.id, source.id, run_failure
                );

                let run_error = RunError::from_sync_error(&run_failure);
                finalize_run(
                    &self.state_store,
                    &mut run,
                    SyncRunStatus::Failed,
                    Some(run_error),
                )
                .await
            }
        };

        if let Err(release_error) = self.state_store.release_lease(&lease).await {
            error!(
                "failed to release lease for source {}: {}",
                source.id, release_error
            );
        }

        finalize_result?;

        Ok(run)
    }

    /// Runs attempts until one finishes, retries are exhausted, or a
    /// non-transient error surfaces.
    async fn run_attempts(
        &self,
        source: &SyncSource,
        lease: &SyncLease,
        run: &mut SyncRun,
    ) -> SyncResult<AttemptEnd> {
        loop {
            let attempt = match timeout(self.config.run_timeout(), self.attempt(source, lease, run))
                .await
            {
                Ok(attempt) => attempt,
                Err(_) => Err(sync_error!(
                    ErrorKind::Timeout,
                    "Sync run exceeded its wall-clock ceiling",
                    format!("attempt did not finish within {} ms", self.config.run_timeout_ms)
                )),
            };

            let attempt_error = match attempt {
                Ok(end) => return Ok(end),
                Err(attempt_error) => attempt_error,
            };

            if !self
                .retries
                .should_retry(&attempt_error, run.retry_count, run.max_retries)
            {
                return Err(attempt_error);
            }

            // The incremented retry count is durable before the re-attempt
            // starts, so a crash mid-retry cannot exceed the bound undetected.
            run.retry_count += 1;
            self.state_store.persist_run(run).await?;

            let delay = self.retries.delay_for(run.retry_count);
            warn!(
                "sync run {} for source {} hit a transient error, retrying in {:?} (attempt {}/{}): {}",
                run.id, source.id, delay, run.retry_count, run.max_retries, attempt_error
            );

            let mut shutdown_rx = self.shutdown_rx.clone();
            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown_rx.shutting_down() => {
                    info!(
                        "cancellation requested during backoff, abandoning retries for source {}",
                        source.id
                    );
                    return Err(attempt_error);
                }
            }

            self.state_store
                .renew_lease(lease, self.config.lease_ttl())
                .await?;
        }
    }

    /// One attempt: structure validation, then row intake from the committed
    /// checkpoint onward.
    async fn attempt(
        &self,
        source: &SyncSource,
        lease: &SyncLease,
        run: &mut SyncRun,
    ) -> SyncResult<AttemptEnd> {
        let observed_columns = self.reader.read_columns(source).await?;
        let diff = diff_columns(&source.expected_columns, &observed_columns);
        run.observed_columns = observed_columns;
        run.structure_match = Some(diff.is_match());

        if diff.is_hard_mismatch() {
            warn!(
                "source {} is missing expected columns {:?}, aborting before any write",
                source.id, diff.removed
            );
            bail!(
                ErrorKind::StructureMismatch,
                "Sheet structure drifted from the expected layout",
                diff.to_details()
            );
        }

        if !diff.is_match() {
            debug!(
                "source {} has non-blocking column drift (added {:?}, reordered {:?})",
                source.id, diff.added, diff.reordered
            );
        }

        let cursor = self
            .state_store
            .get_checkpoint(&source.id)
            .await?
            .map(|checkpoint| checkpoint.cursor)
            .unwrap_or(RowCursor::Start);

        info!("sync run {} resuming source {} from {}", run.id, source.id, cursor);

        let mut rows = self.reader.read_rows_since(source, cursor).await?;
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut last_renewal = Instant::now();

        loop {
            let next = tokio::select! {
                next = rows.next() => next,
                _ = shutdown_rx.shutting_down() => {
                    info!(
                        "cancellation requested, halting row intake for source {}",
                        source.id
                    );
                    return Ok(AttemptEnd { exhausted: false });
                }
            };

            let Some(row) = next else {
                break;
            };
            let row = row?;

            // Keep the lease alive across long row loops; checkpoint
            // advancement is refused once it lapses.
            if last_renewal.elapsed() >= self.config.lease_ttl() / 2 {
                self.state_store
                    .renew_lease(lease, self.config.lease_ttl())
                    .await?;
                last_renewal = Instant::now();
            }

            let application = match timeout(
                self.config.row_timeout(),
                self.engine.apply_row(source, run, &row),
            )
            .await
            {
                Ok(application) => application?,
                Err(_) => RowApplication::Failed(RowFailure {
                    ordinal: row.ordinal(),
                    column: None,
                    reason: format!(
                        "row application exceeded {} ms",
                        self.config.row_timeout_ms
                    ),
                }),
            };

            // The checkpoint also advances past failed and skipped rows:
            // their outcome is recorded on the run and replaying them would
            // not change it.
            self.state_store
                .advance_checkpoint(lease, row.ordinal())
                .await?;

            if let RowApplication::Failed(failure) = &application {
                warn!(
                    "row {} of source {} failed: {}",
                    row.ordinal(),
                    source.id,
                    failure.reason
                );
                run.push_row_failure(failure.clone());
            }

            run.record_row(application.outcome());
        }

        Ok(AttemptEnd { exhausted: true })
    }
}
