//! Upsert/dedup engine: maps each sheet row onto a normalized issue record.
//!
//! Every row yields exactly one classification. Parsing failures are
//! row-scoped and never abort the run; rows flagged inactive or duplicate in
//! the sheet are skipped; everything else resolves through the natural keys
//! and merges field groups: source-owned fields are overwritten from the
//! sheet, workflow-owned fields survive untouched unless the sheet supplies
//! an explicitly non-empty value. A merge that changes nothing issues no
//! write and classifies as skipped, which is what makes row replay after a
//! crash idempotent.

use tracing::debug;
use uuid::Uuid;

use crate::destination::IssueStore;
use crate::error::SyncResult;
use crate::types::{
    DevStatus, IssueRecord, IssueType, QaStatus, RowFailure, RowOutcome, Severity, SheetRow,
    SourceOwnedFields, SyncRun, SyncSource, WorkflowOwnedFields,
};

/// Canonical column headers of synchronized audit sheets.
pub mod columns {
    pub const ISSUE_ID: &str = "Issue ID";
    pub const URL_ID: &str = "URL ID";
    pub const ISSUE_TITLE: &str = "Issue Title";
    pub const DESCRIPTION: &str = "Description";
    pub const ISSUE_TYPE: &str = "Issue Type";
    pub const SEVERITY: &str = "Severity";
    pub const WCAG_CRITERIA: &str = "WCAG Criteria";
    pub const TESTING_MONTH: &str = "Testing Month";
    pub const TESTING_YEAR: &str = "Testing Year";
    pub const TESTING_ENVIRONMENT: &str = "Testing Environment";
    pub const BROWSER: &str = "Browser";
    pub const OPERATING_SYSTEM: &str = "Operating System";
    pub const ASSISTIVE_TECHNOLOGY: &str = "Assistive Technology";
    pub const EXPECTED_RESULT: &str = "Expected Result";
    pub const ACTUAL_RESULT: &str = "Actual Result";
    pub const SCREENCAST_URL: &str = "Screencast URL";
    pub const DEV_STATUS: &str = "Dev Status";
    pub const DEV_COMMENTS: &str = "Dev Comments";
    pub const QA_STATUS: &str = "QA Status";
    pub const QA_COMMENTS: &str = "QA Comments";
    pub const IS_ACTIVE: &str = "Is Active";
    pub const IS_DUPLICATE: &str = "Is Duplicate";
}

/// Result of applying one row, carrying failure detail when the row was bad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowApplication {
    Inserted,
    Updated,
    Skipped,
    Failed(RowFailure),
}

impl RowApplication {
    /// Returns the counter classification for this application.
    pub fn outcome(&self) -> RowOutcome {
        match self {
            RowApplication::Inserted => RowOutcome::Inserted,
            RowApplication::Updated => RowOutcome::Updated,
            RowApplication::Skipped => RowOutcome::Skipped,
            RowApplication::Failed(_) => RowOutcome::Failed,
        }
    }
}

/// Row-scoped validation failure, pointing at the offending column.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RowParseError {
    column: &'static str,
    reason: String,
}

impl RowParseError {
    fn missing(column: &'static str) -> Self {
        Self {
            column,
            reason: format!("required column `{column}` has no value"),
        }
    }

    fn malformed(column: &'static str, raw: &str) -> Self {
        Self {
            column,
            reason: format!("`{raw}` is not a valid value for column `{column}`"),
        }
    }

    fn into_failure(self, ordinal: u64) -> RowFailure {
        RowFailure {
            ordinal,
            column: Some(self.column.to_string()),
            reason: self.reason,
        }
    }
}

/// A validated row, ready to be resolved against the issue store.
#[derive(Debug, Clone)]
struct RowDraft {
    ordinal: u64,
    issue_id: Option<String>,
    url_id: String,
    issue_title: String,
    description: Option<String>,
    issue_type: IssueType,
    severity: Severity,
    failed_wcag_criteria: Vec<String>,
    testing_month: Option<String>,
    testing_year: Option<i32>,
    testing_environment: Option<String>,
    browser: Option<String>,
    operating_system: Option<String>,
    assistive_technology: Option<String>,
    expected_result: Option<String>,
    actual_result: Option<String>,
    screencast_url: Option<String>,
    dev_status: Option<DevStatus>,
    dev_comments: Option<String>,
    qa_status: Option<QaStatus>,
    qa_comments: Option<String>,
}

/// Outcome of parsing one raw row.
#[derive(Debug, Clone)]
enum ParsedRow {
    /// The sheet flags this row as not to be ingested.
    Skip,
    /// The row is valid and carries a draft.
    Draft(Box<RowDraft>),
}

/// Truthy sheet cell values, as hand-entered flags appear in exports.
fn is_truthy(raw: &str) -> bool {
    matches!(raw.to_lowercase().as_str(), "true" | "yes" | "y" | "1")
}

fn is_falsy(raw: &str) -> bool {
    matches!(raw.to_lowercase().as_str(), "false" | "no" | "n" | "0")
}

fn parse_row(row: &SheetRow) -> Result<ParsedRow, RowParseError> {
    if row.get(columns::IS_ACTIVE).is_some_and(is_falsy)
        || row.get(columns::IS_DUPLICATE).is_some_and(is_truthy)
    {
        return Ok(ParsedRow::Skip);
    }

    let issue_title = row
        .get(columns::ISSUE_TITLE)
        .ok_or_else(|| RowParseError::missing(columns::ISSUE_TITLE))?
        .to_string();
    let url_id = row
        .get(columns::URL_ID)
        .ok_or_else(|| RowParseError::missing(columns::URL_ID))?
        .to_string();

    let severity_raw = row
        .get(columns::SEVERITY)
        .ok_or_else(|| RowParseError::missing(columns::SEVERITY))?;
    let severity = Severity::parse(severity_raw)
        .ok_or_else(|| RowParseError::malformed(columns::SEVERITY, severity_raw))?;

    let testing_year = match row.get(columns::TESTING_YEAR) {
        Some(raw) => Some(
            raw.parse::<i32>()
                .map_err(|_| RowParseError::malformed(columns::TESTING_YEAR, raw))?,
        ),
        None => None,
    };

    let dev_status = match row.get(columns::DEV_STATUS) {
        Some(raw) => Some(
            DevStatus::parse(raw)
                .ok_or_else(|| RowParseError::malformed(columns::DEV_STATUS, raw))?,
        ),
        None => None,
    };
    let qa_status = match row.get(columns::QA_STATUS) {
        Some(raw) => Some(
            QaStatus::parse(raw).ok_or_else(|| RowParseError::malformed(columns::QA_STATUS, raw))?,
        ),
        None => None,
    };

    let failed_wcag_criteria = row
        .get(columns::WCAG_CRITERIA)
        .map(|raw| {
            raw.split(',')
                .map(|criterion| criterion.trim().to_string())
                .filter(|criterion| !criterion.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let draft = RowDraft {
        ordinal: row.ordinal(),
        issue_id: row.get(columns::ISSUE_ID).map(str::to_string),
        url_id,
        issue_title,
        description: row.get(columns::DESCRIPTION).map(str::to_string),
        issue_type: row
            .get(columns::ISSUE_TYPE)
            .map(IssueType::parse)
            .unwrap_or(IssueType::Other),
        severity,
        failed_wcag_criteria,
        testing_month: row.get(columns::TESTING_MONTH).map(str::to_string),
        testing_year,
        testing_environment: row.get(columns::TESTING_ENVIRONMENT).map(str::to_string),
        browser: row.get(columns::BROWSER).map(str::to_string),
        operating_system: row.get(columns::OPERATING_SYSTEM).map(str::to_string),
        assistive_technology: row.get(columns::ASSISTIVE_TECHNOLOGY).map(str::to_string),
        expected_result: row.get(columns::EXPECTED_RESULT).map(str::to_string),
        actual_result: row.get(columns::ACTUAL_RESULT).map(str::to_string),
        screencast_url: row.get(columns::SCREENCAST_URL).map(str::to_string),
        dev_status,
        dev_comments: row.get(columns::DEV_COMMENTS).map(str::to_string),
        qa_status,
        qa_comments: row.get(columns::QA_COMMENTS).map(str::to_string),
    };

    Ok(ParsedRow::Draft(Box::new(draft)))
}

impl RowDraft {
    fn source_fields(&self) -> SourceOwnedFields {
        SourceOwnedFields {
            description: self.description.clone(),
            issue_type: self.issue_type,
            severity: self.severity,
            failed_wcag_criteria: self.failed_wcag_criteria.clone(),
            testing_month: self.testing_month.clone(),
            testing_year: self.testing_year,
            testing_environment: self.testing_environment.clone(),
            browser: self.browser.clone(),
            operating_system: self.operating_system.clone(),
            assistive_technology: self.assistive_technology.clone(),
            expected_result: self.expected_result.clone(),
            actual_result: self.actual_result.clone(),
            screencast_url: self.screencast_url.clone(),
            sheet_row_number: Some(self.ordinal),
        }
    }

    /// Builds a fresh record for a row with no existing match, tagged with
    /// the run's batch identifier and source sheet for traceability.
    fn into_record(self, project_id: Uuid, run: &SyncRun) -> IssueRecord {
        let source = self.source_fields();
        let workflow = WorkflowOwnedFields {
            dev_status: self.dev_status.unwrap_or_default(),
            dev_comments: self.dev_comments.clone(),
            qa_status: self.qa_status.unwrap_or_default(),
            qa_comments: self.qa_comments.clone(),
            sent_to_user: false,
            resolved_at: None,
        };

        IssueRecord {
            id: Uuid::new_v4(),
            project_id,
            issue_id: self.issue_id,
            url_id: self.url_id,
            issue_title: self.issue_title,
            source,
            workflow,
            import_batch_id: Some(run.id.to_string()),
            source_file_name: Some(run.sheet_name.clone()),
        }
    }

    /// Merges the draft onto an existing record.
    ///
    /// Source-owned fields are overwritten wholesale. Workflow-owned fields
    /// keep their stored values unless the sheet supplies a non-empty one.
    /// The issue id is backfilled when the sheet carries one, so a logical
    /// issue keeps a single record once the source assigns its id.
    fn merge_into(&self, current: &IssueRecord) -> IssueRecord {
        let mut merged = current.clone();

        if self.issue_id.is_some() {
            merged.issue_id = self.issue_id.clone();
        }
        merged.url_id = self.url_id.clone();
        merged.issue_title = self.issue_title.clone();
        merged.source = self.source_fields();

        if let Some(dev_status) = self.dev_status {
            merged.workflow.dev_status = dev_status;
        }
        if let Some(dev_comments) = &self.dev_comments {
            merged.workflow.dev_comments = Some(dev_comments.clone());
        }
        if let Some(qa_status) = self.qa_status {
            merged.workflow.qa_status = qa_status;
        }
        if let Some(qa_comments) = &self.qa_comments {
            merged.workflow.qa_comments = Some(qa_comments.clone());
        }

        merged
    }
}

/// The upsert/dedup engine.
///
/// Owns the merge decision for every row: key resolution, field-group merge,
/// and classification. The issue store underneath only provides lookups and
/// writes.
#[derive(Debug, Clone)]
pub struct UpsertEngine<D> {
    destination: D,
}

impl<D> UpsertEngine<D>
where
    D: IssueStore + Send + Sync,
{
    /// Creates an engine writing into `destination`.
    pub fn new(destination: D) -> Self {
        Self { destination }
    }

    /// Applies one sheet row and returns its classification.
    ///
    /// Row validation failures are absorbed into the returned
    /// [`RowApplication::Failed`]; only storage errors propagate, because
    /// those are run-scoped rather than row-scoped.
    pub async fn apply_row(
        &self,
        source: &SyncSource,
        run: &SyncRun,
        row: &SheetRow,
    ) -> SyncResult<RowApplication> {
        let draft = match parse_row(row) {
            Ok(ParsedRow::Skip) => {
                debug!("row {} of {} flagged inactive or duplicate, skipping", row.ordinal(), source.id);
                return Ok(RowApplication::Skipped);
            }
            Ok(ParsedRow::Draft(draft)) => draft,
            Err(error) => {
                return Ok(RowApplication::Failed(error.into_failure(row.ordinal())));
            }
        };

        let project_id = source.id.project_id;

        // The issue id is authoritative when present; the (url, title) pair is
        // the fallback key that catches rows whose id was assigned or changed
        // between exports.
        let mut existing = None;
        if let Some(issue_id) = &draft.issue_id {
            existing = self.destination.get_by_issue_id(project_id, issue_id).await?;
        }
        if existing.is_none() {
            existing = self
                .destination
                .get_by_url_title(project_id, &draft.url_id, &draft.issue_title)
                .await?;
        }

        match existing {
            None => {
                let record = draft.into_record(project_id, run);
                self.destination.insert(record).await?;

                Ok(RowApplication::Inserted)
            }
            Some(current) => {
                let merged = draft.merge_into(&current);
                if merged == current {
                    return Ok(RowApplication::Skipped);
                }

                self.destination.update(merged).await?;

                Ok(RowApplication::Updated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::memory::MemoryIssueStore;
    use crate::types::{SourceId, SyncSource};

    fn test_source() -> SyncSource {
        SyncSource::new(
            SourceId::new(Uuid::new_v4(), "sheet-1"),
            "Audit Sheet",
            vec![
                columns::ISSUE_ID.to_string(),
                columns::URL_ID.to_string(),
                columns::ISSUE_TITLE.to_string(),
                columns::SEVERITY.to_string(),
            ],
        )
    }

    fn test_run(source: &SyncSource) -> SyncRun {
        SyncRun::begin(Uuid::new_v4(), source, 3)
    }

    fn valid_row(ordinal: u64) -> SheetRow {
        SheetRow::from_pairs(
            ordinal,
            [
                (columns::URL_ID, "url-1"),
                (columns::ISSUE_TITLE, "Missing alt text"),
                (columns::SEVERITY, "2_high"),
            ],
        )
    }

    #[tokio::test]
    async fn new_row_is_inserted_with_traceability_tags() {
        let source = test_source();
        let run = test_run(&source);
        let store = MemoryIssueStore::new();
        let engine = UpsertEngine::new(store.clone());

        let application = engine
            .apply_row(&source, &run, &valid_row(1))
            .await
            .unwrap();
        assert_eq!(application, RowApplication::Inserted);

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].import_batch_id, Some(run.id.to_string()));
        assert_eq!(records[0].source_file_name, Some("Audit Sheet".to_string()));
        assert_eq!(records[0].source.sheet_row_number, Some(1));
    }

    #[tokio::test]
    async fn replaying_an_unchanged_row_is_skipped() {
        let source = test_source();
        let run = test_run(&source);
        let store = MemoryIssueStore::new();
        let engine = UpsertEngine::new(store.clone());

        engine
            .apply_row(&source, &run, &valid_row(1))
            .await
            .unwrap();
        let replay = engine
            .apply_row(&source, &run, &valid_row(1))
            .await
            .unwrap();

        assert_eq!(replay, RowApplication::Skipped);
        assert_eq!(store.records().await.len(), 1);
    }

    #[tokio::test]
    async fn source_change_updates_without_touching_workflow_fields() {
        let source = test_source();
        let run = test_run(&source);
        let store = MemoryIssueStore::new();
        let engine = UpsertEngine::new(store.clone());

        engine
            .apply_row(&source, &run, &valid_row(1))
            .await
            .unwrap();

        // Downstream workflow moves the issue along between syncs.
        let mut record = store.records().await.remove(0);
        record.workflow.dev_status = DevStatus::InProgress;
        record.workflow.sent_to_user = true;
        store.put(record).await;

        let changed = SheetRow::from_pairs(
            1,
            [
                (columns::URL_ID, "url-1"),
                (columns::ISSUE_TITLE, "Missing alt text"),
                (columns::SEVERITY, "1_critical"),
            ],
        );
        let application = engine.apply_row(&source, &run, &changed).await.unwrap();
        assert_eq!(application, RowApplication::Updated);

        let record = store.records().await.remove(0);
        assert_eq!(record.source.severity, Severity::Critical);
        assert_eq!(record.workflow.dev_status, DevStatus::InProgress);
        assert!(record.workflow.sent_to_user);
    }

    #[tokio::test]
    async fn sheet_supplied_workflow_values_override() {
        let source = test_source();
        let run = test_run(&source);
        let store = MemoryIssueStore::new();
        let engine = UpsertEngine::new(store.clone());

        engine
            .apply_row(&source, &run, &valid_row(1))
            .await
            .unwrap();

        let with_workflow = SheetRow::from_pairs(
            1,
            [
                (columns::URL_ID, "url-1"),
                (columns::ISSUE_TITLE, "Missing alt text"),
                (columns::SEVERITY, "2_high"),
                (columns::DEV_STATUS, "Done"),
                (columns::DEV_COMMENTS, "fixed in release 12"),
            ],
        );
        let application = engine
            .apply_row(&source, &run, &with_workflow)
            .await
            .unwrap();
        assert_eq!(application, RowApplication::Updated);

        let record = store.records().await.remove(0);
        assert_eq!(record.workflow.dev_status, DevStatus::Done);
        assert_eq!(
            record.workflow.dev_comments,
            Some("fixed in release 12".to_string())
        );
    }

    #[tokio::test]
    async fn issue_id_is_backfilled_through_the_fallback_key() {
        let source = test_source();
        let run = test_run(&source);
        let store = MemoryIssueStore::new();
        let engine = UpsertEngine::new(store.clone());

        // First export has no issue id yet.
        engine
            .apply_row(&source, &run, &valid_row(1))
            .await
            .unwrap();

        // The next export assigned ISS-42 to the same logical issue.
        let with_id = SheetRow::from_pairs(
            1,
            [
                (columns::ISSUE_ID, "ISS-42"),
                (columns::URL_ID, "url-1"),
                (columns::ISSUE_TITLE, "Missing alt text"),
                (columns::SEVERITY, "2_high"),
            ],
        );
        let application = engine.apply_row(&source, &run, &with_id).await.unwrap();
        assert_eq!(application, RowApplication::Updated);

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].issue_id, Some("ISS-42".to_string()));
    }

    #[tokio::test]
    async fn malformed_severity_fails_the_row_only() {
        let source = test_source();
        let run = test_run(&source);
        let store = MemoryIssueStore::new();
        let engine = UpsertEngine::new(store.clone());

        let bad = SheetRow::from_pairs(
            4,
            [
                (columns::URL_ID, "url-1"),
                (columns::ISSUE_TITLE, "Missing alt text"),
                (columns::SEVERITY, "catastrophic"),
            ],
        );
        let application = engine.apply_row(&source, &run, &bad).await.unwrap();

        let RowApplication::Failed(failure) = application else {
            panic!("expected a row failure");
        };
        assert_eq!(failure.ordinal, 4);
        assert_eq!(failure.column, Some(columns::SEVERITY.to_string()));
        assert!(store.records().await.is_empty());
    }

    #[tokio::test]
    async fn flagged_rows_are_skipped() {
        let source = test_source();
        let run = test_run(&source);
        let engine = UpsertEngine::new(MemoryIssueStore::new());

        let inactive = SheetRow::from_pairs(
            2,
            [
                (columns::URL_ID, "url-1"),
                (columns::ISSUE_TITLE, "Missing alt text"),
                (columns::SEVERITY, "2_high"),
                (columns::IS_ACTIVE, "no"),
            ],
        );
        assert_eq!(
            engine.apply_row(&source, &run, &inactive).await.unwrap(),
            RowApplication::Skipped
        );

        let duplicate = SheetRow::from_pairs(
            3,
            [
                (columns::URL_ID, "url-1"),
                (columns::ISSUE_TITLE, "Missing alt text"),
                (columns::SEVERITY, "2_high"),
                (columns::IS_DUPLICATE, "TRUE"),
            ],
        );
        assert_eq!(
            engine.apply_row(&source, &run, &duplicate).await.unwrap(),
            RowApplication::Skipped
        );
    }
}
