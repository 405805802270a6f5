use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of an accessibility issue.
///
/// The destination historically stores severities as ranked free text
/// (`1_critical` .. `4_low`); internally the engine is strongly typed and
/// converts at the storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Parses a severity from raw sheet text.
    ///
    /// Accepts both the ranked form (`1_critical`) and the bare name
    /// (`Critical`), case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "1_critical" | "critical" => Some(Severity::Critical),
            "2_high" | "high" => Some(Severity::High),
            "3_medium" | "medium" => Some(Severity::Medium),
            "4_low" | "low" => Some(Severity::Low),
            _ => None,
        }
    }

    /// Returns the ranked text form stored by the destination.
    pub fn as_static_str(&self) -> &'static str {
        match self {
            Severity::Critical => "1_critical",
            Severity::High => "2_high",
            Severity::Medium => "3_medium",
            Severity::Low => "4_low",
        }
    }
}

/// Testing methodology that surfaced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    AutomatedTools,
    ScreenReader,
    KeyboardNavigation,
    ColorContrast,
    TextSpacing,
    BrowserZoom,
    Other,
}

impl IssueType {
    /// Parses an issue type from raw sheet text, falling back to
    /// [`IssueType::Other`] for unrecognized values.
    ///
    /// Issue type is descriptive rather than key material, so unknown text
    /// from a hand-edited sheet does not fail the row.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "automated_tools" => IssueType::AutomatedTools,
            "screen_reader" => IssueType::ScreenReader,
            "keyboard_navigation" | "keyboard_only" => IssueType::KeyboardNavigation,
            "color_contrast" => IssueType::ColorContrast,
            "text_spacing" => IssueType::TextSpacing,
            "browser_zoom" => IssueType::BrowserZoom,
            _ => IssueType::Other,
        }
    }
}

/// Remediation status controlled by the development team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DevStatus {
    #[default]
    NotStarted,
    InProgress,
    Done,
    Blocked,
    ThirdParty,
    WontFix,
}

impl DevStatus {
    /// Parses a dev status from raw sheet text.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "not_started" => Some(DevStatus::NotStarted),
            "in_progress" => Some(DevStatus::InProgress),
            "done" => Some(DevStatus::Done),
            "blocked" => Some(DevStatus::Blocked),
            "3rd_party" | "third_party" => Some(DevStatus::ThirdParty),
            "wont_fix" | "won't_fix" => Some(DevStatus::WontFix),
            _ => None,
        }
    }
}

/// Verification status controlled by the QA team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QaStatus {
    #[default]
    NotStarted,
    InProgress,
    Fixed,
    Verified,
    Failed,
    ThirdParty,
}

impl QaStatus {
    /// Parses a QA status from raw sheet text.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "not_started" => Some(QaStatus::NotStarted),
            "in_progress" => Some(QaStatus::InProgress),
            "fixed" => Some(QaStatus::Fixed),
            "verified" => Some(QaStatus::Verified),
            "failed" => Some(QaStatus::Failed),
            "3rd_party" | "third_party" => Some(QaStatus::ThirdParty),
            _ => None,
        }
    }
}

/// Fields owned by the sheet: overwritten from the source on every merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOwnedFields {
    pub description: Option<String>,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub failed_wcag_criteria: Vec<String>,
    pub testing_month: Option<String>,
    pub testing_year: Option<i32>,
    pub testing_environment: Option<String>,
    pub browser: Option<String>,
    pub operating_system: Option<String>,
    pub assistive_technology: Option<String>,
    pub expected_result: Option<String>,
    pub actual_result: Option<String>,
    pub screencast_url: Option<String>,
    /// Position of the row in the most recent export that touched the record.
    pub sheet_row_number: Option<u64>,
}

/// Fields owned by the downstream human workflow.
///
/// These survive re-sync untouched unless the sheet explicitly supplies a
/// non-empty value for one of the overridable members. `sent_to_user` and
/// `resolved_at` have no sheet column and are never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkflowOwnedFields {
    pub dev_status: DevStatus,
    pub dev_comments: Option<String>,
    pub qa_status: QaStatus,
    pub qa_comments: Option<String>,
    /// Controls whether the issue is visible in the client portal.
    pub sent_to_user: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A normalized accessibility issue record, the target entity of the sync.
///
/// Identified primarily by `(project_id, issue_id)` and secondarily by
/// `(project_id, url_id, issue_title)`. The secondary key exists because
/// issue ids are assigned in the sheet and may appear only in a later export
/// of the same logical issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    /// Surrogate record id assigned at insert time.
    pub id: Uuid,
    pub project_id: Uuid,
    /// Sheet-assigned issue identifier; absent until the source supplies one,
    /// then backfilled and treated as authoritative.
    pub issue_id: Option<String>,
    pub url_id: String,
    pub issue_title: String,
    /// Fields the sheet owns.
    pub source: SourceOwnedFields,
    /// Fields the downstream workflow owns.
    pub workflow: WorkflowOwnedFields,
    /// Run that inserted the record, for import traceability.
    pub import_batch_id: Option<String>,
    /// Sheet the record was first imported from.
    pub source_file_name: Option<String>,
}
