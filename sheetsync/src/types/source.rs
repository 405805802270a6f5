use std::fmt;

use config::shared::SheetSourceConfig;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one sync source: a project paired with an external sheet.
///
/// Exactly one checkpoint, lease, and current-status record exists per
/// [`SourceId`]. Every engine operation takes the source identity explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId {
    /// The project the sheet's rows are ingested into.
    pub project_id: Uuid,
    /// Identifier of the external sheet, as assigned by the sheet provider.
    pub sheet_id: String,
}

impl SourceId {
    /// Creates a new source identity.
    pub fn new(project_id: Uuid, sheet_id: impl Into<String>) -> Self {
        Self {
            project_id,
            sheet_id: sheet_id.into(),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_id, self.sheet_id)
    }
}

/// One synchronized spreadsheet: identity plus the metadata runs validate
/// the sheet against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSource {
    /// Source identity.
    pub id: SourceId,
    /// Human-readable sheet name, recorded on runs and inserted records for
    /// traceability.
    pub sheet_name: String,
    /// Ordered column headers the sheet is expected to carry. Every listed
    /// column is required.
    pub expected_columns: Vec<String>,
}

impl SyncSource {
    /// Creates a new sync source.
    pub fn new(
        id: SourceId,
        sheet_name: impl Into<String>,
        expected_columns: Vec<String>,
    ) -> Self {
        Self {
            id,
            sheet_name: sheet_name.into(),
            expected_columns,
        }
    }
}

impl From<SheetSourceConfig> for SyncSource {
    fn from(value: SheetSourceConfig) -> Self {
        SyncSource {
            id: SourceId::new(value.project_id, value.sheet_id),
            sheet_name: value.sheet_name,
            expected_columns: value.expected_columns,
        }
    }
}
