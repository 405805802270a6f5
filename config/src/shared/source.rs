use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::ValidationError;

/// Declarative configuration for one synchronized spreadsheet.
///
/// Each entry pairs a project with an external sheet and pins the column
/// layout the engine validates the sheet against before writing anything.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SheetSourceConfig {
    /// The project the sheet's rows are ingested into.
    pub project_id: Uuid,
    /// Identifier of the external sheet, as assigned by the sheet provider.
    pub sheet_id: String,
    /// Human-readable sheet name, recorded on runs for traceability.
    pub sheet_name: String,
    /// Ordered column headers the sheet is expected to carry. Every listed
    /// column is required; a sheet missing one fails structure validation.
    pub expected_columns: Vec<String>,
}

impl SheetSourceConfig {
    /// Validates the source entry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sheet_id.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "sheet_id".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.expected_columns.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "expected_columns".to_string(),
                constraint: "must list at least one column".to_string(),
            });
        }

        Ok(())
    }
}
