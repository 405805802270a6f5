//! Structure validation for sync sources.
//!
//! Externally hand-edited sheets drift: columns get renamed, inserted, or
//! shuffled. Refusing to write under ambiguous column alignment is strictly
//! safer than silently mis-assigning values to the wrong field, so a sheet
//! missing an expected column aborts the run before anything is written.
//! New columns and reordering are recorded but non-blocking.

use serde::{Deserialize, Serialize};

/// Diff between a source's expected column layout and the observed header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StructureDiff {
    /// Observed columns that are not part of the expected layout.
    pub added: Vec<String>,
    /// Expected columns missing from the sheet.
    pub removed: Vec<String>,
    /// Columns present on both sides but at a different relative position.
    pub reordered: Vec<String>,
}

impl StructureDiff {
    /// Returns `true` when the observed header matches the expected layout
    /// exactly, including order.
    pub fn is_match(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.reordered.is_empty()
    }

    /// Returns `true` when the drift is severe enough that no row may be
    /// written: an expected column is missing.
    pub fn is_hard_mismatch(&self) -> bool {
        !self.removed.is_empty()
    }

    /// Renders the diff as structured details for persistence on the run.
    pub fn to_details(&self) -> serde_json::Value {
        serde_json::json!({
            "added": self.added,
            "removed": self.removed,
            "reordered": self.reordered,
        })
    }
}

/// Compares the expected column layout against the observed sheet header.
pub fn diff_columns(expected: &[String], observed: &[String]) -> StructureDiff {
    let added = observed
        .iter()
        .filter(|column| !expected.contains(column))
        .cloned()
        .collect::<Vec<_>>();

    let removed = expected
        .iter()
        .filter(|column| !observed.contains(column))
        .cloned()
        .collect::<Vec<_>>();

    // Relative order is compared over the columns both sides share; added and
    // removed columns already have their own diff buckets.
    let expected_common = expected
        .iter()
        .filter(|column| observed.contains(column))
        .collect::<Vec<_>>();
    let observed_common = observed
        .iter()
        .filter(|column| expected.contains(column))
        .collect::<Vec<_>>();

    let reordered = expected_common
        .iter()
        .zip(observed_common.iter())
        .filter(|(expected_column, observed_column)| expected_column != observed_column)
        .map(|(expected_column, _)| (*expected_column).clone())
        .collect::<Vec<_>>();

    StructureDiff {
        added,
        removed,
        reordered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn identical_layout_matches() {
        let expected = columns(&["Issue ID", "Issue Title", "Severity"]);
        let diff = diff_columns(&expected, &expected);

        assert!(diff.is_match());
        assert!(!diff.is_hard_mismatch());
    }

    #[test]
    fn missing_expected_column_is_a_hard_mismatch() {
        let expected = columns(&["Issue ID", "Issue Title", "Severity"]);
        let observed = columns(&["Issue ID", "Issue Title"]);
        let diff = diff_columns(&expected, &observed);

        assert!(diff.is_hard_mismatch());
        assert_eq!(diff.removed, vec!["Severity".to_string()]);
    }

    #[test]
    fn new_columns_are_soft_drift() {
        let expected = columns(&["Issue ID", "Issue Title"]);
        let observed = columns(&["Issue ID", "Issue Title", "Notes"]);
        let diff = diff_columns(&expected, &observed);

        assert!(!diff.is_match());
        assert!(!diff.is_hard_mismatch());
        assert_eq!(diff.added, vec!["Notes".to_string()]);
    }

    #[test]
    fn reordering_is_soft_drift() {
        let expected = columns(&["Issue ID", "Issue Title", "Severity"]);
        let observed = columns(&["Issue Title", "Issue ID", "Severity"]);
        let diff = diff_columns(&expected, &observed);

        assert!(!diff.is_match());
        assert!(!diff.is_hard_mismatch());
        assert_eq!(
            diff.reordered,
            vec!["Issue ID".to_string(), "Issue Title".to_string()]
        );
    }

    #[test]
    fn added_columns_do_not_count_as_reordering() {
        let expected = columns(&["Issue ID", "Issue Title"]);
        let observed = columns(&["Notes", "Issue ID", "Issue Title"]);
        let diff = diff_columns(&expected, &observed);

        assert_eq!(diff.added, vec!["Notes".to_string()]);
        assert!(diff.reordered.is_empty());
    }
}
