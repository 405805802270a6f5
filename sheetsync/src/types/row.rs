use std::collections::BTreeMap;

/// One raw row produced by a sheet reader.
///
/// A [`SheetRow`] is a mapping from column name to raw cell text plus the
/// row's 1-based ordinal position within the sheet's data rows. Values are
/// kept untyped; the merge engine parses and validates them per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based position among the sheet's data rows.
    ordinal: u64,
    /// Raw cell text keyed by column header.
    values: BTreeMap<String, String>,
}

impl SheetRow {
    /// Creates a new sheet row.
    pub fn new(ordinal: u64, values: BTreeMap<String, String>) -> Self {
        Self { ordinal, values }
    }

    /// Creates a sheet row from column/value pairs.
    pub fn from_pairs<'a>(
        ordinal: u64,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let values = pairs
            .into_iter()
            .map(|(column, value)| (column.to_string(), value.to_string()))
            .collect();

        Self::new(ordinal, values)
    }

    /// Returns the row's 1-based ordinal.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Returns the trimmed cell value for `column`, treating blank cells as
    /// absent.
    ///
    /// Hand-edited sheets routinely carry stray whitespace and empty strings
    /// where a value was deleted; both read as "not supplied".
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}
