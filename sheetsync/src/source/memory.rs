use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Mutex;

use crate::error::SyncResult;
use crate::source::{RowReader, RowStream};
use crate::types::{RowCursor, SheetRow, SyncSource};

#[derive(Debug, Default)]
struct Inner {
    columns: Vec<String>,
    rows: Vec<SheetRow>,
}

/// In-memory sheet for testing and development purposes.
///
/// [`MemorySheet`] holds a mutable header and row set, so tests can evolve
/// the sheet between runs the way a hand-edited export would: append rows,
/// rewrite a row in place, or rename columns to provoke structure drift.
#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySheet {
    /// Creates a new empty sheet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sheet with the given header.
    pub fn with_columns(columns: Vec<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                columns,
                rows: Vec::new(),
            })),
        }
    }

    /// Replaces the sheet header.
    pub async fn set_columns(&self, columns: Vec<String>) {
        let mut inner = self.inner.lock().await;
        inner.columns = columns;
    }

    /// Appends or replaces a row at its ordinal.
    ///
    /// Replacing models an in-place sheet edit between exports.
    pub async fn put_row(&self, row: SheetRow) {
        let mut inner = self.inner.lock().await;

        if let Some(existing) = inner
            .rows
            .iter_mut()
            .find(|existing| existing.ordinal() == row.ordinal())
        {
            *existing = row;
        } else {
            inner.rows.push(row);
            inner.rows.sort_by_key(|row| row.ordinal());
        }
    }

    /// Number of data rows currently in the sheet.
    pub async fn row_count(&self) -> usize {
        self.inner.lock().await.rows.len()
    }
}

impl RowReader for MemorySheet {
    async fn read_columns(&self, _source: &SyncSource) -> SyncResult<Vec<String>> {
        let inner = self.inner.lock().await;

        Ok(inner.columns.clone())
    }

    async fn read_rows_since(
        &self,
        _source: &SyncSource,
        cursor: RowCursor,
    ) -> SyncResult<RowStream> {
        let inner = self.inner.lock().await;

        let rows = inner
            .rows
            .iter()
            .filter(|row| cursor.is_before(row.ordinal()))
            .cloned()
            .map(Ok)
            .collect::<Vec<_>>();

        Ok(futures::stream::iter(rows).boxed())
    }
}
