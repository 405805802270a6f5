use std::future::Future;

use futures::stream::BoxStream;

use crate::error::SyncResult;
use crate::types::{RowCursor, SheetRow, SyncSource};

/// A lazy, finite sequence of sheet rows in source order.
///
/// Streams are restartable in the sense that a fresh call to
/// [`RowReader::read_rows_since`] yields a new stream positioned at the
/// requested cursor; a consumed stream is not reusable.
pub type RowStream = BoxStream<'static, SyncResult<SheetRow>>;

/// Trait for collaborators that produce rows from an external sheet.
///
/// [`RowReader`] implementations wrap whatever transport reaches the sheet
/// provider; the engine only requires the observed header for structure
/// validation and an ordered row stream positioned after a cursor. Row-level
/// parsing of the sheet format itself happens behind this trait.
pub trait RowReader {
    /// Reads the sheet's current column header, in sheet order.
    fn read_columns(
        &self,
        source: &SyncSource,
    ) -> impl Future<Output = SyncResult<Vec<String>>> + Send;

    /// Opens a stream over the data rows strictly after `cursor`, in source
    /// order.
    ///
    /// Source order matters: a later row may correct an earlier duplicate
    /// within the same export.
    fn read_rows_since(
        &self,
        source: &SyncSource,
        cursor: RowCursor,
    ) -> impl Future<Output = SyncResult<RowStream>> + Send;
}
