use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;

/// Durable cursor marking the last data row of a source that was fully
/// applied.
///
/// Ordinals are 1-based data-row positions within the sheet. Only rows
/// strictly after the cursor are candidates for processing; rows at or before
/// it are never re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowCursor {
    /// No row has been applied yet; every row is a candidate.
    Start,
    /// All rows up to and including this ordinal have been applied.
    At(u64),
}

impl RowCursor {
    /// Returns the cursor position as an ordinal, with [`RowCursor::Start`]
    /// mapping to zero.
    pub fn position(&self) -> u64 {
        match self {
            RowCursor::Start => 0,
            RowCursor::At(ordinal) => *ordinal,
        }
    }

    /// Returns `true` if a row at `ordinal` lies after this cursor and must
    /// therefore be processed.
    pub fn is_before(&self, ordinal: u64) -> bool {
        self.position() < ordinal
    }

    /// Parses a cursor from its stored text form.
    ///
    /// The destination's checkpoint column is legacy free text; the only
    /// accepted shape is a decimal ordinal. Anything else is checkpoint
    /// corruption and must never be silently treated as [`RowCursor::Start`].
    pub fn parse_stored(raw: &str) -> SyncResult<RowCursor> {
        let trimmed = raw.trim();
        match trimmed.parse::<u64>() {
            Ok(0) => Ok(RowCursor::Start),
            Ok(ordinal) => Ok(RowCursor::At(ordinal)),
            Err(_) => Err(sync_error!(
                ErrorKind::CheckpointCorruption,
                "Stored checkpoint is unreadable",
                format!("`{trimmed}` is not a valid row ordinal; an administrative reset is required")
            )),
        }
    }

    /// Returns the stored text form of this cursor.
    pub fn to_stored(&self) -> String {
        self.position().to_string()
    }
}

impl fmt::Display for RowCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowCursor::Start => write!(f, "start"),
            RowCursor::At(ordinal) => write!(f, "row {ordinal}"),
        }
    }
}

/// A source's persisted checkpoint: the cursor plus its last mutation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The committed cursor.
    pub cursor: RowCursor,
    /// When the checkpoint last advanced or was reset.
    pub updated_at: DateTime<Utc>,
}
