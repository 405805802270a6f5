//! Incremental, idempotent synchronization of externally edited spreadsheets
//! into normalized accessibility issue records.
//!
//! A [`runner::SyncRunner`] executes one run per sync source: it takes an
//! exclusive lease on the source, validates the sheet's column layout,
//! consumes rows from the committed checkpoint onward, merges each row into
//! the issue store by natural key, and finalizes the run into a current
//! status record plus an immutable log entry. Transient failures are retried
//! with exponential backoff from the last committed checkpoint.
//!
//! The engine is storage- and source-agnostic: rows come from a
//! [`source::RowReader`], merged records land in a [`destination::IssueStore`],
//! and checkpoints, leases, and run bookkeeping live behind a
//! [`store::StateStore`]. In-memory implementations of all three are provided
//! for tests and development.

pub mod concurrency;
pub mod destination;
pub mod error;
mod macros;
pub mod merge;
pub mod reporter;
pub mod retries;
pub mod runner;
pub mod source;
pub mod store;
pub mod structure;
pub mod types;
