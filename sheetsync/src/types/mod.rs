//! Common types used throughout the sync engine.
//!
//! Re-exports source identities, cursors, raw sheet rows, normalized issue
//! records, and run bookkeeping types.

mod cursor;
mod issue;
mod report;
mod row;
mod run;
mod source;

pub use cursor::*;
pub use issue::*;
pub use report::*;
pub use row::*;
pub use run::*;
pub use source::*;
