//! Concurrency utilities for coordinating sync runs.
//!
//! The [`shutdown`] module implements the watch-based cancellation pattern
//! used by runners: a single signal halts row intake across runs, each run
//! finalizes reflecting whatever progress was committed, and checkpoint state
//! is never corrupted. Cancellation is cooperative and not an error.

pub mod shutdown;
