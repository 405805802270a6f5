//! Telemetry initialization shared by services and tests.

pub mod tracing;
