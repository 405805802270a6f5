//! Shared configuration types for the sheet sync engine.

mod base;
mod engine;
mod retry;
mod source;
mod sync;

pub use base::ValidationError;
pub use engine::EngineConfig;
pub use retry::RetryConfig;
pub use source::SheetSourceConfig;
pub use sync::SyncConfig;
