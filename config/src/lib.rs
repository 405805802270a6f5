//! Configuration types and loading for the sheet sync engine.
//!
//! The [`shared`] module holds the serde-backed configuration structs consumed
//! by the engine, while [`load`] implements layered loading from configuration
//! files and `APP_`-prefixed environment variables.

pub mod environment;
pub mod load;
pub mod shared;

pub use load::{Config, LoadConfigError, load_config};
