use serde::Deserialize;

use crate::Config;
use crate::shared::{SheetSourceConfig, SyncConfig, ValidationError};

/// Complete configuration for a sheet sync deployment.
///
/// Aggregates the engine settings and the declared sync sources. Typically
/// loaded from configuration files at startup via [`crate::load_config`].
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Engine-wide lease, timeout, and retry settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// The spreadsheets subject to synchronization.
    pub sources: Vec<SheetSourceConfig>,
}

impl EngineConfig {
    /// Validates the complete engine configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.sync.validate()?;

        for source in &self.sources {
            source.validate()?;
        }

        Ok(())
    }
}

impl Config for EngineConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
