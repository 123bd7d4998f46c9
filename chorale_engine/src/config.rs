// Data-driven engine configuration.
//
// `EngineConfig` gathers the tunables a host editor may want to change
// without recompiling: the per-voice register bands (and anchors) used by
// the voicing assignor, and the minimum severity at which a detected
// conflict is surfaced as a resolution session. Loaded from JSON; any field
// left out of the file takes its default.
//
// The chord quality/extension interval tables are deliberately not here:
// they are fixed theory data in `chorale_theory::chord`.

use crate::conflict::Severity;
use crate::error::ConfigError;
use chorale_theory::RegisterBounds;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Register bands and anchors per voice.
    pub bounds: RegisterBounds,
    /// Conflicts below this severity are committed without a session.
    /// `Warning` surfaces everything; `Error` suppresses warning prompts.
    pub min_severity: Severity,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            bounds: RegisterBounds::default(),
            min_severity: Severity::Warning,
        }
    }
}

impl EngineConfig {
    /// Load and validate a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds.validate()?;
        Ok(())
    }
}
