//! Editor configuration
//!
//! Settings the store and transport are constructed from. Stored as JSON;
//! any field left out of the file falls back to its default.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::engine::buffer::DEFAULT_SAMPLE_RATE;
use crate::engine::io::ExportSettings;
use crate::error::{CadenzaError, Result};

/// Default number of undo steps kept
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Default tolerance for repeat-region loop detection, in seconds
pub const DEFAULT_REPEAT_EPSILON: f64 = 0.01;

/// Editor-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Undo steps kept before the oldest entry is dropped
    pub max_history: usize,
    /// Polling tolerance for the repeat-region loop, in seconds
    pub repeat_epsilon: f64,
    /// Sample rate for new material and mixdowns
    pub default_sample_rate: u32,
    /// Format used by exports unless overridden
    pub export: ExportSettings,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            repeat_epsilon: DEFAULT_REPEAT_EPSILON,
            default_sample_rate: DEFAULT_SAMPLE_RATE,
            export: ExportSettings::default(),
        }
    }
}

impl EditorConfig {
    /// Parse a JSON document and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file {:?} doesn't exist, using defaults", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Write configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject values the editor cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_history == 0 {
            return Err(CadenzaError::invalid_parameter(
                "max_history",
                self.max_history,
                "at least 1",
            ));
        }
        if !(self.repeat_epsilon.is_finite() && self.repeat_epsilon >= 0.0 && self.repeat_epsilon < 1.0) {
            return Err(CadenzaError::invalid_parameter(
                "repeat_epsilon",
                self.repeat_epsilon,
                "[0, 1) seconds",
            ));
        }
        if self.default_sample_rate == 0 {
            return Err(CadenzaError::invalid_parameter(
                "default_sample_rate",
                self.default_sample_rate,
                "a positive rate",
            ));
        }
        self.export.validate()
    }
}
