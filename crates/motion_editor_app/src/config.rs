// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration.
//!
//! Settings are stored as RON. Every field has a default, so a config file
//! only needs the values it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default loop span of the timeline, in seconds
pub const DEFAULT_TIMELINE_DURATION: f64 = 10.0;

/// Default frame rate for frame/time conversion
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Default undo depth
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the file failed
    #[error("Config read error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON for this schema
    #[error("Config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Writing RON failed
    #[error("Config serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Loop span of the timeline clock, seconds
    #[serde(default = "default_timeline_duration")]
    pub timeline_duration: f64,
    /// Frames per second used for frame/time conversion
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    /// Maximum number of undo steps kept
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
}

fn default_timeline_duration() -> f64 {
    DEFAULT_TIMELINE_DURATION
}

fn default_frame_rate() -> f64 {
    DEFAULT_FRAME_RATE
}

fn default_history_depth() -> usize {
    DEFAULT_HISTORY_DEPTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeline_duration: DEFAULT_TIMELINE_DURATION,
            frame_rate: DEFAULT_FRAME_RATE,
            history_depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a RON document
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&content)?;
        tracing::debug!("Loaded engine config from {:?}", path);
        Ok(config)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.timeline_duration.is_finite() || self.timeline_duration <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "timeline_duration must be positive, got {}",
                self.timeline_duration
            )));
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if self.history_depth == 0 {
            return Err(ConfigError::Invalid(
                "history_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
