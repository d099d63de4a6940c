//! Engine configuration.

use std::path::Path;

use montage_core::{FrameRate, MontageError, Result};
use serde::{Deserialize, Serialize};

use crate::bake::BakeOptions;

/// Settings shared by everything that builds, refreshes or bakes timelines.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Rate given to items that have no range yet.
    pub default_rate: FrameRate,
    /// Options used when a caller does not supply its own.
    pub bake: BakeOptions,
    /// Levels refreshed below the root. Unbounded when absent.
    pub refresh_depth: Option<usize>,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            default_rate: FrameRate::FPS_24,
            bake: BakeOptions::default(),
            refresh_depth: None,
        }
    }
}

impl TimelineConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| MontageError::Serialization(format!("Invalid config: {}", e)))
    }

    /// Depth to pass to [`Item::refresh`](crate::Item::refresh).
    pub fn refresh_depth(&self) -> usize {
        self.refresh_depth.unwrap_or(usize::MAX)
    }
}
