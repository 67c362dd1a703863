// BagCrab - GPL-3.0-or-later
// This file is part of BagCrab.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// BagCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// BagCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with BagCrab.  If not, see <https://www.gnu.org/licenses/>.

use crate::journey::SegmentationConfig;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User configuration stored in the config directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Pause in seconds that ends a scanner/OMS journey
    pub primary_gap_secs: u32,
    /// Pause in seconds that ends a conveyor journey
    pub plc_gap_secs: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            primary_gap_secs: 180,
            plc_gap_secs: 300,
        }
    }
}

impl AnalysisConfig {
    /// Get the path to the user config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bagcrab").join("config.json"))
    }

    /// Load the user config, returning defaults if there is none
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                tracing::info!("No config found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from a specific file, returning defaults if it is unusable
    pub fn load_from(path: &Path) -> Self {
        tracing::info!("Loading config from {}", path.display());
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Cannot read config {}: {e}, using defaults", path.display());
                return Self::default();
            }
        };
        match serde_json::from_str::<Self>(&contents) {
            Ok(config) => {
                tracing::info!(
                    "Loaded gap thresholds: {}s primary, {}s conveyor",
                    config.primary_gap_secs,
                    config.plc_gap_secs
                );
                config
            }
            Err(e) => {
                tracing::warn!("Invalid config {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Save config to the user config directory
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path().ok_or("Could not determine config directory")?;
        self.save_to(&path)
    }

    /// Save config to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {e}"))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write config file: {e}"))?;

        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Apply thresholds given on the command line
    #[must_use]
    pub fn with_overrides(
        mut self,
        primary_gap_secs: Option<u32>,
        plc_gap_secs: Option<u32>,
    ) -> Self {
        if let Some(secs) = primary_gap_secs {
            self.primary_gap_secs = secs;
        }
        if let Some(secs) = plc_gap_secs {
            self.plc_gap_secs = secs;
        }
        self
    }

    pub fn segmentation(&self) -> SegmentationConfig {
        SegmentationConfig {
            primary_gap: TimeDelta::seconds(i64::from(self.primary_gap_secs)),
            plc_gap: TimeDelta::seconds(i64::from(self.plc_gap_secs)),
        }
    }
}
