//! Session settings
//!
//! Loaded from a JSON file by the native runner. Every field has a
//! default, so a partial file (or `{}`) is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::POOL_SIZE;
use crate::geometry::TreeParams;

/// Failure to read or parse a settings file
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Game settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Run seed; a fresh one is drawn when absent
    pub seed: Option<u64>,
    /// Number of pooled tree obstacles
    pub pool_size: usize,
    /// Manual forward/back control instead of constant speed
    pub debug: bool,
    /// Obstacle tree generation
    pub tree: TreeParams,
    /// Frame cap for the headless runner
    pub max_frames: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: None,
            pool_size: POOL_SIZE,
            debug: false,
            tree: TreeParams::default(),
            // Five minutes at 60 fps
            max_frames: 5 * 60 * 60,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load from `path`, falling back to defaults on any error
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::from_path(path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("{} ({}), using default settings", e, path.display());
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Replace values the simulation cannot work with
    pub fn sanitized(mut self) -> Self {
        let defaults = TreeParams::default();

        if self.pool_size == 0 {
            log::warn!("pool_size must be at least 1, using 1");
            self.pool_size = 1;
        }
        let tree = &mut self.tree;
        if tree.num_branches == 0 {
            log::warn!("tree.num_branches must be at least 1, using 1");
            tree.num_branches = 1;
        }
        if tree.num_sides < 3 {
            log::warn!("tree.num_sides must be at least 3, using 3");
            tree.num_sides = 3;
        }
        if !(tree.boundary_radius.is_finite() && tree.boundary_radius > 0.0) {
            log::warn!(
                "tree.boundary_radius {} is not positive, using {}",
                tree.boundary_radius,
                defaults.boundary_radius
            );
            tree.boundary_radius = defaults.boundary_radius;
        }
        if !(tree.depth.is_finite() && tree.depth > 0.0) {
            log::warn!("tree.depth {} is not positive, using {}", tree.depth, defaults.depth);
            tree.depth = defaults.depth;
        }
        if !(tree.taper > 0.0 && tree.taper <= 1.0) {
            log::warn!("tree.taper {} outside (0, 1], using {}", tree.taper, defaults.taper);
            tree.taper = defaults.taper;
        }
        self
    }
}
