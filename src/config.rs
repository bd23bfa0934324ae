//! Startup configuration.
//!
//! Fixed for the lifetime of the process. Defaults reproduce the stock level's
//! look; any subset of fields may be overridden from a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // === Frame ===
    /// Internal render resolution; the window stretches it.
    pub width: usize,
    pub height: usize,
    /// Render worker threads, one column band each.
    pub workers: usize,
    /// Horizontal field of view in degrees.
    pub fov_degrees: f64,

    // === Movement ===
    /// World units per second.
    pub linear_speed: f64,
    /// Radians per second while a turn key is held.
    pub turn_speed: f64,
    /// Radians per 1000 counts of relative mouse motion.
    pub mouse_sensitivity: f64,

    // === Shading ===
    /// Fog range in tiles.
    pub min_fog_distance: f64,
    pub max_fog_distance: f64,
    pub fog_color: Rgb,
    pub light_color: Rgb,
    pub sky_color: Rgb,
    pub floor_color: Rgb,

    // === World / casting ===
    /// World units per tile.
    pub world_scale: f64,
    pub substeps_per_tile: u32,
    /// Perturbed re-casts allowed when a march step crosses a tile corner.
    pub max_cast_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            workers: 4,
            fov_degrees: 100.0,

            linear_speed: 70.0,
            turn_speed: 3.5,
            mouse_sensitivity: 20.0,

            min_fog_distance: 2.0,
            max_fog_distance: 20.0,
            fog_color: Rgb::from_hex(0x87CEEB),
            light_color: Rgb::WHITE,
            sky_color: Rgb::from_hex(0x87CEEB),
            floor_color: Rgb::from_hex(0x635244),

            world_scale: 10.0,
            substeps_per_tile: 10,
            max_cast_retries: 4,
        }
    }
}

impl Config {
    /// Read a JSON config file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::InvalidConfig(msg));
        if self.width == 0 || self.height == 0 {
            return fail(format!("resolution {}x{} is empty", self.width, self.height));
        }
        if self.workers == 0 {
            return fail("at least one render worker is required".into());
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return fail(format!("fov {} must be inside (0, 180)", self.fov_degrees));
        }
        if !(self.min_fog_distance < self.max_fog_distance) {
            return fail(format!(
                "fog range {}..{} is empty",
                self.min_fog_distance, self.max_fog_distance
            ));
        }
        if !(self.world_scale.is_finite() && self.world_scale > 0.0) {
            return fail(format!("world scale {} must be positive", self.world_scale));
        }
        if self.substeps_per_tile == 0 {
            return fail("substeps_per_tile must be at least 1".into());
        }
        Ok(())
    }
}
