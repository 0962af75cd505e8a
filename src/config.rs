use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Settings of the headless driver, read from `tessera.toml`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    /// Mesh worker threads; 0 picks from the available parallelism.
    pub workers: usize,
    /// Staging packs in the buffer pool; 0 matches `workers`.
    pub buffer_packs: usize,
    /// Horizontal radius of the section grid, in sections.
    pub view_radius: i32,
    /// Vertical extent of the grid, in sections.
    pub height_sections: i32,
    pub ticks: u32,
    pub tick_ms: u64,
    pub seed: i32,
    /// Blocks per tick along +X.
    pub camera_speed: f32,
    pub stream_columns_per_tick: usize,
    pub stats_every: u32,
    /// Ticks between simulated player edits; 0 disables them.
    pub edit_every: u32,
    pub blocks_path: Option<PathBuf>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            buffer_packs: 0,
            view_radius: 4,
            height_sections: 4,
            ticks: 600,
            tick_ms: 4,
            seed: 1337,
            camera_speed: 0.35,
            stream_columns_per_tick: 6,
            stats_every: 60,
            edit_every: 45,
            blocks_path: None,
        }
    }
}

impl DriverConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: DriverConfig = toml::from_str(toml_str)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.view_radius < 1 {
            return Err(format!("view_radius must be at least 1 (got {})", self.view_radius).into());
        }
        if self.height_sections < 1 {
            return Err(
                format!("height_sections must be at least 1 (got {})", self.height_sections).into(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg = DriverConfig::from_toml_str("ticks = 10\nseed = 7\n").unwrap();
        assert_eq!(cfg.ticks, 10);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.view_radius, DriverConfig::default().view_radius);
        assert!(cfg.blocks_path.is_none());
    }

    #[test]
    fn rejects_degenerate_grid() {
        assert!(DriverConfig::from_toml_str("view_radius = 0").is_err());
        assert!(DriverConfig::from_toml_str("height_sections = -1").is_err());
    }

    #[test]
    fn shipped_config_parses() {
        let cfg = DriverConfig::from_toml_str(include_str!("../tessera.toml")).unwrap();
        assert!(cfg.ticks > 0);
    }
}
