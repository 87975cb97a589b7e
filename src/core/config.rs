// Runtime configuration loaded from JSON

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Settings consumed when the runtime and its window start up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory every fetched asset path is resolved against
    pub asset_root: PathBuf,

    /// Window title
    pub window_title: String,

    /// Initial window width in logical pixels
    pub window_width: u32,

    /// Initial window height in logical pixels
    pub window_height: u32,

    /// Color the frame is cleared to before drawing
    pub clear_color: [f32; 4],

    /// Log filter name ("error", "warn", "info", "debug", "trace", "off")
    pub log_level: String,

    /// Longest physics step in seconds; larger frame deltas are split
    pub physics_timestep: f32,

    /// Maximum number of physics substeps per frame
    pub max_substeps: u32,

    /// Gravity applied when the physics world is created
    pub gravity: [f32; 3],

    /// Draw the debug line overlay
    pub debug_overlay: bool,

    /// Worker threads for the background fetch runtime
    pub fetch_workers: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            window_title: "Lucent".to_string(),
            window_width: 1280,
            window_height: 720,
            clear_color: [0.1, 0.1, 0.15, 1.0],
            log_level: "info".to_string(),
            physics_timestep: 1.0 / 60.0,
            max_substeps: 5,
            gravity: [0.0, -9.81, 0.0],
            debug_overlay: false,
            fetch_workers: 2,
        }
    }
}

impl RuntimeConfig {
    /// Load a configuration file, filling missing fields with defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Log filter parsed from `log_level`, falling back to `Info`
    pub fn log_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }

    pub fn with_asset_root<P: Into<PathBuf>>(mut self, asset_root: P) -> Self {
        self.asset_root = asset_root.into();
        self
    }

    pub fn with_window(mut self, title: &str, width: u32, height: u32) -> Self {
        self.window_title = title.to_string();
        self.window_width = width;
        self.window_height = height;
        self
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn with_gravity(mut self, gravity: [f32; 3]) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_physics_timestep(mut self, timestep: f32, max_substeps: u32) -> Self {
        self.physics_timestep = timestep;
        self.max_substeps = max_substeps.max(1);
        self
    }

    pub fn with_debug_overlay(mut self, enabled: bool) -> Self {
        self.debug_overlay = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.gravity, [0.0, -9.81, 0.0]);
        assert_eq!(config.log_filter(), LevelFilter::Info);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "asset_root": "data", "debug_overlay": true }"#)
            .unwrap();
        assert_eq!(config.asset_root, PathBuf::from("data"));
        assert!(config.debug_overlay);
        assert_eq!(config.max_substeps, 5);
    }

    #[test]
    fn test_unknown_log_level_falls_back() {
        let mut config = RuntimeConfig::default();
        config.log_level = "loud".to_string();
        assert_eq!(config.log_filter(), LevelFilter::Info);

        config.log_level = "debug".to_string();
        assert_eq!(config.log_filter(), LevelFilter::Debug);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = RuntimeConfig::default()
            .with_asset_root("games/demo")
            .with_window("Demo", 800, 600)
            .with_physics_timestep(0.01, 0);
        let parsed = RuntimeConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.max_substeps, 1);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(RuntimeConfig::load("/nonexistent/lucent.json").is_err());
    }
}
