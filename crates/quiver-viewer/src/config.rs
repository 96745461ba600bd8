//! Viewer configuration.
//!
//! Stored as YAML in the user's config directory.
//! Default location: ~/.config/quiver-viewer/config.yaml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use quiver_core::config::{DisplayConfiguration, HotKeysConfig};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Display settings (label width, channel heights, class toggles)
    pub display: DisplayConfiguration,
    /// Held-hotkey bindings for in-panel gestures
    pub hot_keys: HotKeysConfig,
    /// Demo data settings
    pub demo: DemoConfig,
}

/// Settings for the synthetic demo data set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of demo stations
    pub station_count: usize,
    /// Span of the demo recording in seconds
    pub duration_secs: f64,
    /// Sample rate of the demo channels in Hz
    pub sample_rate: f64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            station_count: 4,
            duration_secs: 1800.0,
            sample_rate: 20.0,
        }
    }
}

/// Get the default config file path.
///
/// Returns: ~/.config/quiver-viewer/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("quiver-viewer")
        .join("config.yaml")
}

/// Load configuration from a YAML file.
///
/// If the file doesn't exist, returns the default config. If the file
/// exists but is invalid, logs a warning and returns the default config.
pub fn load_config(path: &Path) -> ViewerConfig {
    log::info!("load_config: loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: config file doesn't exist, using defaults");
        return ViewerConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<ViewerConfig>(&contents) {
            Ok(config) => {
                log::info!(
                    "load_config: loaded config - {} stations, label width {}",
                    config.demo.station_count,
                    config.display.label_width_px
                );
                config
            }
            Err(e) => {
                log::warn!("load_config: failed to parse config: {}, using defaults", e);
                ViewerConfig::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: failed to read config file: {}, using defaults", e);
            ViewerConfig::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories if they
/// don't exist.
pub fn save_config(config: &ViewerConfig, path: &Path) -> Result<()> {
    log::info!("save_config: saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: config saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ViewerConfig::default();
        assert_eq!(config.demo.station_count, 4);
        assert_eq!(config.demo.sample_rate, 20.0);
        assert!(config.display.should_render_waveforms);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = ViewerConfig::default();
        config.demo.station_count = 7;
        config.display.label_width_px = 150.0;

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: ViewerConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.demo.station_count, 7);
        assert_eq!(parsed.display.label_width_px, 150.0);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Path::new("/nonexistent/quiver/config.yaml"));
        assert_eq!(config.demo.station_count, 4);
    }
}
