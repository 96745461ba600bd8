//! Keybindings configuration for quiver-viewer.
//!
//! Configurable keyboard shortcuts stored in YAML format.
//! Default location: ~/.config/quiver-viewer/keybindings.yaml
//!
//! These cover viewer-level commands (toggles, pan/zoom). The held
//! hotkeys that modify in-panel gestures (mask brush, amplitude scaling)
//! live in [`quiver_core::config::HotKeysConfig`] next to the display
//! configuration they belong to.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root keybindings configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeybindingsConfig {
    /// Keybindings for the waveform review view
    pub review: ReviewKeybindings,
}

/// Keybindings for the waveform review view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewKeybindings {
    /// Show/hide the measure window
    pub toggle_measure_window: Vec<String>,
    /// Cycle waveform/spectrogram rendering
    pub toggle_rendering_content: Vec<String>,
    /// Force a refresh and redraw
    pub refresh: Vec<String>,
    /// Reset to the default zoom window
    pub reset_zoom: Vec<String>,
    /// Pan the view left
    pub pan_left: Vec<String>,
    /// Pan the view right
    pub pan_right: Vec<String>,
    /// Zoom in on the view center
    pub zoom_in: Vec<String>,
    /// Zoom out from the view center
    pub zoom_out: Vec<String>,
}

impl Default for ReviewKeybindings {
    fn default() -> Self {
        Self {
            toggle_measure_window: vec!["w".into()],
            toggle_rendering_content: vec!["t".into()],
            refresh: vec!["F5".into()],
            reset_zoom: vec!["Space".into()],
            pan_left: vec!["Left".into()],
            pan_right: vec!["Right".into()],
            zoom_in: vec!["Up".into()],
            zoom_out: vec!["Down".into()],
        }
    }
}

impl ReviewKeybindings {
    pub fn matches_toggle_measure_window(&self, key: &str) -> bool {
        self.toggle_measure_window.iter().any(|b| b == key)
    }

    pub fn matches_toggle_rendering_content(&self, key: &str) -> bool {
        self.toggle_rendering_content.iter().any(|b| b == key)
    }

    pub fn matches_refresh(&self, key: &str) -> bool {
        self.refresh.iter().any(|b| b == key)
    }

    pub fn matches_reset_zoom(&self, key: &str) -> bool {
        self.reset_zoom.iter().any(|b| b == key)
    }

    pub fn matches_pan_left(&self, key: &str) -> bool {
        self.pan_left.iter().any(|b| b == key)
    }

    pub fn matches_pan_right(&self, key: &str) -> bool {
        self.pan_right.iter().any(|b| b == key)
    }

    pub fn matches_zoom_in(&self, key: &str) -> bool {
        self.zoom_in.iter().any(|b| b == key)
    }

    pub fn matches_zoom_out(&self, key: &str) -> bool {
        self.zoom_out.iter().any(|b| b == key)
    }
}

/// Get the default keybindings file path.
///
/// Returns: ~/.config/quiver-viewer/keybindings.yaml
pub fn default_keybindings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("quiver-viewer")
        .join("keybindings.yaml")
}

/// Load keybindings from a YAML file.
///
/// If the file doesn't exist, returns default keybindings. If the file
/// exists but is invalid, logs a warning and returns defaults.
pub fn load_keybindings(path: &Path) -> KeybindingsConfig {
    log::info!("load_keybindings: loading from {:?}", path);

    if !path.exists() {
        log::info!("load_keybindings: file doesn't exist, using defaults");
        return KeybindingsConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<KeybindingsConfig>(&contents) {
            Ok(config) => {
                log::info!("load_keybindings: loaded custom keybindings");
                config
            }
            Err(e) => {
                log::warn!("load_keybindings: failed to parse: {}, using defaults", e);
                KeybindingsConfig::default()
            }
        },
        Err(e) => {
            log::warn!("load_keybindings: failed to read file: {}, using defaults", e);
            KeybindingsConfig::default()
        }
    }
}

/// Save keybindings to a YAML file.
pub fn save_keybindings(config: &KeybindingsConfig, path: &Path) -> anyhow::Result<()> {
    log::info!("save_keybindings: saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(path, yaml)?;

    log::info!("save_keybindings: saved successfully");
    Ok(())
}

/// Convert an iced keyboard key + modifiers to a string for matching.
///
/// Format: "Shift+Ctrl+Alt+KeyName"
pub fn key_to_string(key: &iced::keyboard::Key, modifiers: &iced::keyboard::Modifiers) -> String {
    use iced::keyboard::{key::Named, Key};

    let mut parts = Vec::new();
    if modifiers.shift() {
        parts.push("Shift");
    }
    if modifiers.control() {
        parts.push("Ctrl");
    }
    if modifiers.alt() {
        parts.push("Alt");
    }

    let key_name = match key {
        Key::Named(named) => match named {
            Named::Space => "Space".to_string(),
            Named::ArrowUp => "Up".to_string(),
            Named::ArrowDown => "Down".to_string(),
            Named::ArrowLeft => "Left".to_string(),
            Named::ArrowRight => "Right".to_string(),
            Named::Enter => "Enter".to_string(),
            Named::Escape => "Escape".to_string(),
            Named::Tab => "Tab".to_string(),
            Named::Backspace => "Backspace".to_string(),
            Named::Delete => "Delete".to_string(),
            Named::Home => "Home".to_string(),
            Named::End => "End".to_string(),
            Named::PageUp => "PageUp".to_string(),
            Named::PageDown => "PageDown".to_string(),
            Named::F1 => "F1".to_string(),
            Named::F2 => "F2".to_string(),
            Named::F3 => "F3".to_string(),
            Named::F4 => "F4".to_string(),
            Named::F5 => "F5".to_string(),
            Named::F6 => "F6".to_string(),
            Named::F7 => "F7".to_string(),
            Named::F8 => "F8".to_string(),
            Named::F9 => "F9".to_string(),
            Named::F10 => "F10".to_string(),
            Named::F11 => "F11".to_string(),
            Named::F12 => "F12".to_string(),
            _ => return String::new(), // ignore other named keys
        },
        Key::Character(c) => c.to_string(),
        _ => return String::new(),
    };

    if parts.is_empty() {
        key_name
    } else {
        parts.push(&key_name);
        parts.join("+")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keybindings() {
        let config = KeybindingsConfig::default();
        assert!(config.review.toggle_measure_window.contains(&"w".to_string()));
        assert!(config.review.pan_left.contains(&"Left".to_string()));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = KeybindingsConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: KeybindingsConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.review.refresh, config.review.refresh);
    }

    #[test]
    fn test_key_to_string() {
        use iced::keyboard::{Key, Modifiers};
        let key = Key::Character("m".into());
        assert_eq!(key_to_string(&key, &Modifiers::empty()), "m");
        assert_eq!(key_to_string(&key, &Modifiers::SHIFT), "Shift+m");
    }

    #[test]
    fn test_match_bindings() {
        let bindings = ReviewKeybindings::default();
        assert!(bindings.matches_reset_zoom("Space"));
        assert!(!bindings.matches_reset_zoom("Shift+Space"));
        assert!(bindings.matches_refresh("F5"));
    }
}
