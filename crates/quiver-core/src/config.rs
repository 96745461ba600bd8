//! Display configuration surface.
//!
//! These types are pure data with serde defaults; reading and writing the
//! YAML files they live in is the viewer's job.

use serde::{Deserialize, Serialize};

/// Root display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfiguration {
    /// Width of the channel label gutter in pixels
    pub label_width_px: f32,
    /// Default channel row height in pixels
    pub default_channel_height_px: f32,
    /// Whether waveform traces render
    pub should_render_waveforms: bool,
    /// Whether spectrograms render
    pub should_render_spectrograms: bool,
    /// Modification toggles for default channels
    pub default_channel: ChannelClassConfig,
    /// Modification toggles for non-default channels
    pub non_default_channel: ChannelClassConfig,
}

impl Default for DisplayConfiguration {
    fn default() -> Self {
        Self {
            label_width_px: 120.0,
            default_channel_height_px: 76.0,
            should_render_waveforms: true,
            should_render_spectrograms: true,
            default_channel: ChannelClassConfig::default(),
            non_default_channel: ChannelClassConfig::default(),
        }
    }
}

/// Per-channel-class modification toggles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelClassConfig {
    /// Disable opening the measure window from this channel class
    pub disable_measure_window: bool,
    /// Disable signal detection dragging
    pub disable_signal_detection_modification: bool,
    /// Disable predicted phase dragging
    pub disable_predicted_phase_modification: bool,
    /// Disable mask creation and editing
    pub disable_mask_modification: bool,
}

/// Hot-key bindings, one string command list per action.
///
/// Bindings are matched against strings of the form
/// `"Shift+Ctrl+Alt+KeyName"` produced by the viewer's key converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotKeysConfig {
    /// Hold to scale amplitude by dragging on a channel
    pub amplitude_scale: Vec<String>,
    /// Reset amplitude of the hovered channel
    pub amplitude_scale_single_reset: Vec<String>,
    /// Reset amplitude of every channel
    pub amplitude_scale_reset: Vec<String>,
    /// Hold to turn the brush into a mask-create brush
    pub mask_create: Vec<String>,
}

impl Default for HotKeysConfig {
    fn default() -> Self {
        Self {
            amplitude_scale: vec!["a".into()],
            amplitude_scale_single_reset: vec!["Alt+a".into()],
            amplitude_scale_reset: vec!["Shift+Alt+a".into()],
            mask_create: vec!["m".into()],
        }
    }
}

impl HotKeysConfig {
    pub fn matches_amplitude_scale(&self, key: &str) -> bool {
        matches_binding(&self.amplitude_scale, key)
    }

    pub fn matches_amplitude_scale_single_reset(&self, key: &str) -> bool {
        matches_binding(&self.amplitude_scale_single_reset, key)
    }

    pub fn matches_amplitude_scale_reset(&self, key: &str) -> bool {
        matches_binding(&self.amplitude_scale_reset, key)
    }

    pub fn matches_mask_create(&self, key: &str) -> bool {
        matches_binding(&self.mask_create, key)
    }
}

fn matches_binding(bindings: &[String], key: &str) -> bool {
    bindings.iter().any(|binding| binding == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_permissive() {
        let config = DisplayConfiguration::default();
        assert!(config.should_render_waveforms);
        assert!(!config.default_channel.disable_mask_modification);
        assert!(config.label_width_px > 0.0);
    }

    #[test]
    fn hot_key_matching() {
        let keys = HotKeysConfig::default();
        assert!(keys.matches_mask_create("m"));
        assert!(!keys.matches_mask_create("Shift+m"));
        assert!(keys.matches_amplitude_scale_reset("Shift+Alt+a"));
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: DisplayConfiguration =
            serde_yaml::from_str("label_width_px: 90.0\n").unwrap();
        assert_eq!(config.label_width_px, 90.0);
        assert!(config.should_render_spectrograms);
    }
}
