//! Shared colors for the waveform widgets.

use iced::Color;
use quiver_core::types::Rgba;

/// Canvas background
pub const BACKGROUND: Color = Color::from_rgb(0.10, 0.10, 0.12);

/// Label gutter background
pub const LABEL_BACKGROUND: Color = Color::from_rgb(0.13, 0.13, 0.16);

/// Default waveform trace color (#4580E6)
pub const WAVEFORM_DEFAULT: Color = Color::from_rgb(0.271, 0.502, 0.902);

/// Zoom brush overlay
pub const ZOOM_BRUSH: Color = Color::from_rgba(0.588, 0.588, 0.588, 0.3);

/// Mask-create brush overlay
pub const MASK_BRUSH: Color = Color::from_rgba(0.569, 0.894, 0.592, 0.3);

/// Crosshair line
pub const CROSSHAIR: Color = Color::from_rgba(0.85, 0.85, 0.85, 0.5);

/// Time-axis tick and label color
pub const AXIS: Color = Color::from_rgba(0.7, 0.7, 0.7, 0.9);

/// Channel label text
pub const LABEL_TEXT: Color = Color::from_rgb(0.85, 0.85, 0.88);

/// Divider between station rows
pub const ROW_DIVIDER: Color = Color::from_rgba(0.3, 0.3, 0.35, 0.6);

/// Measure-window selection highlight on the source channel
pub const MEASURE_SELECTION: Color = Color::from_rgba(0.95, 0.77, 0.06, 0.25);

/// Translucency applied to mask fills
pub const MASK_ALPHA: f32 = 0.35;

/// Convert a core color to an iced color.
pub fn color(rgba: Rgba) -> Color {
    Color::from_rgba(rgba.r, rgba.g, rgba.b, rgba.a)
}

/// Convert a core color with an alpha override.
pub fn color_with_alpha(rgba: Rgba, alpha: f32) -> Color {
    Color::from_rgba(rgba.r, rgba.g, rgba.b, alpha)
}

/// Map a normalized spectrogram power to a color (dark blue → yellow).
pub fn spectrogram_color(normalized: f32) -> Color {
    let t = normalized.clamp(0.0, 1.0);
    Color::from_rgb(t, 0.2 + 0.6 * t, 0.55 * (1.0 - t) + 0.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_color_conversion_preserves_channels() {
        let converted = color(Rgba::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(converted.r, 0.1);
        assert_eq!(converted.a, 0.4);
    }

    #[test]
    fn spectrogram_color_clamps() {
        let low = spectrogram_color(-1.0);
        let high = spectrogram_color(2.0);
        assert_eq!(low.r, 0.0);
        assert_eq!(high.r, 1.0);
    }
}
