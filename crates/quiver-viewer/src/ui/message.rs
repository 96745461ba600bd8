//! Application messages for quiver-viewer.

use iced::keyboard::{Key, Modifiers};
use quiver_widgets::PanelInput;

/// Messages that can be dispatched in the viewer.
#[derive(Debug, Clone)]
pub enum Message {
    /// Periodic UI update: drains worker responses, polls deferred
    /// clicks, expires toasts
    Tick,
    /// Interaction on the main waveform panel
    Panel(PanelInput),
    /// Interaction on the measure-window panel
    Measure(PanelInput),
    /// Keyboard press, raw iced form
    KeyPressed(Key, Modifiers),
    /// Keyboard release, raw iced form
    KeyReleased(Key, Modifiers),

    // Toolbar commands
    ToggleMeasureWindow,
    ToggleRenderingContent,
    Refresh,
    ResetZoom,

    // Measure-window divider drag
    DividerPressed,
    DividerMoved(iced::Point),
    DividerReleased,
}
