//! iced canvas widgets for the Quiver waveform workspace.
//!
//! Following the same separation as the rest of the workspace:
//!
//! - **State structs** (`ChannelRenderer`, `StationRow`, `WaveformPanel`,
//!   `WaveformDisplay`): pure data plus state-machine methods, owned by the
//!   application and mutated in its `update`
//! - **View functions** (`waveform_panel`): take state references and
//!   callback closures, return `Element<Message>`
//! - **Canvas Programs** (`PanelCanvas`): translate raw pointer/keyboard
//!   events into [`panel::PanelInput`] values published through the closure
//!
//! State-mutating operations return [`display::DisplayEvent`]s — the
//! callback sinks of the embedding application (channel clicks, drag ends,
//! measure-window updates, and so on).

pub mod channel;
pub mod display;
pub mod markers;
pub mod panel;
pub mod station;
pub mod theme;

pub use channel::ChannelRenderer;
pub use display::{DisplayEvent, RenderingContent, Toast, ToastIntent, WaveformDisplay};
pub use panel::{waveform_panel, PanelCanvas, PanelInput, WaveformPanel};
pub use station::StationRow;
