//! Core domain model and computation for Quiver, a seismic-waveform
//! visualization and analyst review workspace.
//!
//! This crate is GUI-free. It provides:
//!
//! - The waveform data model (stations, channels, segments, masks, markers)
//! - Coordinate/time conversions between the four time representations
//!   (epoch seconds, fraction-of-span, GL units, viewport percent)
//! - Synthetic waveform generation for demos and tests
//! - Position-buffer construction plus a worker pool that performs it off
//!   the UI thread
//! - The shared display configuration surface (hot keys, channel-class
//!   modification toggles, layout defaults)
//!
//! Rendering and interaction live in `quiver-widgets`; the application
//! shell lives in `quiver-viewer`.

pub mod buffer;
pub mod config;
pub mod model;
pub mod pool;
pub mod synth;
pub mod types;
pub mod view;

// Re-export the items nearly every consumer needs.
pub use buffer::{build_position_buffer, CameraBounds, ChannelBounds, PositionBufferParams};
pub use config::{ChannelClassConfig, DisplayConfiguration, HotKeysConfig};
pub use pool::{BufferRequest, BufferResponse, PositionBufferPool};
pub use types::{DisplayType, DistanceUnits, LineStyle, Rgba, TimeRange};
pub use view::{left_percent, right_percent, ViewRange, ViewTransform};
