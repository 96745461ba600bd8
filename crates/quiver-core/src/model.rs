//! The waveform data model.
//!
//! These structures hold the data supplied by the surrounding application
//! for one render pass, separate from rendering logic. State that widgets
//! mutate (view range, amplitude scaling) lives in `quiver-widgets`; model
//! values are treated as immutable snapshots and are never persisted by the
//! core beyond the current pass.

use std::collections::BTreeMap;

use crate::types::{DisplayType, DistanceUnits, LineStyle, Rgba, TimeRange};

/// A station: one default channel plus zero or more non-default channels
/// that can be expanded under it.
#[derive(Debug, Clone)]
pub struct Station {
    /// Unique id of the station
    pub id: String,
    /// Display name of the station
    pub name: String,
    /// The channel shown when the station is collapsed
    pub default_channel: Channel,
    /// Additional channels shown when the station is expanded
    pub non_default_channels: Vec<Channel>,
    /// Distance from the event, for label display
    pub distance: Option<f64>,
    /// Units for the distance label
    pub distance_units: DistanceUnits,
}

impl Station {
    pub fn new(id: impl Into<String>, name: impl Into<String>, default_channel: Channel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            default_channel,
            non_default_channels: Vec::new(),
            distance: None,
            distance_units: DistanceUnits::Km,
        }
    }

    /// All channels, default first.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        std::iter::once(&self.default_channel).chain(self.non_default_channels.iter())
    }
}

/// A single waveform/spectrogram trace belonging to a station.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Unique id of the channel
    pub id: String,
    /// Display name of the channel
    pub name: String,
    /// Override row height in pixels
    pub height_px: Option<f32>,
    /// Offset applied to all of this channel's temporal data, in seconds
    pub time_offset_seconds: f64,
    /// Waveform content
    pub waveform: Option<WaveformContent>,
    /// Spectrogram content
    pub spectrogram: Option<SpectrogramContent>,
    /// Markers owned by this channel
    pub markers: Markers,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            height_px: None,
            time_offset_seconds: 0.0,
            waveform: None,
            spectrogram: None,
            markers: Markers::default(),
        }
    }
}

/// Waveform content of a channel: a keyed collection of channel segments of
/// which one (`channel_segment_id`) is active, plus overlays.
#[derive(Debug, Clone, Default)]
pub struct WaveformContent {
    /// Key of the active channel segment
    pub channel_segment_id: String,
    /// All channel segments, keyed by id
    pub channel_segments: BTreeMap<String, ChannelSegment>,
    /// Data-quality masks
    pub masks: Vec<Mask>,
    /// Signal detections
    pub signal_detections: Vec<PickMarker>,
    /// Predicted phases
    pub predicted_phases: Vec<PickMarker>,
    /// Theoretical phase windows
    pub theoretical_phase_windows: Vec<TheoreticalPhaseWindow>,
}

impl WaveformContent {
    /// The currently active channel segment, if any.
    pub fn active_segment(&self) -> Option<&ChannelSegment> {
        self.channel_segments.get(&self.channel_segment_id)
    }
}

/// A named group of one or more data segments representing one logical trace.
#[derive(Debug, Clone, Default)]
pub struct ChannelSegment {
    /// Optional description shown on the channel label
    pub description: Option<String>,
    /// Color for the description text
    pub description_label_color: Option<Rgba>,
    /// The data segments. Assumed time-ordered and non-overlapping by the
    /// caller; the core does not validate this (see DESIGN.md).
    pub data_segments: Vec<DataSegment>,
}

/// A contiguous run of samples at a fixed rate starting at a given time.
#[derive(Debug, Clone)]
pub struct DataSegment {
    /// Epoch start time in seconds
    pub start_time_secs: f64,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Trace color; falls back to the display default when `None`
    pub color: Option<Rgba>,
    /// How to draw the samples; defaults to a line
    pub display_type: Option<DisplayType>,
    /// Point size for scatter rendering
    pub point_size: Option<f32>,
    /// The raw samples
    pub data: Vec<f32>,
}

impl DataSegment {
    /// Duration implied by sample count and rate.
    pub fn duration_secs(&self) -> f64 {
        self.data.len() as f64 / self.sample_rate
    }

    /// Epoch end time implied by sample count and rate.
    pub fn end_time_secs(&self) -> f64 {
        self.start_time_secs + self.duration_secs()
    }
}

/// A time-interval annotation (e.g. a data-quality flag) overlaid on a
/// channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub id: String,
    pub start_time_secs: f64,
    pub end_time_secs: f64,
    pub color: Rgba,
}

impl Mask {
    /// Duration of the stored interval.
    pub fn duration_secs(&self) -> f64 {
        self.end_time_secs - self.start_time_secs
    }

    /// Interval used for rendering and hit-testing. Masks under one second
    /// are padded by half a second on each side so they stay clickable; the
    /// stored interval is never mutated.
    pub fn render_interval(&self) -> TimeRange {
        if self.duration_secs() < 1.0 {
            TimeRange::new(self.start_time_secs - 0.5, self.end_time_secs + 0.5)
        } else {
            TimeRange::new(self.start_time_secs, self.end_time_secs)
        }
    }
}

/// A single time-anchored visual indicator, optionally draggable within
/// constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: String,
    pub color: Rgba,
    pub line_style: LineStyle,
    /// Epoch time in seconds
    pub time_secs: f64,
    /// Minimum time the marker may be dragged to
    pub min_time_secs_constraint: Option<f64>,
    /// Maximum time the marker may be dragged to
    pub max_time_secs_constraint: Option<f64>,
}

impl Marker {
    pub fn new(id: impl Into<String>, color: Rgba, line_style: LineStyle, time_secs: f64) -> Self {
        Self {
            id: id.into(),
            color,
            line_style,
            time_secs,
            min_time_secs_constraint: None,
            max_time_secs_constraint: None,
        }
    }
}

/// A pair of mutually constraining markers defining a draggable/resizable
/// time interval.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionWindow {
    pub id: String,
    pub start_marker: Marker,
    pub end_marker: Marker,
    pub is_moveable: bool,
    pub color: Rgba,
}

/// A signal detection or predicted phase rendered as a labeled pick.
#[derive(Debug, Clone, PartialEq)]
pub struct PickMarker {
    pub id: String,
    /// Epoch time in seconds
    pub time_secs: f64,
    /// Phase label, e.g. "P" or "Pn"
    pub label: String,
    pub color: Rgba,
    /// Selected picks render with a glow
    pub is_selected: bool,
    /// Predicted phases render below the trace, detections above
    pub predicted: bool,
}

/// A labeled, non-interactive time-interval annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct TheoreticalPhaseWindow {
    pub id: String,
    pub start_time_secs: f64,
    pub end_time_secs: f64,
    pub label: String,
    pub color: Rgba,
}

/// Spectrogram content of a channel: powers over a time x frequency grid.
#[derive(Debug, Clone, Default)]
pub struct SpectrogramContent {
    /// Epoch start time in seconds
    pub start_time_secs: f64,
    /// Time step of the data columns, in seconds
    pub time_step: f64,
    /// Frequency step of the data rows, in Hz
    pub frequency_step: f64,
    /// Power per [time][frequency] cell
    pub data: Vec<Vec<f32>>,
}

/// Marker groups carried by a channel or by the panel itself.
#[derive(Debug, Clone, Default)]
pub struct Markers {
    /// Static, non-interactive markers
    pub vertical_markers: Vec<Marker>,
    /// Draggable markers with optional constraints
    pub moveable_markers: Vec<Marker>,
    /// Paired-marker selection windows
    pub selection_windows: Vec<SelectionWindow>,
}

/// The channel/time slice currently shown in the measure window.
#[derive(Debug, Clone)]
pub struct MeasureWindowSelection {
    pub station_id: String,
    pub channel: Channel,
    pub start_time_secs: f64,
    pub end_time_secs: f64,
    pub is_default_channel: bool,
}

/// Ids of the currently selected channels, signal detections, and predicted
/// phases.
#[derive(Debug, Clone, Default)]
pub struct Selections {
    pub channels: Vec<String>,
    pub signal_detections: Vec<String>,
    pub predicted_phases: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_segment_end_time_from_rate() {
        let segment = DataSegment {
            start_time_secs: 1000.0,
            sample_rate: 40.0,
            color: None,
            display_type: None,
            point_size: None,
            data: vec![0.0; 400],
        };
        assert_eq!(segment.duration_secs(), 10.0);
        assert_eq!(segment.end_time_secs(), 1010.0);
    }

    #[test]
    fn short_mask_is_padded_for_rendering_only() {
        let mask = Mask {
            id: "m1".into(),
            start_time_secs: 100.2,
            end_time_secs: 100.6,
            color: Rgba::rgb(1.0, 0.0, 0.0),
        };
        let padded = mask.render_interval();
        assert_eq!(padded.start_time_secs, 99.7);
        assert_eq!(padded.end_time_secs, 101.1);
        // stored interval untouched
        assert_eq!(mask.start_time_secs, 100.2);
        assert_eq!(mask.end_time_secs, 100.6);
    }

    #[test]
    fn long_mask_is_not_padded() {
        let mask = Mask {
            id: "m2".into(),
            start_time_secs: 100.0,
            end_time_secs: 103.0,
            color: Rgba::rgb(1.0, 0.0, 0.0),
        };
        let interval = mask.render_interval();
        assert_eq!(interval.start_time_secs, 100.0);
        assert_eq!(interval.end_time_secs, 103.0);
    }

    #[test]
    fn station_channels_default_first() {
        let mut station = Station::new("sta", "STA01", Channel::new("sta/SHZ", "SHZ"));
        station.non_default_channels.push(Channel::new("sta/SHN", "SHN"));
        let ids: Vec<&str> = station.channels().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["sta/SHZ", "sta/SHN"]);
    }
}
