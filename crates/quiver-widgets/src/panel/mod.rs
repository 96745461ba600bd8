//! The waveform panel: viewport controller and interaction state machine.
//!
//! The panel owns the authoritative [`ViewRange`] — the single source of
//! truth for what is on screen — and every operation that mutates it:
//! zoom, anchored wheel zoom, pan, brush gestures, and the double-click
//! reset. It also owns the station rows (a registry of channel renderers
//! the draw pass iterates) and the in-flight drag sessions for markers,
//! selection windows, picks, and amplitude scaling.
//!
//! Interaction arrives as [`PanelInput`] values published by the canvas;
//! [`WaveformPanel::on_input`] runs the state machine synchronously and
//! returns the [`DisplayEvent`]s the host application consumes. View-range
//! mutations are immediately consistent for subsequent coordinate lookups;
//! painting is deferred to the next frame by the runtime.

mod canvas;

pub use canvas::{waveform_panel, PanelCanvas, PanelInteraction, AXIS_HEIGHT_PX};

use std::time::{Duration, Instant};

use quiver_core::config::DisplayConfiguration;
use quiver_core::model::{Marker, Markers, MeasureWindowSelection, Selections, Station};
use quiver_core::pool::{BufferResponse, PositionBufferPool};
use quiver_core::types::TimeRange;
use quiver_core::view::{ViewRange, ViewTransform};

use crate::channel::{GL_UNITS_MAX, GL_UNITS_MIN};
use crate::display::DisplayEvent;
use crate::markers::{MarkerDrag, WindowDrag, PICK_DRAG_THRESHOLD_PX, WINDOW_CLICK_THRESHOLD_SECS};
use crate::station::StationRow;

/// Minimum committed view-range span.
pub const MIN_ZOOM_SPAN: f64 = 0.001;

/// Once the span rounds to at or below this at four decimals, further
/// zoom-in is refused.
pub const MAX_ZOOM_SPAN: f64 = 0.0005;

/// Wheel zoom/pan step, as a fraction of the current range.
pub const WHEEL_STEP: f64 = 0.4;

/// Pointer travel (fraction of the view) that turns a press into a brush.
pub const BRUSH_THRESHOLD_FRAC: f64 = 0.01;

/// Single clicks are deferred this long so a double-click can suppress them.
pub const DOUBLE_CLICK_DELAY: Duration = Duration::from_millis(600);

/// Pixel tolerance for hitting markers and picks.
const HIT_TOLERANCE_PX: f32 = 4.0;

/// The two brush modes plus the measure-window selection gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushType {
    /// Ctrl/cmd-drag: zoom to the brushed range
    Zoom,
    /// Hotkey-drag: create a mask over the brushed range
    CreateMask,
    /// Shift-drag on a channel: select a slice for the measure window
    Measure,
}

/// An in-flight brush stroke.
#[derive(Debug, Clone)]
pub struct BrushStroke {
    pub brush: BrushType,
    /// Where the press landed, in viewport fraction
    pub start_view_x: f64,
    pub current_view_x: f64,
    /// True once the pointer traveled past the movement threshold
    pub painting: bool,
    /// The channel the gesture started on, when any
    pub channel: Option<ChannelRef>,
}

/// Identifies a channel row within the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub station_idx: usize,
    pub channel_id: String,
    pub is_default: bool,
}

/// What the pointer landed on.
#[derive(Debug, Clone, PartialEq)]
pub enum HitTarget {
    /// The label gutter of a channel row
    Label(ChannelRef),
    /// The waveform area of a channel row
    Channel { channel: ChannelRef, time_secs: f64 },
    /// A moveable marker (standalone or a selection-window edge)
    MoveableMarker {
        marker_id: String,
        window_id: Option<String>,
    },
    /// The body of a selection window
    SelectionWindow { window_id: String, time_secs: f64 },
    /// A pick marker on a channel
    Pick {
        channel: ChannelRef,
        pick_id: String,
        predicted: bool,
    },
    /// One or more masks under the pointer
    Masks {
        channel: ChannelRef,
        mask_ids: Vec<String>,
        time_secs: f64,
    },
}

/// Raw interaction published by the panel canvas.
#[derive(Debug, Clone)]
pub enum PanelInput {
    Pressed {
        view_x: f64,
        x_px: f32,
        y_px: f32,
        ctrl_or_cmd: bool,
        shift: bool,
        hit: Option<HitTarget>,
    },
    Moved {
        view_x: f64,
        x_px: f32,
        y_px: f32,
    },
    Released {
        view_x: f64,
    },
    DoubleClicked,
    Wheel {
        ctrl_or_cmd: bool,
        shift: bool,
        zoom_in: bool,
        anchor_view_x: f64,
    },
}

/// A deferred single click awaiting double-click suppression.
#[derive(Debug, Clone)]
struct PendingClick {
    armed_at: Instant,
    channel: ChannelRef,
    time_secs: f64,
}

/// Drag session for a pick marker.
#[derive(Debug, Clone)]
struct PickDrag {
    channel: ChannelRef,
    pick_id: String,
    predicted: bool,
    start_x_px: f32,
    current_view_x: f64,
    dragging: bool,
}

/// Drag session for amplitude scaling on one channel.
#[derive(Debug, Clone)]
struct AmplitudeDrag {
    channel: ChannelRef,
    last_y_px: f32,
}

/// Geometry of one visible channel row.
#[derive(Debug, Clone)]
pub struct RowLayout {
    pub channel: ChannelRef,
    pub y: f32,
    pub height: f32,
}

/// Custom label renderer: maps a station row and channel to the text shown
/// in the label gutter, overriding the default station/channel labels.
pub type LabelFormatter = fn(&StationRow, is_default: bool, channel_name: &str) -> String;

/// The waveform panel state.
pub struct WaveformPanel {
    /// Scope prefix for pool requests ("main" or "measure")
    scope: String,
    /// The display's full time range (already offset-extended)
    pub time_range: TimeRange,
    /// The range restored by a double-click
    pub default_zoom: TimeRange,
    /// The visible slice, in fractions of `time_range`
    pub view_range: ViewRange,
    pub rows: Vec<StationRow>,
    /// Panel-level markers spanning every row
    pub markers: Markers,
    /// Host-supplied selections
    pub selections: Selections,
    /// Optional custom label renderer for the label gutter
    pub custom_label: Option<LabelFormatter>,

    brush: Option<BrushStroke>,
    pending_click: Option<PendingClick>,
    marker_drag: Option<MarkerDrag>,
    window_drag: Option<(WindowDrag, f64)>,
    pick_drag: Option<PickDrag>,
    amplitude_drag: Option<AmplitudeDrag>,
    press_position: Option<(f32, f32)>,
    moved_since_press: bool,

    /// Crosshair position in viewport fraction, for drawing
    pub cursor_view_x: Option<f64>,
    last_cursor_y_px: Option<f32>,

    // hotkey states, maintained by the display from key events
    pub mask_hotkey_down: bool,
    pub amplitude_hotkey_down: bool,
    pub brushes_disabled: bool,
}

impl WaveformPanel {
    pub fn new(
        scope: &str,
        stations: Vec<Station>,
        time_range: TimeRange,
        default_zoom: Option<TimeRange>,
        markers: Markers,
    ) -> Self {
        let rows = stations
            .into_iter()
            .map(|station| StationRow::new(scope, station))
            .collect();
        Self {
            scope: scope.to_string(),
            time_range,
            default_zoom: default_zoom.unwrap_or(time_range),
            view_range: ViewRange::default(),
            rows,
            markers,
            selections: Selections::default(),
            custom_label: None,
            brush: None,
            pending_click: None,
            marker_drag: None,
            window_drag: None,
            pick_drag: None,
            amplitude_drag: None,
            press_position: None,
            moved_since_press: false,
            cursor_view_x: None,
            last_cursor_y_px: None,
            mask_hotkey_down: false,
            amplitude_hotkey_down: false,
            brushes_disabled: false,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The per-render-pass coordinate transform.
    pub fn transform(&self) -> ViewTransform {
        ViewTransform::new(self.time_range, self.view_range, GL_UNITS_MIN, GL_UNITS_MAX)
    }

    /// The visible time range in seconds.
    pub fn current_view_range_secs(&self) -> TimeRange {
        self.transform().visible_time_range()
    }

    /// The in-flight brush stroke, for drawing.
    pub fn brush(&self) -> Option<&BrushStroke> {
        self.brush.as_ref()
    }

    /// The in-flight marker drag, for drawing the live position.
    pub fn marker_drag(&self) -> Option<&MarkerDrag> {
        self.marker_drag.as_ref()
    }

    /// The in-flight window drag, for drawing the live positions.
    pub fn window_drag(&self) -> Option<&WindowDrag> {
        self.window_drag.as_ref().map(|(drag, _)| drag)
    }

    /// The in-flight pick drag indicator position, when dragging.
    pub fn pick_drag_view_x(&self) -> Option<f64> {
        self.pick_drag
            .as_ref()
            .filter(|drag| drag.dragging)
            .map(|drag| drag.current_view_x)
    }

    // ------------------------------------------------------------------
    // View-range operations
    // ------------------------------------------------------------------

    /// Commit a view range. Bounds are clamped to [0, 1] and the span is
    /// held at or above [`MIN_ZOOM_SPAN`].
    pub fn zoom(&mut self, start: f64, end: f64) {
        let mut start = start.clamp(0.0, 1.0);
        let mut end = end.clamp(0.0, 1.0);
        if end - start < MIN_ZOOM_SPAN {
            end = start + MIN_ZOOM_SPAN;
            if end > 1.0 {
                end = 1.0;
                start = 1.0 - MIN_ZOOM_SPAN;
            }
        }
        self.view_range = ViewRange::new(start, end);
    }

    /// Zoom in/out by `zoom_pct` of the current range, anchored at
    /// viewport fraction `x`. Negative percentages zoom in.
    pub fn zoom_by_percentage_to_point(&mut self, zoom_pct: f64, x: f64) {
        let range = self.view_range.span();
        let zoom = (range * zoom_pct) / 2.0;
        let left = self.view_range.left - zoom * x;
        let right = self.view_range.right + zoom * (1.0 - x);
        self.zoom(left, right);
    }

    /// Shift both bounds by `pct` of the current range.
    pub fn pan_by_percentage(&mut self, pct: f64) {
        let delta = self.view_range.span() * pct;
        self.zoom(self.view_range.left + delta, self.view_range.right + delta);
    }

    /// True once the span, rounded to four decimals, is at or below the
    /// max-zoom threshold.
    pub fn has_reached_max_zoom(&self) -> bool {
        round4(self.view_range.right) - round4(self.view_range.left) <= MAX_ZOOM_SPAN
    }

    /// Zoom to a time window given in seconds, clamped to the display range.
    pub fn zoom_to_time_window(&mut self, start_time_secs: f64, end_time_secs: f64) {
        let span = self.time_range.duration_secs();
        let to_fraction = |time: f64| ((time - self.time_range.start_time_secs) / span).clamp(0.0, 1.0);
        self.zoom(to_fraction(start_time_secs), to_fraction(end_time_secs));
    }

    /// Restore the default zoom window.
    pub fn reset_zoom(&mut self) {
        self.zoom_to_time_window(
            self.default_zoom.start_time_secs,
            self.default_zoom.end_time_secs,
        );
    }

    /// Virtual content width backing the host scrollbar: the canvas width
    /// scaled up by the zoom factor, plus the label gutter.
    pub fn content_width(&self, canvas_width: f32, label_width: f32) -> f32 {
        if self.view_range.left == 0.0 && self.view_range.right == 1.0 {
            canvas_width + label_width
        } else {
            canvas_width / self.view_range.span() as f32 + label_width
        }
    }

    /// Scroll offset matching [`content_width`](Self::content_width).
    pub fn scroll_left(&self, canvas_width: f32, label_width: f32) -> f32 {
        self.view_range.left as f32 * (self.content_width(canvas_width, label_width) - label_width)
    }

    // ------------------------------------------------------------------
    // Layout and hit-testing
    // ------------------------------------------------------------------

    /// Geometry of every visible channel row, top to bottom.
    pub fn layout_rows(&self, config: &DisplayConfiguration) -> Vec<RowLayout> {
        let mut layouts = Vec::new();
        let mut y = 0.0f32;
        for (station_idx, row) in self.rows.iter().enumerate() {
            for (channel, _, is_default) in row.visible_channels() {
                let height = channel
                    .height_px
                    .unwrap_or(config.default_channel_height_px);
                layouts.push(RowLayout {
                    channel: ChannelRef {
                        station_idx,
                        channel_id: channel.id.clone(),
                        is_default,
                    },
                    y,
                    height,
                });
                y += height;
            }
        }
        layouts
    }

    /// Total height of the channel rows (excluding the time axis).
    pub fn rows_height(&self, config: &DisplayConfiguration) -> f32 {
        self.layout_rows(config).last().map_or(0.0, |r| r.y + r.height)
    }

    /// What lies under a canvas-space point.
    pub fn hit_test(
        &self,
        config: &DisplayConfiguration,
        bounds_width: f32,
        x_px: f32,
        y_px: f32,
    ) -> Option<HitTarget> {
        let layouts = self.layout_rows(config);
        let row = layouts
            .iter()
            .find(|row| y_px >= row.y && y_px < row.y + row.height);

        let label_width = config.label_width_px;
        if x_px < label_width {
            return row.map(|row| HitTarget::Label(row.channel.clone()));
        }

        let area_width = (bounds_width - label_width).max(1.0);
        let view_x = ((x_px - label_width) / area_width) as f64;
        let transform = self.transform();
        let fraction = transform.fraction_of_view_x(view_x);
        let time_secs = transform.time_at_fraction(fraction);
        let percent = fraction * 100.0;
        let tolerance_pct =
            (HIT_TOLERANCE_PX / area_width) as f64 * self.view_range.span() * 100.0;

        // panel-level moveable markers and window edges take priority
        for marker in &self.markers.moveable_markers {
            if (marker_percent(marker, self.time_range) - percent).abs() <= tolerance_pct {
                return Some(HitTarget::MoveableMarker {
                    marker_id: marker.id.clone(),
                    window_id: None,
                });
            }
        }
        for window in &self.markers.selection_windows {
            if !window.is_moveable {
                continue;
            }
            for marker in [&window.start_marker, &window.end_marker] {
                if (marker_percent(marker, self.time_range) - percent).abs() <= tolerance_pct {
                    return Some(HitTarget::MoveableMarker {
                        marker_id: marker.id.clone(),
                        window_id: Some(window.id.clone()),
                    });
                }
            }
        }
        for window in &self.markers.selection_windows {
            let start = marker_percent(&window.start_marker, self.time_range);
            let end = marker_percent(&window.end_marker, self.time_range);
            if percent > start && percent < end {
                return Some(HitTarget::SelectionWindow {
                    window_id: window.id.clone(),
                    time_secs,
                });
            }
        }

        let row = row?;
        let station_row = &self.rows[row.channel.station_idx];
        let (channel, _) = station_row.channel_by_id(&row.channel.channel_id)?;
        let offset = channel.time_offset_seconds;

        if let Some(waveform) = &channel.waveform {
            for pick in waveform
                .signal_detections
                .iter()
                .chain(waveform.predicted_phases.iter())
            {
                let pick_percent = quiver_core::view::left_percent(
                    pick.time_secs + offset,
                    self.time_range.start_time_secs,
                    self.time_range.end_time_secs,
                );
                if (pick_percent - percent).abs() <= tolerance_pct {
                    return Some(HitTarget::Pick {
                        channel: row.channel.clone(),
                        pick_id: pick.id.clone(),
                        predicted: pick.predicted,
                    });
                }
            }

            let mask_ids: Vec<String> = waveform
                .masks
                .iter()
                .filter(|mask| {
                    let interval = mask.render_interval();
                    time_secs - offset >= interval.start_time_secs
                        && time_secs - offset <= interval.end_time_secs
                })
                .map(|mask| mask.id.clone())
                .collect();
            if !mask_ids.is_empty() {
                return Some(HitTarget::Masks {
                    channel: row.channel.clone(),
                    mask_ids,
                    time_secs,
                });
            }
        }

        Some(HitTarget::Channel {
            channel: row.channel.clone(),
            time_secs,
        })
    }

    // ------------------------------------------------------------------
    // Buffer plumbing
    // ------------------------------------------------------------------

    /// Re-request position buffers for every visible channel.
    pub fn request_buffers(&mut self, pool: &PositionBufferPool) {
        let display = self.time_range;
        for row in &mut self.rows {
            row.request_buffers(display, pool);
        }
    }

    /// Route a worker response to its channel. Returns true when this
    /// panel owned the response.
    pub fn apply_response(&mut self, response: BufferResponse) -> bool {
        if !response.channel_id.starts_with(&format!("{}:", self.scope)) {
            return false;
        }
        for row in &mut self.rows {
            if let Some(renderer) = row.renderer_by_scoped_id(&response.channel_id) {
                renderer.apply_response(response);
                return true;
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Interaction state machine
    // ------------------------------------------------------------------

    /// Feed one input through the state machine. `now` is passed in so the
    /// click-deferral window is testable.
    pub fn on_input(
        &mut self,
        input: PanelInput,
        config: &DisplayConfiguration,
        pool: &PositionBufferPool,
        now: Instant,
    ) -> Vec<DisplayEvent> {
        match input {
            PanelInput::Pressed {
                view_x,
                x_px,
                y_px,
                ctrl_or_cmd,
                shift,
                hit,
            } => self.on_pressed(view_x, x_px, y_px, ctrl_or_cmd, shift, hit, config, pool),
            PanelInput::Moved { view_x, x_px, y_px } => {
                self.on_moved(view_x, x_px, y_px);
                Vec::new()
            }
            PanelInput::Released { view_x } => self.on_released(view_x, now),
            PanelInput::DoubleClicked => {
                self.pending_click = None;
                self.press_position = None;
                self.reset_zoom();
                Vec::new()
            }
            PanelInput::Wheel {
                ctrl_or_cmd,
                shift,
                zoom_in,
                anchor_view_x,
            } => self.on_wheel(ctrl_or_cmd, shift, zoom_in, anchor_view_x),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_pressed(
        &mut self,
        view_x: f64,
        x_px: f32,
        y_px: f32,
        ctrl_or_cmd: bool,
        shift: bool,
        hit: Option<HitTarget>,
        config: &DisplayConfiguration,
        pool: &PositionBufferPool,
    ) -> Vec<DisplayEvent> {
        let mut events = Vec::new();
        self.press_position = Some((x_px, y_px));
        self.moved_since_press = false;
        let visible = self.current_view_range_secs();

        match hit {
            Some(HitTarget::Label(channel_ref)) => {
                let row = &mut self.rows[channel_ref.station_idx];
                events.push(DisplayEvent::ChannelLabelClicked {
                    station_id: row.station.id.clone(),
                    channel_id: channel_ref.channel_id.clone(),
                });
                if channel_ref.is_default && row.is_expandable() {
                    let (expanded, default_channel_id) =
                        (row.toggle_expansion(), row.station.default_channel.id.clone());
                    if expanded {
                        // newly revealed channels need buffers
                        row.request_buffers(self.time_range, pool);
                        events.push(DisplayEvent::ChannelExpanded {
                            channel_id: default_channel_id,
                        });
                    } else {
                        events.push(DisplayEvent::ChannelCollapsed {
                            channel_id: default_channel_id,
                        });
                    }
                }
            }
            Some(HitTarget::MoveableMarker { marker_id, window_id }) => {
                if let Some(session) = self.begin_marker_drag(&marker_id, window_id.as_deref(), visible)
                {
                    self.marker_drag = Some(session);
                }
            }
            Some(HitTarget::SelectionWindow { window_id, time_secs }) => {
                if let Some(window) = self
                    .markers
                    .selection_windows
                    .iter()
                    .find(|w| w.id == window_id)
                {
                    if window.is_moveable {
                        self.window_drag =
                            Some((WindowDrag::begin(window, self.time_range, visible), view_x));
                    } else {
                        events.push(DisplayEvent::SelectionWindowClicked {
                            window: window.clone(),
                            time_secs,
                        });
                    }
                }
            }
            Some(HitTarget::Pick {
                channel,
                pick_id,
                predicted,
            }) => {
                let class = if channel.is_default {
                    &config.default_channel
                } else {
                    &config.non_default_channel
                };
                let disabled = if predicted {
                    class.disable_predicted_phase_modification
                } else {
                    class.disable_signal_detection_modification
                };
                if disabled {
                    events.push(DisplayEvent::notify_warning(if predicted {
                        "Predicted phase modification is disabled"
                    } else {
                        "Signal detection modification is disabled"
                    }));
                } else {
                    self.pick_drag = Some(PickDrag {
                        channel,
                        pick_id,
                        predicted,
                        start_x_px: x_px,
                        current_view_x: view_x,
                        dragging: false,
                    });
                }
            }
            Some(HitTarget::Masks {
                channel,
                mask_ids,
                time_secs,
            }) => {
                events.push(DisplayEvent::MaskClicked {
                    channel_id: channel.channel_id.clone(),
                    mask_ids,
                    mask_create_hotkey: self.mask_hotkey_down,
                });
                // a mask is still part of the waveform: the press may grow
                // into a brush or a deferred channel click
                self.begin_channel_press(view_x, ctrl_or_cmd, shift, channel, time_secs, config, &mut events);
            }
            Some(HitTarget::Channel { channel, time_secs }) => {
                if self.amplitude_hotkey_down {
                    self.amplitude_drag = Some(AmplitudeDrag {
                        channel,
                        last_y_px: y_px,
                    });
                } else {
                    self.begin_channel_press(view_x, ctrl_or_cmd, shift, channel, time_secs, config, &mut events);
                }
            }
            None => {}
        }
        events
    }

    /// Shared press handling for the waveform area: decides whether this
    /// press starts a brush and stages the deferred click payload.
    #[allow(clippy::too_many_arguments)]
    fn begin_channel_press(
        &mut self,
        view_x: f64,
        ctrl_or_cmd: bool,
        shift: bool,
        channel: ChannelRef,
        time_secs: f64,
        config: &DisplayConfiguration,
        events: &mut Vec<DisplayEvent>,
    ) {
        self.pending_click = Some(PendingClick {
            armed_at: Instant::now(),
            channel: channel.clone(),
            time_secs,
        });

        if self.brushes_disabled {
            return;
        }

        let class = if channel.is_default {
            &config.default_channel
        } else {
            &config.non_default_channel
        };

        let brush = if ctrl_or_cmd {
            Some(BrushType::Zoom)
        } else if self.mask_hotkey_down {
            if class.disable_mask_modification {
                events.push(DisplayEvent::notify_warning("Mask modification is disabled"));
                None
            } else {
                if self.selections.channels.is_empty() {
                    events.push(DisplayEvent::SelectChannel {
                        channel_id: channel.channel_id.clone(),
                    });
                }
                Some(BrushType::CreateMask)
            }
        } else if shift {
            if class.disable_measure_window {
                events.push(DisplayEvent::notify_warning("Measure window is disabled"));
                None
            } else {
                Some(BrushType::Measure)
            }
        } else {
            None
        };

        if let Some(brush) = brush {
            self.brush = Some(BrushStroke {
                brush,
                start_view_x: view_x,
                current_view_x: view_x,
                painting: false,
                channel: Some(channel),
            });
        }
    }

    fn on_moved(&mut self, view_x: f64, x_px: f32, y_px: f32) {
        self.cursor_view_x = Some(view_x);
        self.last_cursor_y_px = Some(y_px);

        if let Some((press_x, press_y)) = self.press_position {
            if (x_px - press_x).abs() > 1.0 || (y_px - press_y).abs() > 1.0 {
                self.moved_since_press = true;
            }
        }

        // marker drag
        if self.marker_drag.is_some() {
            let raw_percent = {
                let transform = self.transform();
                transform.fraction_of_view_x(view_x) * 100.0
            };
            if let Some(session) = &mut self.marker_drag {
                session.drag_to(raw_percent);
            }
            return;
        }

        // whole-window drag
        if let Some((mut drag, last_x)) = self.window_drag.take() {
            let delta_view = view_x - last_x;
            let delta_percent = delta_view * self.view_range.span() * 100.0;
            let delta_secs = delta_view * self.current_view_range_secs().duration_secs();
            if !drag.dragging && delta_secs.abs() > WINDOW_CLICK_THRESHOLD_SECS {
                drag.dragging = true;
            }
            let next_anchor = if drag.dragging {
                if drag.shift_by(delta_percent) {
                    view_x
                } else {
                    // rejected: snap back, keep the original anchor
                    last_x
                }
            } else {
                last_x
            };
            self.window_drag = Some((drag, next_anchor));
            return;
        }

        // pick drag
        if let Some(drag) = &mut self.pick_drag {
            if (x_px - drag.start_x_px).abs() > PICK_DRAG_THRESHOLD_PX {
                drag.dragging = true;
            }
            if drag.dragging {
                drag.current_view_x = view_x;
            }
            return;
        }

        // amplitude drag
        if let Some(drag) = self.amplitude_drag.take() {
            let delta = drag.last_y_px - y_px;
            let scoped = format!("{}:{}", self.scope, drag.channel.channel_id);
            if let Some(renderer) =
                self.rows[drag.channel.station_idx].renderer_by_scoped_id(&scoped)
            {
                renderer.scale_amplitude(delta);
            }
            self.amplitude_drag = Some(AmplitudeDrag {
                last_y_px: y_px,
                ..drag
            });
            return;
        }

        // brush painting
        if let Some(brush) = &mut self.brush {
            if (view_x - brush.start_view_x).abs() > BRUSH_THRESHOLD_FRAC {
                brush.painting = true;
            }
            if brush.painting {
                brush.current_view_x = view_x;
            }
        }
    }

    fn on_released(&mut self, view_x: f64, now: Instant) -> Vec<DisplayEvent> {
        let mut events = Vec::new();
        self.amplitude_drag = None;
        let pressed = self.press_position.take();

        if let Some(session) = self.marker_drag.take() {
            let time_secs = session.time_secs(self.time_range);
            if let Some(event) = self.commit_marker(&session.marker_id, time_secs) {
                events.push(event);
            }
            self.pending_click = None;
            return events;
        }

        if let Some((drag, _)) = self.window_drag.take() {
            if drag.dragging {
                let (start, end) = drag.times(self.time_range);
                if let Some(event) = self.commit_window(&drag.window_id, start, end) {
                    events.push(event);
                }
            } else if let Some(window) = self
                .markers
                .selection_windows
                .iter()
                .find(|w| w.id == drag.window_id)
            {
                events.push(DisplayEvent::SelectionWindowClicked {
                    window: window.clone(),
                    time_secs: self.transform().time_for_view_x(view_x),
                });
            }
            self.pending_click = None;
            return events;
        }

        if let Some(drag) = self.pick_drag.take() {
            if drag.dragging {
                let time_secs = self.transform().time_for_view_x(drag.current_view_x);
                if let Some(event) =
                    self.commit_pick(&drag.channel, &drag.pick_id, drag.predicted, time_secs)
                {
                    events.push(event);
                }
            } else if drag.predicted {
                events.push(DisplayEvent::PredictedPhaseClicked {
                    id: drag.pick_id.clone(),
                });
            } else {
                events.push(DisplayEvent::SignalDetectionClicked {
                    id: drag.pick_id.clone(),
                });
            }
            self.pending_click = None;
            return events;
        }

        if let Some(brush) = self.brush.take() {
            if brush.painting {
                self.pending_click = None;
                let (lo, hi) = if brush.start_view_x <= brush.current_view_x {
                    (brush.start_view_x, brush.current_view_x)
                } else {
                    (brush.current_view_x, brush.start_view_x)
                };
                let transform = self.transform();
                match brush.brush {
                    BrushType::Zoom => {
                        if self.has_reached_max_zoom() {
                            events.push(DisplayEvent::notify_max_zoom());
                            self.brush = None;
                        } else {
                            let s = transform.fraction_of_view_x(lo);
                            let e = transform.fraction_of_view_x(hi);
                            self.zoom(s, e);
                        }
                    }
                    BrushType::CreateMask => {
                        let start_secs = transform.time_for_view_x(lo);
                        let end_secs = transform.time_for_view_x(hi);
                        let need_to_deselect = self.selections.channels.is_empty();
                        events.push(DisplayEvent::MaskCreateDragEnd {
                            channel_id: brush.channel.as_ref().map(|c| c.channel_id.clone()),
                            start_time_secs: start_secs,
                            end_time_secs: end_secs,
                            need_to_deselect,
                        });
                        // the mask brush stays visible until the host
                        // clears it, so the created mask can be confirmed
                        self.brush = Some(brush);
                    }
                    BrushType::Measure => {
                        if let Some(channel_ref) = &brush.channel {
                            let start_secs = transform.time_for_view_x(lo);
                            let end_secs = transform.time_for_view_x(hi);
                            if let Some(event) =
                                self.stage_measure_selection(channel_ref, start_secs, end_secs)
                            {
                                events.push(event);
                            }
                        }
                    }
                }
                return events;
            }
        }

        // plain click: defer for double-click suppression, but only when
        // the pointer did not travel since the press
        if self.moved_since_press || pressed.is_none() {
            self.pending_click = None;
        } else if let Some(click) = &mut self.pending_click {
            click.armed_at = now;
        }
        events
    }

    fn on_wheel(
        &mut self,
        ctrl_or_cmd: bool,
        shift: bool,
        zoom_in: bool,
        anchor_view_x: f64,
    ) -> Vec<DisplayEvent> {
        let mut events = Vec::new();
        if ctrl_or_cmd && !shift {
            if zoom_in {
                if self.has_reached_max_zoom() {
                    events.push(DisplayEvent::notify_max_zoom());
                } else {
                    self.zoom_by_percentage_to_point(-WHEEL_STEP, anchor_view_x);
                }
            } else {
                self.zoom_by_percentage_to_point(WHEEL_STEP, anchor_view_x);
            }
        } else if ctrl_or_cmd && shift {
            self.pan_by_percentage(if zoom_in { WHEEL_STEP } else { -WHEEL_STEP });
        }
        events
    }

    /// Poll the click-deferral window. Returns the channel-click event once
    /// the double-click window has elapsed without suppression.
    pub fn poll_pending_click(&mut self, now: Instant) -> Option<DisplayEvent> {
        let click = self.pending_click.as_ref()?;
        if now.duration_since(click.armed_at) < DOUBLE_CLICK_DELAY {
            return None;
        }
        let click = self.pending_click.take().unwrap();
        Some(DisplayEvent::ChannelClicked {
            channel_id: click.channel.channel_id,
            time_secs: click.time_secs,
        })
    }

    /// Clear the brush overlay (host-facing, and used after mask creation).
    pub fn clear_brush_stroke(&mut self) {
        self.brush = None;
    }

    /// Reset amplitude scaling on every station.
    pub fn reset_all_amplitudes(&mut self) {
        for row in &mut self.rows {
            row.reset_amplitude();
        }
    }

    /// Reset amplitude scaling on the channel under the cursor, if any.
    pub fn reset_hovered_amplitude(&mut self, config: &DisplayConfiguration, bounds_width: f32) {
        let (Some(view_x), Some(y_px)) = (self.cursor_view_x, self.last_cursor_y_px) else {
            return;
        };
        let x_px = config.label_width_px + view_x as f32 * (bounds_width - config.label_width_px);
        if let Some(HitTarget::Channel { channel, .. } | HitTarget::Masks { channel, .. }) =
            self.hit_test(config, bounds_width, x_px, y_px)
        {
            let scoped = format!("{}:{}", self.scope, channel.channel_id);
            if let Some(renderer) = self.rows[channel.station_idx].renderer_by_scoped_id(&scoped) {
                renderer.reset_amplitude();
            }
        }
    }

    // ------------------------------------------------------------------
    // Commit helpers
    // ------------------------------------------------------------------

    fn begin_marker_drag(
        &self,
        marker_id: &str,
        window_id: Option<&str>,
        visible: TimeRange,
    ) -> Option<MarkerDrag> {
        match window_id {
            None => {
                let marker = self
                    .markers
                    .moveable_markers
                    .iter()
                    .find(|m| m.id == marker_id)?;
                Some(MarkerDrag::begin(marker, None, None, self.time_range, visible))
            }
            Some(window_id) => {
                let window = self
                    .markers
                    .selection_windows
                    .iter()
                    .find(|w| w.id == window_id)?;
                if window.start_marker.id == marker_id {
                    Some(MarkerDrag::begin(
                        &window.start_marker,
                        None,
                        Some(&window.end_marker),
                        self.time_range,
                        visible,
                    ))
                } else {
                    Some(MarkerDrag::begin(
                        &window.end_marker,
                        Some(&window.start_marker),
                        None,
                        self.time_range,
                        visible,
                    ))
                }
            }
        }
    }

    /// Write a committed marker time into the local model and build the
    /// host event.
    fn commit_marker(&mut self, marker_id: &str, time_secs: f64) -> Option<DisplayEvent> {
        if let Some(marker) = self
            .markers
            .moveable_markers
            .iter_mut()
            .find(|m| m.id == marker_id)
        {
            marker.time_secs = time_secs;
            return Some(DisplayEvent::MarkerUpdated(marker.clone()));
        }
        for window in &mut self.markers.selection_windows {
            if window.start_marker.id == marker_id {
                window.start_marker.time_secs = time_secs;
                return Some(DisplayEvent::SelectionWindowUpdated(window.clone()));
            }
            if window.end_marker.id == marker_id {
                window.end_marker.time_secs = time_secs;
                return Some(DisplayEvent::SelectionWindowUpdated(window.clone()));
            }
        }
        None
    }

    fn commit_window(&mut self, window_id: &str, start: f64, end: f64) -> Option<DisplayEvent> {
        let window = self
            .markers
            .selection_windows
            .iter_mut()
            .find(|w| w.id == window_id)?;
        if !window.is_moveable {
            return None;
        }
        window.start_marker.time_secs = start;
        window.end_marker.time_secs = end;
        Some(DisplayEvent::SelectionWindowUpdated(window.clone()))
    }

    fn commit_pick(
        &mut self,
        channel_ref: &ChannelRef,
        pick_id: &str,
        predicted: bool,
        time_secs: f64,
    ) -> Option<DisplayEvent> {
        let row = &mut self.rows[channel_ref.station_idx];
        let channel = if channel_ref.is_default {
            &mut row.station.default_channel
        } else {
            row.station
                .non_default_channels
                .iter_mut()
                .find(|c| c.id == channel_ref.channel_id)?
        };
        let offset = channel.time_offset_seconds;
        let waveform = channel.waveform.as_mut()?;
        let picks = if predicted {
            &mut waveform.predicted_phases
        } else {
            &mut waveform.signal_detections
        };
        let pick = picks.iter_mut().find(|p| p.id == pick_id)?;
        pick.time_secs = time_secs - offset;
        Some(if predicted {
            DisplayEvent::PredictedPhaseDragEnd {
                id: pick.id.clone(),
                time_secs: pick.time_secs,
            }
        } else {
            DisplayEvent::SignalDetectionDragEnd {
                id: pick.id.clone(),
                time_secs: pick.time_secs,
            }
        })
    }

    fn stage_measure_selection(
        &mut self,
        channel_ref: &ChannelRef,
        start_secs: f64,
        end_secs: f64,
    ) -> Option<DisplayEvent> {
        let row = &mut self.rows[channel_ref.station_idx];
        let (channel, is_default) = row.channel_by_id(&channel_ref.channel_id)?;
        let selection = MeasureWindowSelection {
            station_id: row.station.id.clone(),
            channel: channel.clone(),
            start_time_secs: start_secs,
            end_time_secs: end_secs,
            is_default_channel: is_default,
        };
        row.measure_selection = Some((channel_ref.channel_id.clone(), start_secs, end_secs));
        Some(DisplayEvent::MeasureWindowRequested(selection))
    }
}

fn marker_percent(marker: &Marker, range: TimeRange) -> f64 {
    quiver_core::view::left_percent(marker.time_secs, range.start_time_secs, range.end_time_secs)
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Live marker positions for drawing: the drag-session position when a
/// marker is mid-drag, its model position otherwise.
pub fn live_marker_percent(panel: &WaveformPanel, marker: &Marker) -> f64 {
    if let Some(session) = panel.marker_drag() {
        if session.marker_id == marker.id {
            return session.position_percent;
        }
    }
    if let Some(drag) = panel.window_drag() {
        for window in &panel.markers.selection_windows {
            if window.id == drag.window_id {
                if window.start_marker.id == marker.id {
                    return drag.lead_percent;
                }
                if window.end_marker.id == marker.id {
                    return drag.lag_percent;
                }
            }
        }
    }
    marker_percent(marker, panel.time_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::types::{LineStyle, Rgba};

    fn panel() -> WaveformPanel {
        WaveformPanel::new(
            "main",
            Vec::new(),
            TimeRange::new(1000.0, 2000.0),
            None,
            Markers::default(),
        )
    }

    #[test]
    fn zoom_clamps_and_enforces_min_span() {
        let mut p = panel();
        p.zoom(-0.5, 1.5);
        assert_eq!(p.view_range, ViewRange::new(0.0, 1.0));

        p.zoom(0.5, 0.5);
        assert!((p.view_range.span() - MIN_ZOOM_SPAN).abs() < 1e-12);
        assert!(p.view_range.left >= 0.0 && p.view_range.right <= 1.0);

        // inverted input still commits a valid range
        p.zoom(0.9995, 0.4);
        assert!(p.view_range.left <= p.view_range.right);
        assert!(p.view_range.right <= 1.0);
        assert!(p.view_range.span() >= MIN_ZOOM_SPAN - 1e-12);
    }

    #[test]
    fn zoom_at_right_edge_keeps_bounds_in_unit_interval() {
        let mut p = panel();
        p.zoom(0.9999, 1.2);
        assert!(p.view_range.left >= 0.0);
        assert!(p.view_range.right <= 1.0);
        assert!(p.view_range.span() >= MIN_ZOOM_SPAN - 1e-12);
    }

    #[test]
    fn anchored_zoom_keeps_anchor_fraction_stable() {
        let mut p = panel();
        p.zoom(0.2, 0.8);
        // anchor at the middle of the viewport = fraction 0.5
        let anchor_time_before = p.transform().time_for_view_x(0.5);
        p.zoom_by_percentage_to_point(-WHEEL_STEP, 0.5);
        let anchor_time_after = p.transform().time_for_view_x(0.5);
        assert!((anchor_time_before - anchor_time_after).abs() < 1e-6);
        assert!(p.view_range.span() < 0.6);
    }

    #[test]
    fn pan_shifts_both_bounds() {
        let mut p = panel();
        p.zoom(0.2, 0.4);
        p.pan_by_percentage(0.5);
        assert!((p.view_range.left - 0.3).abs() < 1e-9);
        assert!((p.view_range.right - 0.5).abs() < 1e-9);
    }

    #[test]
    fn max_zoom_guard_trips_at_rounded_threshold() {
        let mut p = panel();
        assert!(!p.has_reached_max_zoom());
        p.view_range = ViewRange::new(0.5, 0.50048);
        assert!(p.has_reached_max_zoom());
        p.view_range = ViewRange::new(0.5, 0.5009);
        assert!(!p.has_reached_max_zoom());
    }

    #[test]
    fn wheel_zoom_in_at_max_zoom_is_rejected_with_one_notification() {
        let mut p = panel();
        p.view_range = ViewRange::new(0.5, 0.5004);
        let before = p.view_range;
        let events = p.on_wheel(true, false, true, 0.5);
        assert_eq!(p.view_range, before, "view range must be unchanged");
        let notifications = events
            .iter()
            .filter(|e| matches!(e, DisplayEvent::Notification { .. }))
            .count();
        assert_eq!(notifications, 1);

        // zooming out is still allowed
        let events = p.on_wheel(true, false, false, 0.5);
        assert!(events.is_empty());
        assert!(p.view_range.span() > before.span());
    }

    #[test]
    fn content_width_scales_with_zoom() {
        let mut p = panel();
        assert_eq!(p.content_width(1000.0, 100.0), 1100.0);
        p.zoom(0.25, 0.75);
        assert_eq!(p.content_width(1000.0, 100.0), 2100.0);
        assert_eq!(p.scroll_left(1000.0, 100.0), 500.0);
    }

    #[test]
    fn zoom_to_time_window_clamps_to_display_range() {
        let mut p = panel();
        p.zoom_to_time_window(500.0, 1500.0);
        assert_eq!(p.view_range.left, 0.0);
        assert!((p.view_range.right - 0.5).abs() < 1e-12);
    }

    #[test]
    fn double_click_resets_to_default_zoom() {
        let pool = PositionBufferPool::with_workers(1);
        let config = DisplayConfiguration::default();
        let mut p = panel();
        p.default_zoom = TimeRange::new(1200.0, 1800.0);
        p.zoom(0.9, 1.0);
        p.on_input(PanelInput::DoubleClicked, &config, &pool, Instant::now());
        assert!((p.view_range.left - 0.2).abs() < 1e-9);
        assert!((p.view_range.right - 0.8).abs() < 1e-9);
    }

    #[test]
    fn single_click_defers_until_window_elapses() {
        let pool = PositionBufferPool::with_workers(1);
        let config = DisplayConfiguration::default();
        let mut p = panel();
        let channel = ChannelRef {
            station_idx: 0,
            channel_id: "c".into(),
            is_default: true,
        };

        let t0 = Instant::now();
        p.on_input(
            PanelInput::Pressed {
                view_x: 0.5,
                x_px: 500.0,
                y_px: 10.0,
                ctrl_or_cmd: false,
                shift: false,
                hit: Some(HitTarget::Channel {
                    channel: channel.clone(),
                    time_secs: 1500.0,
                }),
            },
            &config,
            &pool,
            t0,
        );
        let events = p.on_input(PanelInput::Released { view_x: 0.5 }, &config, &pool, t0);
        assert!(events.is_empty(), "click must not fire immediately");

        assert!(p.poll_pending_click(t0 + Duration::from_millis(100)).is_none());
        let fired = p.poll_pending_click(t0 + DOUBLE_CLICK_DELAY).unwrap();
        assert!(matches!(
            fired,
            DisplayEvent::ChannelClicked { ref channel_id, .. } if channel_id == "c"
        ));
        // fires exactly once
        assert!(p.poll_pending_click(t0 + Duration::from_secs(2)).is_none());
    }

    #[test]
    fn double_click_suppresses_pending_single_click() {
        let pool = PositionBufferPool::with_workers(1);
        let config = DisplayConfiguration::default();
        let mut p = panel();
        let t0 = Instant::now();
        p.on_input(
            PanelInput::Pressed {
                view_x: 0.5,
                x_px: 500.0,
                y_px: 10.0,
                ctrl_or_cmd: false,
                shift: false,
                hit: Some(HitTarget::Channel {
                    channel: ChannelRef {
                        station_idx: 0,
                        channel_id: "c".into(),
                        is_default: true,
                    },
                    time_secs: 1500.0,
                }),
            },
            &config,
            &pool,
            t0,
        );
        p.on_input(PanelInput::Released { view_x: 0.5 }, &config, &pool, t0);
        p.on_input(PanelInput::DoubleClicked, &config, &pool, t0);
        assert!(p.poll_pending_click(t0 + Duration::from_secs(2)).is_none());
    }

    #[test]
    fn zoom_brush_requires_movement_threshold() {
        let pool = PositionBufferPool::with_workers(1);
        let config = DisplayConfiguration::default();
        let mut p = panel();
        let channel = ChannelRef {
            station_idx: 0,
            channel_id: "c".into(),
            is_default: true,
        };
        let t0 = Instant::now();
        p.on_input(
            PanelInput::Pressed {
                view_x: 0.4,
                x_px: 400.0,
                y_px: 10.0,
                ctrl_or_cmd: true,
                shift: false,
                hit: Some(HitTarget::Channel {
                    channel,
                    time_secs: 1400.0,
                }),
            },
            &config,
            &pool,
            t0,
        );
        // sub-threshold movement: still a click, not a brush
        p.on_input(
            PanelInput::Moved {
                view_x: 0.405,
                x_px: 405.0,
                y_px: 10.0,
            },
            &config,
            &pool,
            t0,
        );
        assert!(!p.brush().unwrap().painting);

        p.on_input(
            PanelInput::Moved {
                view_x: 0.6,
                x_px: 600.0,
                y_px: 10.0,
            },
            &config,
            &pool,
            t0,
        );
        assert!(p.brush().unwrap().painting);

        let before_span = p.view_range.span();
        p.on_input(PanelInput::Released { view_x: 0.6 }, &config, &pool, t0);
        assert!(p.view_range.span() < before_span);
        // zoomed to [0.4, 0.6] of the previous full view
        assert!((p.view_range.left - 0.4).abs() < 1e-9);
        assert!((p.view_range.right - 0.6).abs() < 1e-9);
        assert!(p.brush().is_none());
    }

    #[test]
    fn mask_brush_reports_times_through_current_view_range() {
        let pool = PositionBufferPool::with_workers(1);
        let config = DisplayConfiguration::default();
        let mut p = panel();
        p.zoom(0.5, 1.0); // visible: 1500..2000
        p.mask_hotkey_down = true;
        let channel = ChannelRef {
            station_idx: 0,
            channel_id: "c".into(),
            is_default: true,
        };
        let t0 = Instant::now();
        p.on_input(
            PanelInput::Pressed {
                view_x: 0.2,
                x_px: 200.0,
                y_px: 10.0,
                ctrl_or_cmd: false,
                shift: false,
                hit: Some(HitTarget::Channel {
                    channel,
                    time_secs: 1600.0,
                }),
            },
            &config,
            &pool,
            t0,
        );
        p.on_input(
            PanelInput::Moved {
                view_x: 0.4,
                x_px: 400.0,
                y_px: 10.0,
            },
            &config,
            &pool,
            t0,
        );
        let events = p.on_input(PanelInput::Released { view_x: 0.4 }, &config, &pool, t0);
        let mask_event = events
            .iter()
            .find_map(|e| match e {
                DisplayEvent::MaskCreateDragEnd {
                    start_time_secs,
                    end_time_secs,
                    ..
                } => Some((*start_time_secs, *end_time_secs)),
                _ => None,
            })
            .expect("mask create event");
        assert!((mask_event.0 - 1600.0).abs() < 1e-6);
        assert!((mask_event.1 - 1700.0).abs() < 1e-6);
        // the mask brush stroke stays visible until cleared
        assert!(p.brush().is_some());
        p.clear_brush_stroke();
        assert!(p.brush().is_none());
    }

    #[test]
    fn disabled_mask_modification_refuses_the_brush() {
        let pool = PositionBufferPool::with_workers(1);
        let mut config = DisplayConfiguration::default();
        config.default_channel.disable_mask_modification = true;
        let mut p = panel();
        p.mask_hotkey_down = true;
        let events = p.on_input(
            PanelInput::Pressed {
                view_x: 0.2,
                x_px: 200.0,
                y_px: 10.0,
                ctrl_or_cmd: false,
                shift: false,
                hit: Some(HitTarget::Channel {
                    channel: ChannelRef {
                        station_idx: 0,
                        channel_id: "c".into(),
                        is_default: true,
                    },
                    time_secs: 1200.0,
                }),
            },
            &config,
            &pool,
            Instant::now(),
        );
        assert!(p.brush().is_none());
        assert!(events
            .iter()
            .any(|e| matches!(e, DisplayEvent::Notification { .. })));
    }

    #[test]
    fn marker_drag_commits_once_on_release() {
        let pool = PositionBufferPool::with_workers(1);
        let config = DisplayConfiguration::default();
        let mut markers = Markers::default();
        markers.moveable_markers.push(Marker::new(
            "m1",
            Rgba::rgb(1.0, 0.0, 0.0),
            LineStyle::Solid,
            1500.0,
        ));
        let mut p = WaveformPanel::new(
            "main",
            Vec::new(),
            TimeRange::new(1000.0, 2000.0),
            None,
            markers,
        );
        let t0 = Instant::now();
        p.on_input(
            PanelInput::Pressed {
                view_x: 0.5,
                x_px: 500.0,
                y_px: 10.0,
                ctrl_or_cmd: false,
                shift: false,
                hit: Some(HitTarget::MoveableMarker {
                    marker_id: "m1".into(),
                    window_id: None,
                }),
            },
            &config,
            &pool,
            t0,
        );
        // intermediate frames mutate only the session
        p.on_input(
            PanelInput::Moved {
                view_x: 0.7,
                x_px: 700.0,
                y_px: 10.0,
            },
            &config,
            &pool,
            t0,
        );
        assert_eq!(p.markers.moveable_markers[0].time_secs, 1500.0);

        let events = p.on_input(PanelInput::Released { view_x: 0.7 }, &config, &pool, t0);
        assert_eq!(events.len(), 1);
        match &events[0] {
            DisplayEvent::MarkerUpdated(marker) => {
                assert!((marker.time_secs - 1700.0).abs() < 1.0);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!((p.markers.moveable_markers[0].time_secs - 1700.0).abs() < 1.0);
    }
}
