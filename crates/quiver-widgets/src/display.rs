//! The top-level waveform display.
//!
//! Composes the main waveform panel with the optional measure window — a
//! secondary, zoomed-in panel focused on one selected channel/time slice —
//! plus the toast queue and the imperative host API (`refresh`,
//! `zoom_to_time_window`, `toggle_measure_window_visibility`, ...).
//!
//! The measure window is a three-state machine: hidden, visible with no
//! selection, and visible with an active selection. A channel's
//! measure-selection gesture both shows the window and replaces the
//! selection, cleaning up the prior selection's highlight first when the
//! channel changed.

use std::time::{Duration, Instant};

use quiver_core::config::{DisplayConfiguration, HotKeysConfig};
use quiver_core::model::{
    Marker, Markers, MeasureWindowSelection, Selections, SelectionWindow, Station,
};
use quiver_core::pool::PositionBufferPool;
use quiver_core::types::TimeRange;

use crate::panel::{PanelInput, WaveformPanel};

/// Measure-window height bounds for the divider drag, in pixels.
pub const MEASURE_WINDOW_MIN_HEIGHT_PX: f32 = 200.0;
pub const MEASURE_WINDOW_MAX_HEIGHT_PX: f32 = 500.0;

/// How long a toast stays visible.
pub const TOAST_TIMEOUT: Duration = Duration::from_secs(4);

/// Vertical chrome inside the measure window that the channel row cannot
/// use (divider, axis strip).
const MEASURE_WINDOW_CHROME_PX: f32 = 55.0;

/// Severity of a toast notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastIntent {
    Info,
    Warning,
    Danger,
}

/// A non-blocking notification.
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub intent: ToastIntent,
    pub posted_at: Instant,
}

/// Which channel content renders. Cycled by
/// [`WaveformDisplay::toggle_rendering_content`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderingContent {
    #[default]
    WaveformsAndSpectrograms,
    Waveforms,
    Spectrograms,
}

/// Interaction events surfaced to the embedding application — the
/// callback sinks of the display's contract. All are delivered
/// synchronously from the interaction handlers that produced them.
#[derive(Debug, Clone)]
pub enum DisplayEvent {
    ChannelClicked {
        channel_id: String,
        time_secs: f64,
    },
    ChannelLabelClicked {
        station_id: String,
        channel_id: String,
    },
    ChannelExpanded {
        channel_id: String,
    },
    ChannelCollapsed {
        channel_id: String,
    },
    SignalDetectionClicked {
        id: String,
    },
    SignalDetectionDragEnd {
        id: String,
        time_secs: f64,
    },
    PredictedPhaseClicked {
        id: String,
    },
    PredictedPhaseDragEnd {
        id: String,
        time_secs: f64,
    },
    MaskClicked {
        channel_id: String,
        mask_ids: Vec<String>,
        mask_create_hotkey: bool,
    },
    MaskCreateDragEnd {
        channel_id: Option<String>,
        start_time_secs: f64,
        end_time_secs: f64,
        need_to_deselect: bool,
    },
    MarkerUpdated(Marker),
    SelectionWindowUpdated(SelectionWindow),
    SelectionWindowClicked {
        window: SelectionWindow,
        time_secs: f64,
    },
    /// A measure-selection gesture completed on a channel; the display
    /// consumes this itself and re-emits `MeasureWindowUpdated`.
    MeasureWindowRequested(MeasureWindowSelection),
    MeasureWindowUpdated {
        visible: bool,
        channel_id: Option<String>,
        start_time_secs: Option<f64>,
        end_time_secs: Option<f64>,
        height_px: Option<f32>,
    },
    /// Ask the host to select a channel (mask brush on an empty selection)
    SelectChannel {
        channel_id: String,
    },
    KeyPressed {
        key: String,
    },
    /// A user-facing soft failure or notice
    Notification {
        message: String,
        intent: ToastIntent,
    },
}

impl DisplayEvent {
    pub fn notify_warning(message: &str) -> Self {
        DisplayEvent::Notification {
            message: message.to_string(),
            intent: ToastIntent::Warning,
        }
    }

    pub fn notify_max_zoom() -> Self {
        DisplayEvent::Notification {
            message: "Max zoom reached".to_string(),
            intent: ToastIntent::Info,
        }
    }
}

/// Top-level display state.
pub struct WaveformDisplay {
    pub config: DisplayConfiguration,
    pub hot_keys: HotKeysConfig,
    pub panel: WaveformPanel,
    pub measure_panel: Option<WaveformPanel>,
    pub measure_selection: Option<MeasureWindowSelection>,
    pub show_measure_window: bool,
    pub measure_window_height_px: f32,
    pub rendering: RenderingContent,
    toasts: Vec<Toast>,
    divider_drag_last_y: Option<f32>,
}

impl WaveformDisplay {
    /// Build the display. The panel's range is the supplied range extended
    /// by the min/max per-channel time offsets so offset channels stay in
    /// frame.
    pub fn new(
        stations: Vec<Station>,
        start_time_secs: f64,
        end_time_secs: f64,
        config: DisplayConfiguration,
        hot_keys: HotKeysConfig,
        markers: Markers,
    ) -> Self {
        let (min_offset, max_offset) = offset_bounds(&stations);
        let range = TimeRange::new(start_time_secs + min_offset, end_time_secs + max_offset);
        let panel = WaveformPanel::new("main", stations, range, None, markers);
        Self {
            config,
            hot_keys,
            panel,
            measure_panel: None,
            measure_selection: None,
            show_measure_window: false,
            measure_window_height_px: MEASURE_WINDOW_MIN_HEIGHT_PX,
            rendering: RenderingContent::default(),
            toasts: Vec::new(),
            divider_drag_last_y: None,
        }
    }

    /// The configuration used inside the measure window: same as the main
    /// panel's, but the measure window cannot open another measure window.
    pub fn measure_config(&self) -> DisplayConfiguration {
        let mut config = self.config.clone();
        config.default_channel.disable_measure_window = true;
        config
    }

    /// Currently visible toasts.
    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    /// Pass host-supplied selections through to the panel.
    pub fn set_selections(&mut self, selections: Selections) {
        self.panel.selections = selections;
    }

    // ------------------------------------------------------------------
    // Imperative host API
    // ------------------------------------------------------------------

    /// Force a refresh: re-clamp the zoom state and rebuild every visible
    /// channel's buffers.
    pub fn refresh(&mut self, pool: &PositionBufferPool) {
        let view = self.panel.view_range;
        self.panel.zoom(view.left, view.right);
        self.panel.request_buffers(pool);
        if let Some(measure) = &mut self.measure_panel {
            let view = measure.view_range;
            measure.zoom(view.left, view.right);
            measure.request_buffers(pool);
        }
    }

    /// Zoom the main panel to a time window in seconds.
    pub fn zoom_to_time_window(&mut self, start_time_secs: f64, end_time_secs: f64) {
        self.panel.zoom_to_time_window(start_time_secs, end_time_secs);
    }

    /// The currently visible time range of the main panel.
    pub fn get_current_view_range_in_seconds(&self) -> TimeRange {
        self.panel.current_view_range_secs()
    }

    /// Remove any brush overlay from both panels.
    pub fn clear_brush_stroke(&mut self) {
        self.panel.clear_brush_stroke();
        if let Some(measure) = &mut self.measure_panel {
            measure.clear_brush_stroke();
        }
    }

    /// Hide or show the measure window. Hiding clears the selection and
    /// its highlight.
    pub fn toggle_measure_window_visibility(&mut self) -> Vec<DisplayEvent> {
        let mut events = Vec::new();
        self.clear_selection_highlight();
        let visible = !self.show_measure_window;
        events.push(DisplayEvent::MeasureWindowUpdated {
            visible,
            channel_id: None,
            start_time_secs: None,
            end_time_secs: None,
            height_px: None,
        });
        self.show_measure_window = visible;
        self.measure_selection = None;
        self.measure_panel = None;
        events
    }

    /// Cycle which channel content renders: both → waveforms →
    /// spectrograms → both.
    pub fn toggle_rendering_content(&mut self) {
        self.rendering = match self.rendering {
            RenderingContent::WaveformsAndSpectrograms => RenderingContent::Waveforms,
            RenderingContent::Waveforms => RenderingContent::Spectrograms,
            RenderingContent::Spectrograms => RenderingContent::WaveformsAndSpectrograms,
        };
        self.config.should_render_waveforms = !matches!(self.rendering, RenderingContent::Spectrograms);
        self.config.should_render_spectrograms =
            !matches!(self.rendering, RenderingContent::Waveforms);
    }

    // ------------------------------------------------------------------
    // Measure window
    // ------------------------------------------------------------------

    /// Show the measure window focused on a selection, replacing any
    /// previous one. The prior selection's highlight is cleared first when
    /// the channel changed.
    pub fn update_measure_window(
        &mut self,
        selection: MeasureWindowSelection,
        pool: &PositionBufferPool,
    ) -> Vec<DisplayEvent> {
        if let Some(previous) = &self.measure_selection {
            if previous.channel.id != selection.channel.id {
                self.clear_selection_highlight();
            }
        }

        let mut channel = selection.channel.clone();
        // always show true time in the measure window
        channel.time_offset_seconds = 0.0;
        channel.height_px =
            Some((self.measure_window_height_px - MEASURE_WINDOW_CHROME_PX).max(50.0));
        let station = Station::new(selection.station_id.clone(), "", channel);

        let range = TimeRange::new(selection.start_time_secs, selection.end_time_secs);
        let mut measure_panel =
            WaveformPanel::new("measure", vec![station], range, Some(range), Markers::default());
        measure_panel.request_buffers(pool);

        let event = DisplayEvent::MeasureWindowUpdated {
            visible: true,
            channel_id: Some(selection.channel.id.clone()),
            start_time_secs: Some(selection.start_time_secs),
            end_time_secs: Some(selection.end_time_secs),
            height_px: Some(self.measure_window_height_px),
        };

        self.show_measure_window = true;
        self.measure_selection = Some(selection);
        self.measure_panel = Some(measure_panel);
        vec![event]
    }

    /// Begin dragging the measure-window divider.
    pub fn divider_drag_start(&mut self, y_px: f32) {
        self.divider_drag_last_y = Some(y_px);
    }

    /// Continue a divider drag; the height is clamped to
    /// [[`MEASURE_WINDOW_MIN_HEIGHT_PX`], [`MEASURE_WINDOW_MAX_HEIGHT_PX`]].
    pub fn divider_drag_move(&mut self, y_px: f32) {
        let Some(last) = self.divider_drag_last_y else {
            return;
        };
        let height = (self.measure_window_height_px + (y_px - last))
            .clamp(MEASURE_WINDOW_MIN_HEIGHT_PX, MEASURE_WINDOW_MAX_HEIGHT_PX);
        self.measure_window_height_px = height;
        self.divider_drag_last_y = Some(y_px);
    }

    /// Finish a divider drag, reporting the final geometry.
    pub fn divider_drag_end(&mut self) -> Vec<DisplayEvent> {
        self.divider_drag_last_y = None;
        match &self.measure_selection {
            Some(selection) => vec![DisplayEvent::MeasureWindowUpdated {
                visible: true,
                channel_id: Some(selection.channel.id.clone()),
                start_time_secs: Some(selection.start_time_secs),
                end_time_secs: Some(selection.end_time_secs),
                height_px: Some(self.measure_window_height_px),
            }],
            None => Vec::new(),
        }
    }

    fn clear_selection_highlight(&mut self) {
        if let Some(previous) = &self.measure_selection {
            let channel_id = previous.channel.id.clone();
            for row in &mut self.panel.rows {
                if let Some((id, _, _)) = &row.measure_selection {
                    if id == &channel_id {
                        row.measure_selection = None;
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Input routing
    // ------------------------------------------------------------------

    /// Route an input from the main panel canvas.
    pub fn handle_panel_input(
        &mut self,
        input: PanelInput,
        pool: &PositionBufferPool,
        now: Instant,
    ) -> Vec<DisplayEvent> {
        let config = self.config.clone();
        let events = self.panel.on_input(input, &config, pool, now);
        self.absorb_events(events, pool, now)
    }

    /// Route an input from the measure-window canvas.
    pub fn handle_measure_input(
        &mut self,
        input: PanelInput,
        pool: &PositionBufferPool,
        now: Instant,
    ) -> Vec<DisplayEvent> {
        let config = self.measure_config();
        let events = match &mut self.measure_panel {
            Some(measure) => measure.on_input(input, &config, pool, now),
            None => Vec::new(),
        };
        self.absorb_events(events, pool, now)
    }

    /// Intercept the events the display handles itself (measure-window
    /// requests, notifications) and pass everything through.
    fn absorb_events(
        &mut self,
        events: Vec<DisplayEvent>,
        pool: &PositionBufferPool,
        now: Instant,
    ) -> Vec<DisplayEvent> {
        let mut out = Vec::new();
        for event in events {
            match event {
                DisplayEvent::MeasureWindowRequested(selection) => {
                    out.extend(self.update_measure_window(selection, pool));
                }
                DisplayEvent::Notification { message, intent } => {
                    self.push_toast(&message, intent, now);
                    out.push(DisplayEvent::Notification { message, intent });
                }
                other => out.push(other),
            }
        }
        out
    }

    /// Periodic work: drain worker responses, poll deferred clicks, and
    /// expire toasts.
    pub fn tick(&mut self, pool: &PositionBufferPool, now: Instant) -> Vec<DisplayEvent> {
        while let Some(response) = pool.try_recv() {
            if !self.panel.apply_response(response.clone()) {
                if let Some(measure) = &mut self.measure_panel {
                    measure.apply_response(response);
                }
            }
        }

        let mut events = Vec::new();
        if let Some(event) = self.panel.poll_pending_click(now) {
            events.push(event);
        }
        if let Some(measure) = &mut self.measure_panel {
            if let Some(event) = measure.poll_pending_click(now) {
                events.push(event);
            }
        }

        self.toasts
            .retain(|toast| now.duration_since(toast.posted_at) < TOAST_TIMEOUT);
        events
    }

    /// Post a toast unless an identical message is already visible.
    pub fn push_toast(&mut self, message: &str, intent: ToastIntent, now: Instant) {
        if self.toasts.iter().any(|toast| toast.message == message) {
            return;
        }
        self.toasts.push(Toast {
            message: message.to_string(),
            intent,
            posted_at: now,
        });
    }

    // ------------------------------------------------------------------
    // Keyboard
    // ------------------------------------------------------------------

    /// Handle a key press. `canvas_width` is needed to resolve the hovered
    /// channel for the single-channel amplitude reset.
    pub fn key_pressed(&mut self, key: &str, canvas_width: f32) -> Vec<DisplayEvent> {
        let mut events = Vec::new();
        if self.hot_keys.matches_mask_create(key) {
            self.panel.mask_hotkey_down = true;
        }
        if self.hot_keys.matches_amplitude_scale(key) {
            self.panel.amplitude_hotkey_down = true;
        }
        if self.hot_keys.matches_amplitude_scale_single_reset(key) {
            self.panel.brushes_disabled = true;
            let config = self.config.clone();
            self.panel.reset_hovered_amplitude(&config, canvas_width);
        }
        if self.hot_keys.matches_amplitude_scale_reset(key) {
            self.panel.reset_all_amplitudes();
            if let Some(measure) = &mut self.measure_panel {
                measure.reset_all_amplitudes();
            }
        }
        events.push(DisplayEvent::KeyPressed {
            key: key.to_string(),
        });
        events
    }

    /// Handle a key release, clearing held-hotkey states.
    pub fn key_released(&mut self, key: &str) {
        if self.hot_keys.matches_mask_create(key) && self.panel.brush().is_none() {
            self.panel.mask_hotkey_down = false;
        }
        if self.hot_keys.matches_amplitude_scale(key) {
            self.panel.amplitude_hotkey_down = false;
        }
        if self.hot_keys.matches_amplitude_scale_single_reset(key) {
            self.panel.brushes_disabled = false;
        }
    }
}

fn offset_bounds(stations: &[Station]) -> (f64, f64) {
    let mut min_offset = 0.0f64;
    let mut max_offset = 0.0f64;
    for station in stations {
        for channel in station.channels() {
            min_offset = min_offset.min(channel.time_offset_seconds);
            max_offset = max_offset.max(channel.time_offset_seconds);
        }
    }
    (min_offset, max_offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::model::Channel;

    fn display_with(stations: Vec<Station>) -> WaveformDisplay {
        WaveformDisplay::new(
            stations,
            1000.0,
            2000.0,
            DisplayConfiguration::default(),
            HotKeysConfig::default(),
            Markers::default(),
        )
    }

    fn selection(channel_id: &str) -> MeasureWindowSelection {
        MeasureWindowSelection {
            station_id: "sta".into(),
            channel: Channel::new(channel_id, "SHZ"),
            start_time_secs: 1200.0,
            end_time_secs: 1300.0,
            is_default_channel: true,
        }
    }

    #[test]
    fn display_range_extends_by_channel_offsets() {
        let mut station = Station::new("sta", "STA01", Channel::new("sta/SHZ", "SHZ"));
        let mut late = Channel::new("sta/SHN", "SHN");
        late.time_offset_seconds = 30.0;
        let mut early = Channel::new("sta/SHE", "SHE");
        early.time_offset_seconds = -10.0;
        station.non_default_channels = vec![late, early];

        let display = display_with(vec![station]);
        assert_eq!(display.panel.time_range.start_time_secs, 990.0);
        assert_eq!(display.panel.time_range.end_time_secs, 2030.0);
    }

    #[test]
    fn measure_window_state_machine() {
        let pool = PositionBufferPool::with_workers(1);
        let mut display = display_with(Vec::new());

        // hidden → visible with selection
        assert!(!display.show_measure_window);
        let events = display.update_measure_window(selection("sta/SHZ"), &pool);
        assert!(display.show_measure_window);
        assert!(display.measure_panel.is_some());
        assert!(matches!(
            events[0],
            DisplayEvent::MeasureWindowUpdated {
                visible: true,
                channel_id: Some(ref id),
                ..
            } if id == "sta/SHZ"
        ));

        // measure panel is zoomed to the selection
        let measure = display.measure_panel.as_ref().unwrap();
        assert_eq!(measure.time_range.start_time_secs, 1200.0);
        assert_eq!(measure.time_range.end_time_secs, 1300.0);
        // true time: offset forced to zero
        assert_eq!(
            measure.rows[0].station.default_channel.time_offset_seconds,
            0.0
        );

        // toggling hides and clears the selection
        let events = display.toggle_measure_window_visibility();
        assert!(!display.show_measure_window);
        assert!(display.measure_selection.is_none());
        assert!(display.measure_panel.is_none());
        assert!(matches!(
            events[0],
            DisplayEvent::MeasureWindowUpdated { visible: false, .. }
        ));

        // toggling again shows an empty measure window
        display.toggle_measure_window_visibility();
        assert!(display.show_measure_window);
        assert!(display.measure_selection.is_none());
    }

    #[test]
    fn replacing_the_selection_clears_the_prior_highlight() {
        let pool = PositionBufferPool::with_workers(1);
        let mut station = Station::new("sta", "STA01", Channel::new("sta/SHZ", "SHZ"));
        station.non_default_channels = vec![Channel::new("sta/SHN", "SHN")];
        let mut display = display_with(vec![station]);

        display.update_measure_window(selection("sta/SHZ"), &pool);
        display.panel.rows[0].measure_selection = Some(("sta/SHZ".into(), 1200.0, 1300.0));

        display.update_measure_window(selection("sta/SHN"), &pool);
        assert!(display.panel.rows[0].measure_selection.is_none());
        assert_eq!(
            display.measure_selection.as_ref().unwrap().channel.id,
            "sta/SHN"
        );
    }

    #[test]
    fn divider_drag_clamps_height() {
        let mut display = display_with(Vec::new());
        display.divider_drag_start(0.0);
        display.divider_drag_move(1000.0);
        assert_eq!(display.measure_window_height_px, MEASURE_WINDOW_MAX_HEIGHT_PX);
        display.divider_drag_move(-2000.0);
        assert_eq!(display.measure_window_height_px, MEASURE_WINDOW_MIN_HEIGHT_PX);
    }

    #[test]
    fn rendering_content_cycles_three_states() {
        let mut display = display_with(Vec::new());
        assert_eq!(display.rendering, RenderingContent::WaveformsAndSpectrograms);
        display.toggle_rendering_content();
        assert_eq!(display.rendering, RenderingContent::Waveforms);
        assert!(display.config.should_render_waveforms);
        assert!(!display.config.should_render_spectrograms);
        display.toggle_rendering_content();
        assert_eq!(display.rendering, RenderingContent::Spectrograms);
        assert!(!display.config.should_render_waveforms);
        display.toggle_rendering_content();
        assert_eq!(display.rendering, RenderingContent::WaveformsAndSpectrograms);
        assert!(display.config.should_render_waveforms);
        assert!(display.config.should_render_spectrograms);
    }

    #[test]
    fn toasts_dedup_and_expire() {
        let mut display = display_with(Vec::new());
        let pool = PositionBufferPool::with_workers(1);
        let t0 = Instant::now();
        display.push_toast("Max zoom reached", ToastIntent::Info, t0);
        display.push_toast("Max zoom reached", ToastIntent::Info, t0);
        assert_eq!(display.toasts().len(), 1);

        display.tick(&pool, t0 + TOAST_TIMEOUT);
        assert!(display.toasts().is_empty());
    }

    #[test]
    fn measure_config_disables_nested_measure_windows() {
        let display = display_with(Vec::new());
        assert!(display.measure_config().default_channel.disable_measure_window);
        assert!(!display.config.default_channel.disable_measure_window);
    }

    #[test]
    fn key_handling_tracks_hotkey_state() {
        let mut display = display_with(Vec::new());
        display.key_pressed("m", 1000.0);
        assert!(display.panel.mask_hotkey_down);
        display.key_released("m");
        assert!(!display.panel.mask_hotkey_down);

        display.key_pressed("Alt+a", 1000.0);
        assert!(display.panel.brushes_disabled);
        display.key_released("Alt+a");
        assert!(!display.panel.brushes_disabled);
    }
}
