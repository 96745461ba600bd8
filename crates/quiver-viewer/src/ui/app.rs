//! Main iced application for the Quiver waveform viewer.
//!
//! Owns the display state and the position-buffer pool, dispatches
//! messages, and lays out the toolbar, the main panel, the optional
//! measure window, toasts, and the status bar.

use std::time::{Duration, Instant};

use iced::widget::{button, column, container, mouse_area, row, scrollable, text, Space};
use iced::{time, Center, Element, Fill, Length, Subscription, Task, Theme};

use quiver_core::config::DisplayConfiguration;
use quiver_core::model::{Mask, Selections};
use quiver_core::pool::PositionBufferPool;
use quiver_core::types::Rgba;
use quiver_widgets::display::{DisplayEvent, ToastIntent};
use quiver_widgets::{waveform_panel, WaveformDisplay};

use super::data::build_demo_data;
use super::message::Message;
use crate::config::ViewerConfig;
use crate::keybindings::{key_to_string, KeybindingsConfig};

const MASK_CREATE_COLOR: Rgba = Rgba::rgb(0.57, 0.89, 0.59);

/// Application state.
pub struct QuiverApp {
    /// The waveform display (main panel + measure window + toasts)
    display: WaveformDisplay,
    /// Cached configuration for the measure-window panel; kept in sync
    /// with the display configuration after every update
    measure_window_config: DisplayConfiguration,
    /// The position-buffer worker pool, owned by the application and
    /// injected wherever buffers are built
    pool: PositionBufferPool,
    keybindings: KeybindingsConfig,
    /// Status line shown at the bottom
    status: String,
    /// Last known waveform canvas width, for hotkey hit resolution
    canvas_width: f32,
    divider_drag_pending: bool,
    divider_dragging: bool,
    created_mask_count: usize,
}

impl QuiverApp {
    pub fn new(config: ViewerConfig, keybindings: KeybindingsConfig) -> Self {
        let pool = PositionBufferPool::spawn();
        let demo = build_demo_data(&config.demo);
        let mut display = WaveformDisplay::new(
            demo.stations,
            demo.start_time_secs,
            demo.end_time_secs,
            config.display.clone(),
            config.hot_keys.clone(),
            demo.markers,
        );
        display.refresh(&pool);
        let measure_window_config = display.measure_config();

        Self {
            display,
            measure_window_config,
            pool,
            keybindings,
            status: String::from("Ready"),
            canvas_width: 1280.0,
            divider_drag_pending: false,
            divider_dragging: false,
            created_mask_count: 0,
        }
    }

    /// Update application state.
    pub fn update(&mut self, message: Message) -> Task<Message> {
        let now = Instant::now();
        match message {
            Message::Tick => {
                let events = self.display.tick(&self.pool, now);
                self.handle_events(events);
            }

            Message::Panel(input) => {
                let events = self.display.handle_panel_input(input, &self.pool, now);
                self.handle_events(events);
            }

            Message::Measure(input) => {
                let events = self.display.handle_measure_input(input, &self.pool, now);
                self.handle_events(events);
            }

            Message::KeyPressed(key, modifiers) => {
                let key_str = key_to_string(&key, &modifiers);
                if !key_str.is_empty() {
                    self.on_key_pressed(&key_str, now);
                }
            }

            Message::KeyReleased(key, modifiers) => {
                let key_str = key_to_string(&key, &modifiers);
                if !key_str.is_empty() {
                    self.display.key_released(&key_str);
                }
            }

            Message::ToggleMeasureWindow => {
                let events = self.display.toggle_measure_window_visibility();
                self.handle_events(events);
            }

            Message::ToggleRenderingContent => {
                self.display.toggle_rendering_content();
            }

            Message::Refresh => {
                self.display.refresh(&self.pool);
                self.status = String::from("Refreshed");
            }

            Message::ResetZoom => {
                self.display.panel.reset_zoom();
            }

            Message::DividerPressed => {
                self.divider_drag_pending = true;
                self.divider_dragging = true;
            }

            Message::DividerMoved(point) => {
                if self.divider_dragging {
                    if self.divider_drag_pending {
                        self.display.divider_drag_start(point.y);
                        self.divider_drag_pending = false;
                    } else {
                        self.display.divider_drag_move(point.y);
                    }
                }
            }

            Message::DividerReleased => {
                if self.divider_dragging {
                    self.divider_dragging = false;
                    self.divider_drag_pending = false;
                    let events = self.display.divider_drag_end();
                    self.handle_events(events);
                }
            }
        }

        self.measure_window_config = self.display.measure_config();
        Task::none()
    }

    fn on_key_pressed(&mut self, key_str: &str, now: Instant) {
        let review = self.keybindings.review.clone();
        if review.matches_toggle_measure_window(key_str) {
            let events = self.display.toggle_measure_window_visibility();
            self.handle_events(events);
        } else if review.matches_toggle_rendering_content(key_str) {
            self.display.toggle_rendering_content();
        } else if review.matches_refresh(key_str) {
            self.display.refresh(&self.pool);
        } else if review.matches_reset_zoom(key_str) {
            self.display.panel.reset_zoom();
        } else if review.matches_pan_left(key_str) {
            self.display.panel.pan_by_percentage(-0.25);
        } else if review.matches_pan_right(key_str) {
            self.display.panel.pan_by_percentage(0.25);
        } else if review.matches_zoom_in(key_str) {
            if self.display.panel.has_reached_max_zoom() {
                self.display.push_toast("Max zoom reached", ToastIntent::Info, now);
            } else {
                self.display.panel.zoom_by_percentage_to_point(-0.4, 0.5);
            }
        } else if review.matches_zoom_out(key_str) {
            self.display.panel.zoom_by_percentage_to_point(0.4, 0.5);
        } else {
            let events = self.display.key_pressed(key_str, self.canvas_width);
            self.handle_events(events);
        }
    }

    /// Consume the display's interaction events. In a full deployment
    /// these feed the surrounding analyst application; the viewer applies
    /// them to its local model and status line.
    fn handle_events(&mut self, events: Vec<DisplayEvent>) {
        for event in events {
            match event {
                DisplayEvent::ChannelClicked {
                    channel_id,
                    time_secs,
                } => {
                    self.status = format!("Clicked {channel_id} at {time_secs:.2}s");
                }
                DisplayEvent::ChannelLabelClicked { station_id, .. } => {
                    self.status = format!("Station {station_id}");
                }
                DisplayEvent::ChannelExpanded { channel_id } => {
                    self.status = format!("Expanded {channel_id}");
                }
                DisplayEvent::ChannelCollapsed { channel_id } => {
                    self.status = format!("Collapsed {channel_id}");
                }
                DisplayEvent::SignalDetectionClicked { id } => {
                    self.display.set_selections(Selections {
                        signal_detections: vec![id.clone()],
                        ..Selections::default()
                    });
                    self.status = format!("Selected detection {id}");
                }
                DisplayEvent::SignalDetectionDragEnd { id, time_secs } => {
                    self.status = format!("Detection {id} moved to {time_secs:.2}s");
                }
                DisplayEvent::PredictedPhaseClicked { id } => {
                    self.status = format!("Selected predicted phase {id}");
                }
                DisplayEvent::PredictedPhaseDragEnd { id, time_secs } => {
                    self.status = format!("Predicted phase {id} moved to {time_secs:.2}s");
                }
                DisplayEvent::MaskClicked { mask_ids, .. } => {
                    self.status = format!("Masks: {}", mask_ids.join(", "));
                }
                DisplayEvent::MaskCreateDragEnd {
                    channel_id,
                    start_time_secs,
                    end_time_secs,
                    need_to_deselect,
                } => {
                    if let Some(channel_id) = channel_id {
                        self.create_mask(&channel_id, start_time_secs, end_time_secs);
                        if need_to_deselect {
                            self.display.set_selections(Selections::default());
                        }
                    }
                    self.display.clear_brush_stroke();
                }
                DisplayEvent::MarkerUpdated(marker) => {
                    self.status = format!("Marker {} at {:.2}s", marker.id, marker.time_secs);
                }
                DisplayEvent::SelectionWindowUpdated(window) => {
                    self.status = format!(
                        "Window {}: {:.2}s - {:.2}s",
                        window.id, window.start_marker.time_secs, window.end_marker.time_secs
                    );
                }
                DisplayEvent::SelectionWindowClicked { window, time_secs } => {
                    self.status = format!("Window {} clicked at {time_secs:.2}s", window.id);
                }
                DisplayEvent::MeasureWindowUpdated {
                    visible,
                    channel_id,
                    ..
                } => {
                    self.status = match (visible, channel_id) {
                        (true, Some(id)) => format!("Measure window: {id}"),
                        (true, None) => String::from("Measure window shown"),
                        (false, _) => String::from("Measure window hidden"),
                    };
                }
                DisplayEvent::SelectChannel { channel_id } => {
                    self.display.set_selections(Selections {
                        channels: vec![channel_id],
                        ..Selections::default()
                    });
                }
                DisplayEvent::MeasureWindowRequested(_) => {
                    // absorbed by the display; never reaches the app
                }
                DisplayEvent::KeyPressed { .. } => {}
                DisplayEvent::Notification { message, .. } => {
                    self.status = message;
                }
            }
        }
    }

    /// Apply a brush-created mask to the local model.
    fn create_mask(&mut self, channel_id: &str, start_time_secs: f64, end_time_secs: f64) {
        self.created_mask_count += 1;
        let mask = Mask {
            id: format!("analyst-mask-{}", self.created_mask_count),
            start_time_secs,
            end_time_secs,
            color: MASK_CREATE_COLOR,
        };
        for row in &mut self.display.panel.rows {
            let station = &mut row.station;
            let channel = if station.default_channel.id == channel_id {
                Some(&mut station.default_channel)
            } else {
                station
                    .non_default_channels
                    .iter_mut()
                    .find(|c| c.id == channel_id)
            };
            if let Some(channel) = channel {
                if let Some(waveform) = channel.waveform.as_mut() {
                    waveform.masks.push(mask.clone());
                    self.status = format!(
                        "Created mask on {channel_id}: {start_time_secs:.2}s - {end_time_secs:.2}s"
                    );
                }
                return;
            }
        }
    }

    /// Subscribe to periodic updates and keyboard events.
    pub fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            // ~30fps tick for worker polling and deferred clicks
            time::every(Duration::from_millis(33)).map(|_| Message::Tick),
            iced::keyboard::listen().filter_map(|event| match event {
                iced::keyboard::Event::KeyPressed { key, modifiers, .. } => {
                    Some(Message::KeyPressed(key, modifiers))
                }
                _ => None,
            }),
            iced::keyboard::listen().filter_map(|event| match event {
                iced::keyboard::Event::KeyReleased { key, modifiers, .. } => {
                    Some(Message::KeyReleased(key, modifiers))
                }
                _ => None,
            }),
        ])
    }

    /// Build the view.
    pub fn view(&self) -> Element<'_, Message> {
        let header = self.view_header();

        let mut content = column![header].spacing(6).padding(8);

        if self.display.show_measure_window {
            content = content.push(self.view_measure_window());
            content = content.push(self.view_divider());
        }

        let panel = waveform_panel(&self.display.panel, &self.display.config, Message::Panel);
        content = content.push(
            scrollable(panel)
                .width(Fill)
                .height(Fill),
        );

        content = content.push(self.view_toasts());
        content = content.push(self.view_status_bar());

        container(content).width(Fill).height(Fill).into()
    }

    fn view_header(&self) -> Element<'_, Message> {
        let title = text("QUIVER").size(20);

        let view_range = self.display.get_current_view_range_in_seconds();
        let range_label = text(format!(
            "view: {:.1}s - {:.1}s ({:.1}s)",
            view_range.start_time_secs,
            view_range.end_time_secs,
            view_range.duration_secs()
        ))
        .size(12);

        row![
            title,
            Space::new().width(Fill),
            button(text("Measure window").size(12)).on_press(Message::ToggleMeasureWindow),
            button(text("Content").size(12)).on_press(Message::ToggleRenderingContent),
            button(text("Refresh").size(12)).on_press(Message::Refresh),
            button(text("Reset zoom").size(12)).on_press(Message::ResetZoom),
            Space::new().width(Fill),
            range_label,
        ]
        .spacing(8)
        .align_y(Center)
        .into()
    }

    fn view_measure_window(&self) -> Element<'_, Message> {
        let body: Element<'_, Message> = match &self.display.measure_panel {
            Some(measure) => {
                waveform_panel(measure, &self.measure_window_config, Message::Measure)
            }
            None => container(text("No measure window data selected").size(14))
                .width(Fill)
                .height(Length::Fixed(self.display.measure_window_height_px))
                .center_x(Fill)
                .center_y(Fill)
                .into(),
        };

        container(body)
            .width(Fill)
            .height(Length::Fixed(self.display.measure_window_height_px))
            .into()
    }

    fn view_divider(&self) -> Element<'_, Message> {
        mouse_area(
            container(Space::new().width(Fill).height(Length::Fixed(6.0))).width(Fill),
        )
        .on_press(Message::DividerPressed)
        .on_move(Message::DividerMoved)
        .on_release(Message::DividerReleased)
        .into()
    }

    fn view_toasts(&self) -> Element<'_, Message> {
        let mut toasts = row![].spacing(12);
        for toast in self.display.toasts() {
            let prefix = match toast.intent {
                ToastIntent::Info => "\u{24D8}",
                ToastIntent::Warning => "\u{26A0}",
                ToastIntent::Danger => "\u{2716}",
            };
            toasts = toasts.push(text(format!("{prefix} {}", toast.message)).size(12));
        }
        toasts.into()
    }

    fn view_status_bar(&self) -> Element<'_, Message> {
        container(text(&self.status).size(12)).padding(4).into()
    }

    /// Get the theme.
    pub fn theme(&self) -> Theme {
        Theme::Dark
    }
}

impl QuiverApp {
    /// Record the waveform canvas width so hotkey handling can resolve the
    /// hovered channel. Updated from layout when the window resizes.
    pub fn set_canvas_width(&mut self, width: f32) {
        self.canvas_width = width;
    }
}
