//! Canvas `Program` for the waveform panel.
//!
//! The canvas is a thin translator: `update()` converts raw pointer and
//! modifier events into [`PanelInput`] values published through a single
//! closure, and `draw()` renders the station rows, markers, brush overlay,
//! crosshair, and time axis from the panel state. All state mutation
//! happens in the application's `update` via [`WaveformPanel::on_input`].

use std::time::Instant;

use iced::alignment::{Horizontal, Vertical};
use iced::widget::canvas::{
    self, Canvas, Event, Frame, Geometry, LineDash, Path, Program, Stroke, Text,
};
use iced::{keyboard, mouse, Element, Length, Point, Rectangle, Size, Theme};

use quiver_core::config::DisplayConfiguration;
use quiver_core::model::{Marker, Markers};
use quiver_core::types::{LineStyle, TimeRange};
use quiver_core::view::ViewTransform;

use crate::markers::filter_visible;
use crate::panel::{live_marker_percent, BrushType, PanelInput, WaveformPanel, DOUBLE_CLICK_DELAY};
use crate::theme;

/// Height of the time-axis strip under the channel rows.
pub const AXIS_HEIGHT_PX: f32 = 22.0;

const DASH_SEGMENTS: [f32; 2] = [4.0, 4.0];

/// Interaction state tracked by the canvas itself: the current keyboard
/// modifiers and the double-click detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanelInteraction {
    modifiers: keyboard::Modifiers,
    mouse_down: bool,
    last_press_at: Option<Instant>,
    last_view_x: f64,
}

/// Canvas program rendering a [`WaveformPanel`].
pub struct PanelCanvas<'a, Message, F>
where
    F: Fn(PanelInput) -> Message,
{
    pub panel: &'a WaveformPanel,
    pub config: &'a DisplayConfiguration,
    pub on_input: F,
}

impl<'a, Message, F> PanelCanvas<'a, Message, F>
where
    F: Fn(PanelInput) -> Message,
{
    fn view_x(&self, bounds: Rectangle, x_px: f32) -> f64 {
        let label = self.config.label_width_px;
        ((x_px - label) / (bounds.width - label).max(1.0)) as f64
    }
}

impl<'a, Message, F> Program<Message> for PanelCanvas<'a, Message, F>
where
    Message: Clone,
    F: Fn(PanelInput) -> Message,
{
    type State = PanelInteraction;

    fn update(
        &self,
        interaction: &mut Self::State,
        event: &Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Option<canvas::Action<Message>> {
        if let Event::Keyboard(keyboard::Event::ModifiersChanged(modifiers)) = event {
            interaction.modifiers = *modifiers;
            return None;
        }

        if let Some(position) = cursor.position_in(bounds) {
            let view_x = self.view_x(bounds, position.x);
            interaction.last_view_x = view_x;
            match event {
                Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                    let now = Instant::now();
                    let is_double = interaction
                        .last_press_at
                        .is_some_and(|at| now.duration_since(at) < DOUBLE_CLICK_DELAY);
                    interaction.mouse_down = true;
                    if is_double {
                        interaction.last_press_at = None;
                        return Some(canvas::Action::publish((self.on_input)(
                            PanelInput::DoubleClicked,
                        )));
                    }
                    interaction.last_press_at = Some(now);
                    let hit =
                        self.panel
                            .hit_test(self.config, bounds.width, position.x, position.y);
                    return Some(canvas::Action::publish((self.on_input)(
                        PanelInput::Pressed {
                            view_x,
                            x_px: position.x,
                            y_px: position.y,
                            ctrl_or_cmd: interaction.modifiers.control()
                                || interaction.modifiers.logo(),
                            shift: interaction.modifiers.shift(),
                            hit,
                        },
                    )));
                }
                Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                    interaction.mouse_down = false;
                    return Some(canvas::Action::publish((self.on_input)(
                        PanelInput::Released { view_x },
                    )));
                }
                Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                    return Some(canvas::Action::publish((self.on_input)(PanelInput::Moved {
                        view_x,
                        x_px: position.x,
                        y_px: position.y,
                    })));
                }
                Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                    let ctrl_or_cmd =
                        interaction.modifiers.control() || interaction.modifiers.logo();
                    if ctrl_or_cmd {
                        let y = match delta {
                            mouse::ScrollDelta::Lines { y, .. } => *y,
                            mouse::ScrollDelta::Pixels { y, .. } => *y,
                        };
                        if y != 0.0 {
                            return Some(canvas::Action::publish((self.on_input)(
                                PanelInput::Wheel {
                                    ctrl_or_cmd,
                                    shift: interaction.modifiers.shift(),
                                    zoom_in: y > 0.0,
                                    anchor_view_x: view_x,
                                },
                            )));
                        }
                    }
                }
                _ => {}
            }
        } else if matches!(event, Event::Mouse(mouse::Event::ButtonReleased(_)))
            && interaction.mouse_down
        {
            // finish drags even when the pointer leaves the canvas
            interaction.mouse_down = false;
            return Some(canvas::Action::publish((self.on_input)(
                PanelInput::Released {
                    view_x: interaction.last_view_x,
                },
            )));
        }

        None
    }

    fn mouse_interaction(
        &self,
        _interaction: &Self::State,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        if cursor.is_over(bounds) {
            mouse::Interaction::Crosshair
        } else {
            mouse::Interaction::default()
        }
    }

    fn draw(
        &self,
        _interaction: &Self::State,
        renderer: &iced::Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(Point::ORIGIN, bounds.size(), theme::BACKGROUND);

        let label_width = self.config.label_width_px;
        let area = Rectangle {
            x: label_width,
            y: 0.0,
            width: (bounds.width - label_width).max(1.0),
            height: self.panel.rows_height(self.config),
        };
        let transform = self.panel.transform();

        frame.fill_rectangle(
            Point::ORIGIN,
            Size::new(label_width, bounds.height),
            theme::LABEL_BACKGROUND,
        );

        for layout in self.panel.layout_rows(self.config) {
            let row = &self.panel.rows[layout.channel.station_idx];
            let Some((channel, _)) = row.channel_by_id(&layout.channel.channel_id) else {
                continue;
            };
            let renderer_state = if layout.channel.is_default {
                &row.default_renderer
            } else {
                match row
                    .station
                    .non_default_channels
                    .iter()
                    .position(|c| c.id == layout.channel.channel_id)
                {
                    Some(index) => &row.non_default_renderers[index],
                    None => continue,
                }
            };

            let row_rect = Rectangle {
                x: area.x,
                y: layout.y,
                width: area.width,
                height: layout.height,
            };

            let selected = self
                .panel
                .selections
                .channels
                .iter()
                .any(|id| id == &layout.channel.channel_id);

            renderer_state.draw(
                &mut frame,
                row_rect,
                &transform,
                channel,
                self.config.should_render_waveforms,
                self.config.should_render_spectrograms,
                selected,
            );

            // measure-window selection highlight on its source channel
            if let Some((channel_id, start, end)) = &row.measure_selection {
                if channel_id == &layout.channel.channel_id {
                    draw_time_band(
                        &mut frame,
                        row_rect,
                        &transform,
                        *start,
                        *end,
                        theme::MEASURE_SELECTION,
                    );
                }
            }

            // channel-level markers stay within the row
            draw_marker_group(
                &mut frame,
                row_rect,
                &transform,
                &channel.markers,
                self.panel.time_range,
                None,
            );

            draw_row_label(
                &mut frame,
                &layout,
                row,
                channel.name.as_str(),
                renderer_state.y_axis_bounds(),
                label_width,
                self.panel.custom_label,
            );

            frame.stroke(
                &Path::line(
                    Point::new(0.0, layout.y + layout.height),
                    Point::new(bounds.width, layout.y + layout.height),
                ),
                Stroke::default().with_color(theme::ROW_DIVIDER).with_width(1.0),
            );
        }

        // panel-level markers span every row
        draw_marker_group(
            &mut frame,
            area,
            &transform,
            &self.panel.markers,
            self.panel.time_range,
            Some(self.panel),
        );

        draw_brush(&mut frame, area, self.panel);

        if let Some(view_x) = self.panel.pick_drag_view_x() {
            let x = area.x + view_x as f32 * area.width;
            frame.stroke(
                &Path::line(Point::new(x, area.y), Point::new(x, area.y + area.height)),
                Stroke::default().with_color(theme::CROSSHAIR).with_width(1.5),
            );
        }

        if let Some(view_x) = self.panel.cursor_view_x {
            if (0.0..=1.0).contains(&view_x) {
                let x = area.x + view_x as f32 * area.width;
                frame.stroke(
                    &Path::line(Point::new(x, area.y), Point::new(x, area.y + area.height)),
                    Stroke::default().with_color(theme::CROSSHAIR).with_width(1.0),
                );
            }
        }

        draw_time_axis(&mut frame, bounds, area, &transform);

        vec![frame.into_geometry()]
    }
}

/// Create a waveform panel element.
///
/// `on_input` maps raw panel interaction to the application's message
/// type; feed the published values back through
/// [`WaveformPanel::on_input`].
pub fn waveform_panel<'a, Message>(
    panel: &'a WaveformPanel,
    config: &'a DisplayConfiguration,
    on_input: impl Fn(PanelInput) -> Message + 'a,
) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    let height = panel.rows_height(config) + AXIS_HEIGHT_PX;
    Canvas::new(PanelCanvas {
        panel,
        config,
        on_input,
    })
    .width(Length::Fill)
    .height(Length::Fixed(height.max(AXIS_HEIGHT_PX)))
    .into()
}

fn marker_stroke(marker: &Marker) -> Stroke<'static> {
    let stroke = Stroke::default()
        .with_color(theme::color(marker.color))
        .with_width(1.0);
    match marker.line_style {
        LineStyle::Solid => stroke,
        LineStyle::Dashed => Stroke {
            line_dash: LineDash {
                segments: &DASH_SEGMENTS,
                offset: 0,
            },
            ..stroke
        },
    }
}

fn draw_marker_line(frame: &mut Frame, rect: Rectangle, x: f32, marker: &Marker) {
    frame.stroke(
        &Path::line(Point::new(x, rect.y), Point::new(x, rect.y + rect.height)),
        marker_stroke(marker),
    );
}

/// Draw a marker group into a rectangle. When `panel` is given, moveable
/// markers and window edges render at their live drag positions.
fn draw_marker_group(
    frame: &mut Frame,
    rect: Rectangle,
    transform: &ViewTransform,
    markers: &Markers,
    total: TimeRange,
    panel: Option<&WaveformPanel>,
) {
    let percent_to_x = |percent: f64| {
        let view_x = transform.view_x_of_fraction(percent / 100.0);
        rect.x + view_x as f32 * rect.width
    };

    for marker in filter_visible(&markers.vertical_markers, total) {
        let percent = quiver_core::view::left_percent(
            marker.time_secs,
            total.start_time_secs,
            total.end_time_secs,
        );
        draw_marker_line(frame, rect, percent_to_x(percent), marker);
    }

    for marker in filter_visible(&markers.moveable_markers, total) {
        let percent = match panel {
            Some(panel) => live_marker_percent(panel, marker),
            None => quiver_core::view::left_percent(
                marker.time_secs,
                total.start_time_secs,
                total.end_time_secs,
            ),
        };
        draw_marker_line(frame, rect, percent_to_x(percent), marker);
    }

    for window in &markers.selection_windows {
        let start_percent = match panel {
            Some(panel) => live_marker_percent(panel, &window.start_marker),
            None => quiver_core::view::left_percent(
                window.start_marker.time_secs,
                total.start_time_secs,
                total.end_time_secs,
            ),
        };
        let end_percent = match panel {
            Some(panel) => live_marker_percent(panel, &window.end_marker),
            None => quiver_core::view::left_percent(
                window.end_marker.time_secs,
                total.start_time_secs,
                total.end_time_secs,
            ),
        };
        let left = percent_to_x(start_percent).max(rect.x);
        let right = percent_to_x(end_percent).min(rect.x + rect.width);
        if right > left {
            frame.fill_rectangle(
                Point::new(left, rect.y),
                Size::new(right - left, rect.height),
                theme::color_with_alpha(window.color, 0.22),
            );
        }
        draw_marker_line(frame, rect, percent_to_x(start_percent), &window.start_marker);
        draw_marker_line(frame, rect, percent_to_x(end_percent), &window.end_marker);
    }
}

fn draw_time_band(
    frame: &mut Frame,
    rect: Rectangle,
    transform: &ViewTransform,
    start_secs: f64,
    end_secs: f64,
    color: iced::Color,
) {
    let left = rect.x + transform.view_x_of_time(start_secs) as f32 * rect.width;
    let right = rect.x + transform.view_x_of_time(end_secs) as f32 * rect.width;
    let left = left.max(rect.x);
    let right = right.min(rect.x + rect.width);
    if right > left {
        frame.fill_rectangle(
            Point::new(left, rect.y),
            Size::new(right - left, rect.height),
            color,
        );
    }
}

fn draw_brush(frame: &mut Frame, area: Rectangle, panel: &WaveformPanel) {
    let Some(brush) = panel.brush() else { return };
    if !brush.painting {
        return;
    }
    let (lo, hi) = if brush.start_view_x <= brush.current_view_x {
        (brush.start_view_x, brush.current_view_x)
    } else {
        (brush.current_view_x, brush.start_view_x)
    };
    let left = area.x + (lo.max(0.0) as f32) * area.width;
    let right = area.x + (hi.min(1.0) as f32) * area.width;
    if right <= left {
        return;
    }
    let color = match brush.brush {
        BrushType::Zoom => theme::ZOOM_BRUSH,
        BrushType::CreateMask => theme::MASK_BRUSH,
        BrushType::Measure => theme::MEASURE_SELECTION,
    };
    frame.fill_rectangle(
        Point::new(left, area.y),
        Size::new(right - left, area.height),
        color,
    );
}

#[allow(clippy::too_many_arguments)]
fn draw_row_label(
    frame: &mut Frame,
    layout: &super::RowLayout,
    row: &crate::station::StationRow,
    channel_name: &str,
    y_bounds: (f32, f32),
    label_width: f32,
    custom_label: Option<super::LabelFormatter>,
) {
    let title = if let Some(format_label) = custom_label {
        format_label(row, layout.channel.is_default, channel_name)
    } else if layout.channel.is_default {
        let mut title = row.label();
        if row.is_expandable() {
            title = format!("{} {}", if row.expanded { "\u{25BE}" } else { "\u{25B8}" }, title);
        }
        title
    } else {
        format!("  {channel_name}")
    };

    frame.fill_text(Text {
        content: title,
        position: Point::new(6.0, layout.y + 4.0),
        color: theme::LABEL_TEXT,
        size: 12.0.into(),
        align_x: Horizontal::Left.into(),
        align_y: Vertical::Top.into(),
        ..Text::default()
    });

    let (bottom, top) = y_bounds;
    frame.fill_text(Text {
        content: format!("{top:.1}"),
        position: Point::new(label_width - 6.0, layout.y + 3.0),
        color: theme::AXIS,
        size: 10.0.into(),
        align_x: Horizontal::Right.into(),
        align_y: Vertical::Top.into(),
        ..Text::default()
    });
    frame.fill_text(Text {
        content: format!("{bottom:.1}"),
        position: Point::new(label_width - 6.0, layout.y + layout.height - 3.0),
        color: theme::AXIS,
        size: 10.0.into(),
        align_x: Horizontal::Right.into(),
        align_y: Vertical::Bottom.into(),
        ..Text::default()
    });
}

fn draw_time_axis(frame: &mut Frame, bounds: Rectangle, area: Rectangle, transform: &ViewTransform) {
    let axis_y = area.y + area.height;
    frame.stroke(
        &Path::line(Point::new(area.x, axis_y), Point::new(bounds.width, axis_y)),
        Stroke::default().with_color(theme::AXIS).with_width(1.0),
    );

    let visible = transform.visible_time_range();
    let step = tick_step_secs(visible.duration_secs());
    let mut tick = (visible.start_time_secs / step).ceil() * step;
    while tick <= visible.end_time_secs {
        let x = area.x + transform.view_x_of_time(tick) as f32 * area.width;
        frame.stroke(
            &Path::line(Point::new(x, axis_y), Point::new(x, axis_y + 5.0)),
            Stroke::default().with_color(theme::AXIS).with_width(1.0),
        );
        frame.fill_text(Text {
            content: format_clock(tick),
            position: Point::new(x, axis_y + 7.0),
            color: theme::AXIS,
            size: 10.0.into(),
            align_x: Horizontal::Center.into(),
            align_y: Vertical::Top.into(),
            ..Text::default()
        });
        tick += step;
    }

    // live readout of the visible range
    frame.fill_text(Text {
        content: format!(
            "{} + {:.1}s",
            format_clock(visible.start_time_secs),
            visible.duration_secs()
        ),
        position: Point::new(area.x + 4.0, axis_y + 7.0),
        color: theme::LABEL_TEXT,
        size: 10.0.into(),
        align_x: Horizontal::Left.into(),
        align_y: Vertical::Top.into(),
        ..Text::default()
    });
}

/// Pick a round tick step that yields at most ten ticks across the view.
fn tick_step_secs(visible_secs: f64) -> f64 {
    const STEPS: [f64; 16] = [
        0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
        7200.0, 21600.0,
    ];
    for step in STEPS {
        if visible_secs / step <= 10.0 {
            return step;
        }
    }
    86400.0
}

/// Wall-clock HH:MM:SS for an epoch time (UTC).
fn format_clock(epoch_secs: f64) -> String {
    let day_secs = epoch_secs.rem_euclid(86_400.0) as u64;
    let hours = day_secs / 3600;
    let minutes = (day_secs % 3600) / 60;
    let seconds = day_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_step_bounds_tick_count() {
        for visible in [0.5, 3.0, 47.0, 600.0, 7200.0, 90_000.0] {
            let step = tick_step_secs(visible);
            assert!(visible / step <= 10.0, "visible {visible} step {step}");
        }
    }

    #[test]
    fn clock_formatting_wraps_at_midnight() {
        assert_eq!(format_clock(0.0), "00:00:00");
        assert_eq!(format_clock(86_399.0), "23:59:59");
        assert_eq!(format_clock(86_400.0 + 3_725.0), "01:02:05");
    }
}
