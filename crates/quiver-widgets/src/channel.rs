//! Per-channel waveform rendering.
//!
//! A [`ChannelRenderer`] owns the renderable state for one channel row:
//! prepared position buffers, camera bounds, and the manual amplitude
//! adjustment. It moves through three states — no data, awaiting worker
//! conversion, scene populated — and re-enters the awaiting state whenever
//! the channel's segments or the display range change.
//!
//! Buffer preparation happens on the position-buffer pool. Every request
//! round bumps the renderer's generation; a response carrying an older
//! generation is discarded, so a display-range change can never apply a
//! buffer built against stale bounds.

use std::collections::HashMap;

use iced::widget::canvas::{Frame, Path, Stroke, Text};
use iced::{Color, Point, Rectangle, Size};
use quiver_core::buffer::{CameraBounds, ChannelBounds, PositionBufferParams};
use quiver_core::model::{Channel, Mask, PickMarker, SpectrogramContent, TheoreticalPhaseWindow};
use quiver_core::pool::{BufferRequest, BufferResponse, PositionBufferPool};
use quiver_core::types::{DisplayType, Rgba, TimeRange};
use quiver_core::view::ViewTransform;

use crate::theme;

/// GL x coordinate of the display start.
pub const GL_UNITS_MIN: f32 = 0.0;

/// GL x coordinate of the display end.
pub const GL_UNITS_MAX: f32 = 100.0;

/// Fraction of the current camera range applied per amplitude-drag step.
const AMPLITUDE_STEP_FRACTION: f32 = 0.05;

/// Rendering state of a channel scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    /// No waveform content
    Empty,
    /// Buffer requests are in flight
    Pending,
    /// All buffers for the current generation have arrived
    Ready,
}

/// Display styling carried from a data segment to its prepared buffer.
#[derive(Debug, Clone, Copy)]
struct SegmentStyle {
    color: Option<Rgba>,
    display_type: DisplayType,
    point_size: f32,
}

/// A position buffer ready for drawing.
#[derive(Debug, Clone)]
struct PreparedSegment {
    positions: Vec<f32>,
    style: SegmentStyle,
}

/// Renderable state for one channel row.
#[derive(Debug)]
pub struct ChannelRenderer {
    /// Pool-facing id, scoped by the owning panel so main and measure
    /// panels never swallow each other's responses
    scoped_id: String,
    /// Model channel id
    pub channel_id: String,
    generation: u64,
    state: SceneState,
    pending: usize,
    prepared: Vec<PreparedSegment>,
    staged_styles: HashMap<String, SegmentStyle>,
    bounds: Option<ChannelBounds>,
    camera_top_max: f32,
    camera_bottom_max: f32,
    amplitude_adjustment: f32,
}

impl ChannelRenderer {
    pub fn new(scope: &str, channel_id: impl Into<String>) -> Self {
        let channel_id = channel_id.into();
        Self {
            scoped_id: format!("{scope}:{channel_id}"),
            channel_id,
            generation: 0,
            state: SceneState::Empty,
            pending: 0,
            prepared: Vec::new(),
            staged_styles: HashMap::new(),
            bounds: None,
            camera_top_max: CameraBounds::DEFAULT.top,
            camera_bottom_max: CameraBounds::DEFAULT.bottom,
            amplitude_adjustment: 0.0,
        }
    }

    pub fn scoped_id(&self) -> &str {
        &self.scoped_id
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current camera bounds: the auto-scaled maxima with the manual
    /// amplitude adjustment applied on top.
    pub fn camera(&self) -> CameraBounds {
        CameraBounds {
            top: self.camera_top_max - self.amplitude_adjustment,
            bottom: self.camera_bottom_max + self.amplitude_adjustment,
        }
    }

    /// (bottom, top) amplitude bounds for the channel label.
    pub fn y_axis_bounds(&self) -> (f32, f32) {
        let camera = self.camera();
        (camera.bottom, camera.top)
    }

    /// Apply one amplitude-drag step. Upward cursor motion
    /// (`cursor_delta_y > 0`) shrinks the camera range, magnifying the
    /// trace; downward motion expands it. Each step moves both bounds by 5%
    /// of the current range and accumulates into the adjustment so the
    /// auto-scaled maxima are preserved for reset.
    pub fn scale_amplitude(&mut self, cursor_delta_y: f32) {
        if cursor_delta_y == 0.0 {
            return;
        }
        let step = self.camera().range() * AMPLITUDE_STEP_FRACTION;
        if cursor_delta_y > 0.0 {
            self.amplitude_adjustment += step;
        } else {
            self.amplitude_adjustment -= step;
        }
    }

    /// Restore the auto-scaled camera bounds and clear the accumulated
    /// adjustment. Calling this twice produces the same bounds as once.
    pub fn reset_amplitude(&mut self) {
        self.amplitude_adjustment = 0.0;
    }

    /// Re-request position buffers for the channel against a display range.
    ///
    /// Bumps the generation (orphaning any in-flight responses), recomputes
    /// amplitude boundaries and camera maxima, and submits one request per
    /// data segment. The channel's time offset is applied to all temporal
    /// data here, before conversion.
    pub fn request_buffers(
        &mut self,
        channel: &Channel,
        display: TimeRange,
        pool: &PositionBufferPool,
    ) {
        self.generation += 1;
        self.prepared.clear();
        self.staged_styles.clear();
        self.pending = 0;

        let segment = channel
            .waveform
            .as_ref()
            .and_then(|waveform| waveform.active_segment().map(|s| (waveform, s)));
        let Some((waveform, segment)) = segment else {
            self.state = SceneState::Empty;
            self.bounds = None;
            self.camera_top_max = CameraBounds::DEFAULT.top;
            self.camera_bottom_max = CameraBounds::DEFAULT.bottom;
            return;
        };

        self.bounds = ChannelBounds::from_segment(segment);
        let auto = self
            .bounds
            .map(|b| b.camera_bounds())
            .unwrap_or(CameraBounds::DEFAULT);
        self.camera_top_max = auto.top;
        self.camera_bottom_max = auto.bottom;

        for (index, data_segment) in segment.data_segments.iter().enumerate() {
            if data_segment.data.is_empty() {
                continue;
            }
            let segment_key = format!("{}#{index}", waveform.channel_segment_id);
            self.staged_styles.insert(
                segment_key.clone(),
                SegmentStyle {
                    color: data_segment.color,
                    display_type: data_segment.display_type.unwrap_or(DisplayType::Line),
                    point_size: data_segment.point_size.unwrap_or(2.0),
                },
            );
            let request = BufferRequest {
                channel_id: self.scoped_id.clone(),
                segment_key,
                generation: self.generation,
                params: PositionBufferParams {
                    samples: data_segment.data.clone(),
                    start_time_secs: data_segment.start_time_secs + channel.time_offset_seconds,
                    sample_rate: data_segment.sample_rate,
                    display_start_time_secs: display.start_time_secs,
                    display_end_time_secs: display.end_time_secs,
                    gl_min: GL_UNITS_MIN,
                    gl_max: GL_UNITS_MAX,
                },
            };
            match pool.submit(request) {
                Ok(()) => self.pending += 1,
                Err(e) => {
                    log::error!("channel {}: {e}", self.channel_id);
                }
            }
        }

        self.state = if self.pending == 0 {
            SceneState::Empty
        } else {
            SceneState::Pending
        };
    }

    /// Apply a worker response. Returns `false` (and changes nothing) when
    /// the response is stale, i.e. the channel's generation has advanced
    /// past the request's.
    pub fn apply_response(&mut self, response: BufferResponse) -> bool {
        if response.generation != self.generation {
            log::debug!(
                "channel {}: discarding stale buffer (generation {} != {})",
                self.channel_id,
                response.generation,
                self.generation
            );
            return false;
        }
        let Some(style) = self.staged_styles.remove(&response.segment_key) else {
            log::debug!(
                "channel {}: response for unknown segment {}",
                self.channel_id,
                response.segment_key
            );
            return false;
        };
        self.prepared.push(PreparedSegment {
            positions: response.positions,
            style,
        });
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 {
            self.state = SceneState::Ready;
        }
        true
    }

    /// Draw the channel's content into its row rectangle.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &self,
        frame: &mut Frame,
        rect: Rectangle,
        transform: &ViewTransform,
        channel: &Channel,
        render_waveforms: bool,
        render_spectrograms: bool,
        selected: bool,
    ) {
        if selected {
            frame.fill_rectangle(
                Point::new(rect.x, rect.y),
                Size::new(rect.width, rect.height),
                Color::from_rgba(0.35, 0.45, 0.7, 0.12),
            );
        }

        let offset = channel.time_offset_seconds;

        if let (true, Some(spectrogram)) = (render_spectrograms, channel.spectrogram.as_ref()) {
            draw_spectrogram(frame, rect, transform, spectrogram, offset);
        }

        if let Some(waveform) = &channel.waveform {
            draw_masks(frame, rect, transform, &waveform.masks, offset);
            draw_phase_windows(
                frame,
                rect,
                transform,
                &waveform.theoretical_phase_windows,
                offset,
            );

            if render_waveforms {
                let camera = self.camera();
                for segment in &self.prepared {
                    draw_segment(frame, rect, transform, segment, camera);
                }
            }

            for pick in &waveform.signal_detections {
                draw_pick(frame, rect, transform, pick, offset);
            }
            for pick in &waveform.predicted_phases {
                draw_pick(frame, rect, transform, pick, offset);
            }
        }
    }
}

/// Vertical pixel for an amplitude under the given camera.
fn project_y(camera: CameraBounds, rect_y: f32, rect_height: f32, amplitude: f32) -> f32 {
    let range = camera.top - camera.bottom;
    if range <= f32::EPSILON {
        return rect_y + rect_height / 2.0;
    }
    rect_y + (camera.top - amplitude) / range * rect_height
}

/// Horizontal pixel for a GL x coordinate, or `None` when far off screen.
fn project_gl_x(transform: &ViewTransform, rect: Rectangle, gl: f32) -> Option<f32> {
    let fraction = ((gl - transform.gl_min) / (transform.gl_max - transform.gl_min)) as f64;
    let view_x = transform.view_x_of_fraction(fraction);
    if !(-0.1..=1.1).contains(&view_x) {
        return None;
    }
    Some(rect.x + view_x as f32 * rect.width)
}

fn draw_segment(
    frame: &mut Frame,
    rect: Rectangle,
    transform: &ViewTransform,
    segment: &PreparedSegment,
    camera: CameraBounds,
) {
    let vertex_count = segment.positions.len() / 3;
    if vertex_count == 0 {
        return;
    }
    let color = segment
        .style
        .color
        .map(theme::color)
        .unwrap_or(theme::WAVEFORM_DEFAULT);

    // subsample when there are far more vertices than pixels
    let step = (vertex_count / (rect.width.max(1.0) as usize * 2)).max(1);

    match segment.style.display_type {
        DisplayType::Line => {
            let path = Path::new(|builder| {
                let mut started = false;
                for i in (0..vertex_count).step_by(step) {
                    let gl_x = segment.positions[i * 3];
                    let amplitude = segment.positions[i * 3 + 1];
                    let Some(x) = project_gl_x(transform, rect, gl_x) else {
                        continue;
                    };
                    let y = project_y(camera, rect.y, rect.height, amplitude);
                    if started {
                        builder.line_to(Point::new(x, y));
                    } else {
                        builder.move_to(Point::new(x, y));
                        started = true;
                    }
                }
            });
            frame.stroke(&path, Stroke::default().with_color(color).with_width(1.0));
        }
        DisplayType::Scatter => {
            let radius = segment.style.point_size / 2.0;
            for i in (0..vertex_count).step_by(step) {
                let gl_x = segment.positions[i * 3];
                let amplitude = segment.positions[i * 3 + 1];
                let Some(x) = project_gl_x(transform, rect, gl_x) else {
                    continue;
                };
                let y = project_y(camera, rect.y, rect.height, amplitude);
                frame.fill(&Path::circle(Point::new(x, y), radius), color);
            }
        }
    }
}

fn draw_masks(
    frame: &mut Frame,
    rect: Rectangle,
    transform: &ViewTransform,
    masks: &[Mask],
    offset: f64,
) {
    // shortest masks first so longer ones layer on top, matching the
    // render-order discipline of the scene graph this replaces
    let mut sorted: Vec<&Mask> = masks.iter().collect();
    sorted.sort_by(|a, b| a.duration_secs().total_cmp(&b.duration_secs()));

    for mask in sorted {
        let interval = mask.render_interval();
        let start_x = rect.x
            + transform.view_x_of_time(interval.start_time_secs + offset) as f32 * rect.width;
        let end_x =
            rect.x + transform.view_x_of_time(interval.end_time_secs + offset) as f32 * rect.width;
        let left = start_x.max(rect.x);
        let right = end_x.min(rect.x + rect.width);
        if right <= left {
            continue;
        }
        frame.fill_rectangle(
            Point::new(left, rect.y),
            Size::new(right - left, rect.height),
            theme::color_with_alpha(mask.color, theme::MASK_ALPHA),
        );
    }
}

fn draw_phase_windows(
    frame: &mut Frame,
    rect: Rectangle,
    transform: &ViewTransform,
    windows: &[TheoreticalPhaseWindow],
    offset: f64,
) {
    for window in windows {
        let start_x =
            rect.x + transform.view_x_of_time(window.start_time_secs + offset) as f32 * rect.width;
        let end_x =
            rect.x + transform.view_x_of_time(window.end_time_secs + offset) as f32 * rect.width;
        let left = start_x.max(rect.x);
        let right = end_x.min(rect.x + rect.width);
        if right <= left {
            continue;
        }
        frame.fill_rectangle(
            Point::new(left, rect.y),
            Size::new(right - left, rect.height),
            theme::color_with_alpha(window.color, 0.18),
        );
        frame.fill_text(Text {
            content: window.label.clone(),
            position: Point::new(left + 3.0, rect.y + 2.0),
            color: theme::color(window.color),
            size: 11.0.into(),
            ..Text::default()
        });
    }
}

fn draw_pick(
    frame: &mut Frame,
    rect: Rectangle,
    transform: &ViewTransform,
    pick: &PickMarker,
    offset: f64,
) {
    let view_x = transform.view_x_of_time(pick.time_secs + offset);
    if !(0.0..=1.0).contains(&view_x) {
        return;
    }
    let x = rect.x + view_x as f32 * rect.width;
    let color = theme::color(pick.color);

    // detections occupy the upper part of the row, predictions the lower
    let (top, bottom) = if pick.predicted {
        (rect.y + rect.height * 0.55, rect.y + rect.height * 0.9)
    } else {
        (rect.y + rect.height * 0.1, rect.y + rect.height * 0.45)
    };

    if pick.is_selected {
        frame.stroke(
            &Path::line(Point::new(x, top), Point::new(x, bottom)),
            Stroke::default()
                .with_color(theme::color_with_alpha(pick.color, 0.35))
                .with_width(6.0),
        );
    }
    frame.stroke(
        &Path::line(Point::new(x, top), Point::new(x, bottom)),
        Stroke::default().with_color(color).with_width(1.5),
    );
    frame.fill_text(Text {
        content: pick.label.clone(),
        position: Point::new(x + 4.0, top),
        color,
        size: 11.0.into(),
        ..Text::default()
    });
}

fn draw_spectrogram(
    frame: &mut Frame,
    rect: Rectangle,
    transform: &ViewTransform,
    spectrogram: &SpectrogramContent,
    offset: f64,
) {
    let max_power = spectrogram
        .data
        .iter()
        .flatten()
        .fold(0.0f32, |acc, &p| acc.max(p));
    if max_power <= 0.0 {
        return;
    }

    for (column, powers) in spectrogram.data.iter().enumerate() {
        let start = spectrogram.start_time_secs + column as f64 * spectrogram.time_step + offset;
        let left = rect.x + transform.view_x_of_time(start) as f32 * rect.width;
        let right =
            rect.x + transform.view_x_of_time(start + spectrogram.time_step) as f32 * rect.width;
        if right < rect.x || left > rect.x + rect.width {
            continue;
        }
        let cell_height = rect.height / powers.len().max(1) as f32;
        for (row, &power) in powers.iter().enumerate() {
            // low frequencies at the bottom of the row
            let y = rect.y + rect.height - (row + 1) as f32 * cell_height;
            frame.fill_rectangle(
                Point::new(left.max(rect.x), y),
                Size::new(right.min(rect.x + rect.width) - left.max(rect.x), cell_height),
                theme::spectrogram_color(power / max_power),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::model::{ChannelSegment, DataSegment, WaveformContent};
    use quiver_core::pool::PositionBufferPool;

    fn channel_with(data: Vec<f32>) -> Channel {
        let mut channel = Channel::new("STA01/SHZ", "SHZ");
        let mut waveform = WaveformContent {
            channel_segment_id: "raw".into(),
            ..WaveformContent::default()
        };
        waveform.channel_segments.insert(
            "raw".into(),
            ChannelSegment {
                description: None,
                description_label_color: None,
                data_segments: vec![DataSegment {
                    start_time_secs: 0.0,
                    sample_rate: 1.0,
                    color: None,
                    display_type: None,
                    point_size: None,
                    data,
                }],
            },
        );
        channel.waveform = Some(waveform);
        channel
    }

    fn display() -> TimeRange {
        TimeRange::new(0.0, 100.0)
    }

    #[test]
    fn empty_channel_uses_default_camera() {
        let renderer = ChannelRenderer::new("main", "STA01/SHZ");
        assert_eq!(renderer.state(), SceneState::Empty);
        assert_eq!(renderer.camera(), CameraBounds::DEFAULT);
    }

    #[test]
    fn request_computes_average_centered_camera_for_straddling_data() {
        let pool = PositionBufferPool::with_workers(1);
        let mut renderer = ChannelRenderer::new("main", "STA01/SHZ");
        let channel = channel_with(vec![-3.0, -1.0, 0.0, 1.0, 2.0, 3.0]);

        renderer.request_buffers(&channel, display(), &pool);
        assert_eq!(renderer.state(), SceneState::Pending);

        let avg = (-3.0 - 1.0 + 0.0 + 1.0 + 2.0 + 3.0) / 6.0;
        let camera = renderer.camera();
        assert!((camera.top - (avg + 3.0)).abs() < 1e-6);
        assert!((camera.bottom - (avg - 3.0)).abs() < 1e-6);
    }

    #[test]
    fn amplitude_adjustment_accumulates_and_reset_is_idempotent() {
        let pool = PositionBufferPool::with_workers(1);
        let mut renderer = ChannelRenderer::new("main", "STA01/SHZ");
        renderer.request_buffers(&channel_with(vec![-2.0, 2.0]), display(), &pool);

        let auto = renderer.camera();
        renderer.scale_amplitude(1.0);
        renderer.scale_amplitude(1.0);
        let adjusted = renderer.camera();
        assert!(adjusted.range() < auto.range());

        renderer.reset_amplitude();
        let once = renderer.camera();
        renderer.reset_amplitude();
        let twice = renderer.camera();
        assert_eq!(once, twice);
        assert_eq!(once, auto);
    }

    #[test]
    fn downward_drag_expands_the_range() {
        let pool = PositionBufferPool::with_workers(1);
        let mut renderer = ChannelRenderer::new("main", "STA01/SHZ");
        renderer.request_buffers(&channel_with(vec![-2.0, 2.0]), display(), &pool);

        let before = renderer.camera().range();
        renderer.scale_amplitude(-1.0);
        assert!(renderer.camera().range() > before);
    }

    #[test]
    fn stale_responses_are_discarded() {
        let pool = PositionBufferPool::with_workers(1);
        let mut renderer = ChannelRenderer::new("main", "STA01/SHZ");
        let channel = channel_with(vec![1.0, 2.0, 3.0]);

        renderer.request_buffers(&channel, display(), &pool);
        let stale_generation = renderer.generation();

        // a display-range change bumps the generation before the first
        // round's response arrives
        renderer.request_buffers(&channel, TimeRange::new(0.0, 50.0), &pool);

        let stale = BufferResponse {
            channel_id: renderer.scoped_id().to_string(),
            segment_key: "raw#0".into(),
            generation: stale_generation,
            positions: vec![0.0, 1.0, 0.0],
        };
        assert!(!renderer.apply_response(stale));
        assert_eq!(renderer.state(), SceneState::Pending);

        let current = BufferResponse {
            channel_id: renderer.scoped_id().to_string(),
            segment_key: "raw#0".into(),
            generation: renderer.generation(),
            positions: vec![0.0, 1.0, 0.0],
        };
        assert!(renderer.apply_response(current));
        assert_eq!(renderer.state(), SceneState::Ready);
    }

    #[test]
    fn project_y_maps_camera_range_onto_row() {
        let camera = CameraBounds { top: 2.0, bottom: -2.0 };
        assert_eq!(project_y(camera, 0.0, 100.0, 2.0), 0.0);
        assert_eq!(project_y(camera, 0.0, 100.0, -2.0), 100.0);
        assert_eq!(project_y(camera, 0.0, 100.0, 0.0), 50.0);
    }
}
