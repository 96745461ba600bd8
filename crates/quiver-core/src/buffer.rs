//! Position-buffer construction and amplitude boundaries.
//!
//! A position buffer is the renderable form of a data segment: an
//! interleaved (x, y, z) vertex list where x is the sample's time mapped
//! linearly into GL units over the display range, y is the raw amplitude,
//! and z is 0. Construction is pure so it can run on the worker pool
//! (`crate::pool`) or synchronously in tests.

use crate::model::ChannelSegment;

/// Inputs for one position-buffer conversion.
#[derive(Debug, Clone)]
pub struct PositionBufferParams {
    /// The raw samples
    pub samples: Vec<f32>,
    /// Epoch start time of the first sample, in seconds
    pub start_time_secs: f64,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Epoch start of the display range
    pub display_start_time_secs: f64,
    /// Epoch end of the display range
    pub display_end_time_secs: f64,
    /// GL x coordinate of the display start
    pub gl_min: f32,
    /// GL x coordinate of the display end
    pub gl_max: f32,
}

/// Convert samples into an interleaved (x, y, z) vertex buffer.
///
/// Samples whose time falls outside the display range still produce
/// vertices; the x mapping extrapolates, and clipping is the renderer's
/// concern.
pub fn build_position_buffer(params: &PositionBufferParams) -> Vec<f32> {
    let display_span = params.display_end_time_secs - params.display_start_time_secs;
    if params.samples.is_empty() || display_span <= 0.0 || params.sample_rate <= 0.0 {
        return Vec::new();
    }

    let gl_span = params.gl_max - params.gl_min;
    let mut positions = Vec::with_capacity(params.samples.len() * 3);
    for (i, &sample) in params.samples.iter().enumerate() {
        let time = params.start_time_secs + i as f64 / params.sample_rate;
        let fraction = (time - params.display_start_time_secs) / display_span;
        positions.push(params.gl_min + fraction as f32 * gl_span);
        positions.push(sample);
        positions.push(0.0);
    }
    positions
}

/// Amplitude boundaries of one channel segment, computed over all of its
/// data segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelBounds {
    /// Largest sample across all segments
    pub top_max: f32,
    /// Smallest sample across all segments
    pub bottom_max: f32,
    /// Sum of the per-segment averages
    pub channel_avg: f32,
    /// max(|top_max|, |bottom_max|)
    pub offset: f32,
    /// Number of non-empty data segments
    pub segment_count: usize,
}

impl ChannelBounds {
    /// Compute boundaries from a channel segment. Returns `None` when no
    /// segment carries any samples, in which case the renderer falls back
    /// to the symmetric default camera.
    pub fn from_segment(segment: &ChannelSegment) -> Option<Self> {
        let mut top_max = f32::NEG_INFINITY;
        let mut bottom_max = f32::INFINITY;
        let mut channel_avg = 0.0f32;
        let mut segment_count = 0usize;

        for data_segment in &segment.data_segments {
            if data_segment.data.is_empty() {
                continue;
            }
            let mut segment_top = f32::NEG_INFINITY;
            let mut segment_bottom = f32::INFINITY;
            let mut segment_sum = 0.0f32;
            for &sample in &data_segment.data {
                segment_sum += sample;
                if sample > segment_top {
                    segment_top = sample;
                }
                if sample < segment_bottom {
                    segment_bottom = sample;
                }
            }
            top_max = top_max.max(segment_top);
            bottom_max = bottom_max.min(segment_bottom);
            channel_avg += segment_sum / data_segment.data.len() as f32;
            segment_count += 1;
        }

        if segment_count == 0 {
            return None;
        }
        Some(Self {
            top_max,
            bottom_max,
            channel_avg,
            offset: top_max.abs().max(bottom_max.abs()),
            segment_count,
        })
    }

    /// The auto-scaled camera bounds for these boundaries.
    ///
    /// When the data straddles zero the camera is centered on the average
    /// of the per-segment averages, extended by the larger absolute extreme,
    /// so neither polarity clips. Otherwise the camera hugs [min, max].
    pub fn camera_bounds(&self) -> CameraBounds {
        let amplitude_min = self.bottom_max.min(self.top_max);
        let amplitude_max = self.bottom_max.max(self.top_max);
        let y_avg = self.channel_avg / self.segment_count as f32;
        let axis_offset = if self.offset != 0.0 { self.offset } else { 1.0 };

        if amplitude_min < 0.0 && amplitude_max > 0.0 {
            CameraBounds {
                top: y_avg + axis_offset,
                bottom: y_avg - axis_offset,
            }
        } else {
            CameraBounds {
                top: amplitude_max,
                bottom: amplitude_min,
            }
        }
    }
}

/// Vertical camera bounds for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBounds {
    pub top: f32,
    pub bottom: f32,
}

impl CameraBounds {
    /// The symmetric default used when a channel has no samples, avoiding a
    /// degenerate viewport.
    pub const DEFAULT: CameraBounds = CameraBounds {
        top: 1.0,
        bottom: -1.0,
    };

    pub fn range(&self) -> f32 {
        (self.top - self.bottom).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataSegment;

    fn segment_with(data: Vec<f32>, start: f64, rate: f64) -> DataSegment {
        DataSegment {
            start_time_secs: start,
            sample_rate: rate,
            color: None,
            display_type: None,
            point_size: None,
            data,
        }
    }

    #[test]
    fn position_buffer_maps_time_to_gl() {
        let params = PositionBufferParams {
            samples: vec![0.5, -0.5, 1.0],
            start_time_secs: 100.0,
            sample_rate: 1.0,
            display_start_time_secs: 100.0,
            display_end_time_secs: 104.0,
            gl_min: 0.0,
            gl_max: 100.0,
        };
        let positions = build_position_buffer(&params);
        assert_eq!(positions.len(), 9);
        // x of sample 0 at display start, sample 2 halfway through
        assert_eq!(positions[0], 0.0);
        assert_eq!(positions[1], 0.5);
        assert_eq!(positions[2], 0.0);
        assert_eq!(positions[3], 25.0);
        assert_eq!(positions[6], 50.0);
        assert_eq!(positions[7], 1.0);
    }

    #[test]
    fn position_buffer_rejects_degenerate_inputs() {
        let params = PositionBufferParams {
            samples: vec![1.0],
            start_time_secs: 0.0,
            sample_rate: 1.0,
            display_start_time_secs: 10.0,
            display_end_time_secs: 10.0,
            gl_min: 0.0,
            gl_max: 100.0,
        };
        assert!(build_position_buffer(&params).is_empty());
    }

    #[test]
    fn bounds_for_straddling_data_center_on_average() {
        // samples within [-3, 3] with non-trivial extremes on both sides
        let segment = ChannelSegment {
            description: None,
            description_label_color: None,
            data_segments: vec![segment_with(vec![-3.0, -1.0, 0.0, 1.0, 2.0, 3.0], 0.0, 1.0)],
        };
        let bounds = ChannelBounds::from_segment(&segment).unwrap();
        assert_eq!(bounds.top_max, 3.0);
        assert_eq!(bounds.bottom_max, -3.0);
        assert_eq!(bounds.offset, 3.0);

        let camera = bounds.camera_bounds();
        let avg = (-3.0 - 1.0 + 0.0 + 1.0 + 2.0 + 3.0) / 6.0;
        assert!((camera.top - (avg + 3.0)).abs() < 1e-6);
        assert!((camera.bottom - (avg - 3.0)).abs() < 1e-6);
        // not simply [min, max]
        assert_ne!(camera.top, 3.0);
    }

    #[test]
    fn bounds_for_one_sided_data_hug_min_max() {
        let segment = ChannelSegment {
            description: None,
            description_label_color: None,
            data_segments: vec![segment_with(vec![1.0, 2.0, 5.0], 0.0, 1.0)],
        };
        let camera = ChannelBounds::from_segment(&segment).unwrap().camera_bounds();
        assert_eq!(camera.top, 5.0);
        assert_eq!(camera.bottom, 1.0);
    }

    #[test]
    fn bounds_average_spans_multiple_segments() {
        let segment = ChannelSegment {
            description: None,
            description_label_color: None,
            data_segments: vec![
                segment_with(vec![-2.0, 2.0], 0.0, 1.0),
                segment_with(vec![-1.0, 1.0], 10.0, 1.0),
            ],
        };
        let bounds = ChannelBounds::from_segment(&segment).unwrap();
        assert_eq!(bounds.segment_count, 2);
        let camera = bounds.camera_bounds();
        // both segment averages are zero, so centered on zero with offset 2
        assert_eq!(camera.top, 2.0);
        assert_eq!(camera.bottom, -2.0);
    }

    #[test]
    fn empty_channel_yields_no_bounds() {
        let segment = ChannelSegment {
            description: None,
            description_label_color: None,
            data_segments: vec![segment_with(Vec::new(), 0.0, 1.0)],
        };
        assert!(ChannelBounds::from_segment(&segment).is_none());
        assert_eq!(CameraBounds::DEFAULT.top, 1.0);
        assert_eq!(CameraBounds::DEFAULT.bottom, -1.0);
    }
}
