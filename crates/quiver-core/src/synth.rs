//! Synthetic waveform generation.
//!
//! Used by the viewer as its sample data source and by tests that need
//! channels with known amplitude statistics.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::model::{Channel, ChannelSegment, DataSegment, Station, WaveformContent};
use crate::types::DistanceUnits;

/// Sample rate assumed when the caller does not provide one, in Hz.
pub const DEFAULT_SAMPLE_RATE: f64 = 1.0;

/// Invalid input to a generation helper. Fatal to the calling operation.
#[derive(Debug, Error, PartialEq)]
pub enum SynthError {
    #[error("end time {end_time_secs} must be after start time {start_time_secs}")]
    InvalidTimeRange {
        start_time_secs: f64,
        end_time_secs: f64,
    },
    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(f64),
}

/// Create a data segment whose samples are all `amplitude`.
///
/// With no explicit sample rate, one sample per second is generated. The
/// segment spans exactly `[start, end)`: `floor((end - start) * rate)`
/// samples, so `start + len / rate == end` for ranges that divide evenly.
pub fn create_flat_line_data_segment(
    start_time_secs: f64,
    end_time_secs: f64,
    amplitude: f32,
    sample_rate: Option<f64>,
) -> Result<DataSegment, SynthError> {
    if end_time_secs <= start_time_secs {
        return Err(SynthError::InvalidTimeRange {
            start_time_secs,
            end_time_secs,
        });
    }
    let sample_rate = sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    if sample_rate <= 0.0 {
        return Err(SynthError::InvalidSampleRate(sample_rate));
    }

    let sample_count = ((end_time_secs - start_time_secs) * sample_rate).floor() as usize;
    Ok(DataSegment {
        start_time_secs,
        sample_rate,
        color: None,
        display_type: None,
        point_size: None,
        data: vec![amplitude; sample_count],
    })
}

/// Create a channel segment holding one flat-line data segment.
pub fn create_flat_line_channel_segment(
    start_time_secs: f64,
    end_time_secs: f64,
    amplitude: f32,
    sample_rate: Option<f64>,
) -> Result<ChannelSegment, SynthError> {
    let data_segment =
        create_flat_line_data_segment(start_time_secs, end_time_secs, amplitude, sample_rate)?;
    Ok(ChannelSegment {
        description: None,
        description_label_color: None,
        data_segments: vec![data_segment],
    })
}

/// Parameters for [`create_dummy_waveform`].
#[derive(Debug, Clone, Copy)]
pub struct DummyWaveformParams {
    pub start_time_secs: f64,
    pub end_time_secs: f64,
    pub sample_rate: f64,
    /// Peak amplitude of the event burst
    pub event_amplitude: f32,
    /// Peak amplitude of the background noise
    pub noise_amplitude: f32,
    /// Seed for the noise generator; the same seed reproduces the same data
    pub seed: u64,
}

/// Create a station with a default channel and two non-default channels of
/// synthetic data: background noise with an event burst that rings down
/// exponentially from the middle of the range.
pub fn create_dummy_waveform(
    name: &str,
    params: DummyWaveformParams,
) -> Result<Station, SynthError> {
    if params.end_time_secs <= params.start_time_secs {
        return Err(SynthError::InvalidTimeRange {
            start_time_secs: params.start_time_secs,
            end_time_secs: params.end_time_secs,
        });
    }
    if params.sample_rate <= 0.0 {
        return Err(SynthError::InvalidSampleRate(params.sample_rate));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);

    let default_channel = dummy_channel(name, "SHZ", &params, 1.0, &mut rng);
    let non_default = vec![
        dummy_channel(name, "SHN", &params, 0.6, &mut rng),
        dummy_channel(name, "SHE", &params, 0.45, &mut rng),
    ];

    let mut station = Station::new(name, name, default_channel);
    station.non_default_channels = non_default;
    station.distance = Some(rng.gen_range(1.0..120.0));
    station.distance_units = DistanceUnits::Km;
    Ok(station)
}

fn dummy_channel(
    station: &str,
    component: &str,
    params: &DummyWaveformParams,
    gain: f32,
    rng: &mut StdRng,
) -> Channel {
    let duration = params.end_time_secs - params.start_time_secs;
    let sample_count = (duration * params.sample_rate).floor() as usize;
    let onset = sample_count / 2;

    let mut data = Vec::with_capacity(sample_count);
    for i in 0..sample_count {
        let noise = rng.gen_range(-params.noise_amplitude..=params.noise_amplitude);
        let event = if i >= onset {
            let t = (i - onset) as f32 / params.sample_rate as f32;
            let envelope = (-t / (duration as f32 * 0.08)).exp();
            let phase = t * 12.0;
            params.event_amplitude * envelope * phase.sin()
        } else {
            0.0
        };
        data.push(gain * (noise + event));
    }

    let segment = DataSegment {
        start_time_secs: params.start_time_secs,
        sample_rate: params.sample_rate,
        color: None,
        display_type: None,
        point_size: None,
        data,
    };

    let id = format!("{station}/{component}");
    let mut channel = Channel::new(id.clone(), component);
    let mut waveform = WaveformContent {
        channel_segment_id: id.clone(),
        ..WaveformContent::default()
    };
    waveform.channel_segments.insert(
        id,
        ChannelSegment {
            description: None,
            description_label_color: None,
            data_segments: vec![segment],
        },
    );
    channel.waveform = Some(waveform);
    channel
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: f64 = 1_527_868_426.0;
    const END: f64 = START + 3000.0;

    #[test]
    fn flat_line_rejects_inverted_range() {
        assert!(matches!(
            create_flat_line_data_segment(1.0, 0.0, 5.0, None),
            Err(SynthError::InvalidTimeRange { .. })
        ));
    }

    #[test]
    fn flat_line_rejects_bad_sample_rate() {
        assert!(matches!(
            create_flat_line_data_segment(0.0, 1.0, 5.0, Some(-1.0)),
            Err(SynthError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            create_flat_line_data_segment(0.0, 1.0, 5.0, Some(0.0)),
            Err(SynthError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn flat_line_defaults_to_one_hertz() {
        let segment = create_flat_line_data_segment(START, END, 5.0, None).unwrap();
        assert_eq!(segment.start_time_secs, START);
        assert_eq!(segment.data.len(), 3000);
        assert!(segment.data.iter().all(|&v| v == 5.0));
        // end time is exactly reconstructed from count and rate
        assert_eq!(
            segment.start_time_secs + segment.data.len() as f64 / segment.sample_rate,
            END
        );
        assert!(segment.color.is_none());
        assert!(segment.display_type.is_none());
        assert!(segment.point_size.is_none());
    }

    #[test]
    fn flat_line_with_explicit_sample_rate() {
        let segment = create_flat_line_data_segment(START, END, 3.0, Some(20.0)).unwrap();
        assert_eq!(segment.data.len(), 3000 * 20);
        assert!(segment.data.iter().all(|&v| v == 3.0));
        assert_eq!(
            segment.start_time_secs + segment.data.len() as f64 / segment.sample_rate,
            END
        );
    }

    #[test]
    fn flat_line_with_fractional_sample_rate() {
        let segment = create_flat_line_data_segment(START, END, 3.0, Some(0.01)).unwrap();
        assert_eq!(segment.data.len(), 30);
        assert_eq!(
            segment.start_time_secs + segment.data.len() as f64 / segment.sample_rate,
            END
        );
    }

    #[test]
    fn flat_line_channel_segment_wraps_one_data_segment() {
        let channel_segment =
            create_flat_line_channel_segment(START, END, 5.0, Some(40.0)).unwrap();
        assert_eq!(channel_segment.data_segments.len(), 1);
        assert!(channel_segment.description.is_none());

        assert!(create_flat_line_channel_segment(1.0, 0.0, 5.0, None).is_err());
    }

    #[test]
    fn dummy_waveform_is_deterministic_per_seed() {
        let params = DummyWaveformParams {
            start_time_secs: START,
            end_time_secs: START + 60.0,
            sample_rate: 20.0,
            event_amplitude: 10.0,
            noise_amplitude: 1.0,
            seed: 7,
        };
        let a = create_dummy_waveform("STA01", params).unwrap();
        let b = create_dummy_waveform("STA01", params).unwrap();

        let samples = |s: &Station| {
            s.default_channel
                .waveform
                .as_ref()
                .unwrap()
                .active_segment()
                .unwrap()
                .data_segments[0]
                .data
                .clone()
        };
        assert_eq!(samples(&a), samples(&b));
        assert_eq!(a.non_default_channels.len(), 2);
        assert_eq!(samples(&a).len(), 1200);
    }
}
