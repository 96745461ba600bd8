//! Synthetic demo data for the viewer.
//!
//! Builds a small network of stations with waveform data, masks, signal
//! detections, predicted phases, and panel-level markers, so every
//! interaction of the display can be exercised without a data feed.

use quiver_core::model::{
    Marker, Markers, Mask, PickMarker, SelectionWindow, Station, TheoreticalPhaseWindow,
};
use quiver_core::synth::{
    create_dummy_waveform, create_flat_line_channel_segment, DummyWaveformParams,
};
use quiver_core::types::{LineStyle, Rgba};

use crate::config::DemoConfig;

/// Epoch start of the demo recording.
pub const DEMO_START_SECS: f64 = 1_527_868_426.0;

const DETECTION_COLOR: Rgba = Rgba::rgb(0.94, 0.56, 0.18);
const PREDICTED_COLOR: Rgba = Rgba::rgb(0.55, 0.45, 0.85);
const MASK_COLOR: Rgba = Rgba::rgb(0.85, 0.25, 0.25);
const WINDOW_COLOR: Rgba = Rgba::rgb(0.25, 0.65, 0.35);

/// The demo data set: stations plus panel-level markers.
pub struct DemoData {
    pub stations: Vec<Station>,
    pub start_time_secs: f64,
    pub end_time_secs: f64,
    pub markers: Markers,
}

/// Build the demo network.
pub fn build_demo_data(config: &DemoConfig) -> DemoData {
    let start = DEMO_START_SECS;
    let end = start + config.duration_secs;

    let mut stations = Vec::new();
    for i in 0..config.station_count.max(1) {
        let name = format!("STA{:02}", i + 1);
        let params = DummyWaveformParams {
            start_time_secs: start,
            end_time_secs: end,
            sample_rate: config.sample_rate,
            event_amplitude: 6.0 + i as f32 * 2.5,
            noise_amplitude: 1.0 + i as f32 * 0.3,
            seed: 0x5EED + i as u64,
        };
        let mut station = match create_dummy_waveform(&name, params) {
            Ok(station) => station,
            Err(e) => {
                log::error!("demo waveform generation failed for {name}: {e}");
                continue;
            }
        };

        decorate_station(&mut station, i, start, end);
        stations.push(station);
    }

    DemoData {
        stations,
        start_time_secs: start,
        end_time_secs: end,
        markers: panel_markers(start, end),
    }
}

fn decorate_station(station: &mut Station, index: usize, start: f64, end: f64) {
    let onset = start + (end - start) / 2.0;

    if let Some(waveform) = station.default_channel.waveform.as_mut() {
        // picks around the synthetic event onset, staggered per station
        let delay = index as f64 * 4.5;
        waveform.signal_detections.push(PickMarker {
            id: format!("{}-det-p", station.id),
            time_secs: onset + delay,
            label: "P".into(),
            color: DETECTION_COLOR,
            is_selected: false,
            predicted: false,
        });
        waveform.predicted_phases.push(PickMarker {
            id: format!("{}-pred-p", station.id),
            time_secs: onset + delay + 2.0,
            label: "P".into(),
            color: PREDICTED_COLOR,
            is_selected: false,
            predicted: true,
        });

        if index % 2 == 0 {
            waveform.masks.push(Mask {
                id: format!("{}-mask-0", station.id),
                start_time_secs: start + 120.0 + index as f64 * 60.0,
                end_time_secs: start + 160.0 + index as f64 * 60.0,
                color: MASK_COLOR,
            });
            // a sub-second dropout, padded for clickability when rendered
            waveform.masks.push(Mask {
                id: format!("{}-mask-1", station.id),
                start_time_secs: start + 400.0,
                end_time_secs: start + 400.4,
                color: MASK_COLOR,
            });
        }

        if index == 0 {
            waveform.theoretical_phase_windows.push(TheoreticalPhaseWindow {
                id: format!("{}-phase-window", station.id),
                start_time_secs: onset - 30.0,
                end_time_secs: onset + 30.0,
                label: "P window".into(),
                color: Rgba::rgb(0.4, 0.6, 0.9),
            });
        }
    }

    // a flat calibration trace as an extra channel on the first station
    if index == 0 {
        if let Ok(segment) = create_flat_line_channel_segment(start, end, 2.5, Some(1.0)) {
            let mut channel = quiver_core::model::Channel::new(
                format!("{}/CAL", station.id),
                "CAL",
            );
            let mut content = quiver_core::model::WaveformContent {
                channel_segment_id: format!("{}/CAL", station.id),
                ..Default::default()
            };
            content
                .channel_segments
                .insert(format!("{}/CAL", station.id), segment);
            channel.waveform = Some(content);
            station.non_default_channels.push(channel);
        }
    }

    // stagger one station to exercise the offset-extended display range
    if index == 1 {
        for channel in &mut station.non_default_channels {
            channel.time_offset_seconds = 15.0;
        }
    }
}

fn panel_markers(start: f64, end: f64) -> Markers {
    let span = end - start;
    let mut markers = Markers::default();

    markers.vertical_markers.push(Marker::new(
        "open",
        Rgba::rgb(0.45, 0.85, 0.45),
        LineStyle::Solid,
        start,
    ));
    markers.vertical_markers.push(Marker::new(
        "close",
        Rgba::rgb(0.85, 0.45, 0.45),
        LineStyle::Solid,
        end,
    ));

    let mut review_start = Marker::new(
        "review-start",
        Rgba::rgb(0.95, 0.77, 0.06),
        LineStyle::Dashed,
        start + span * 0.35,
    );
    review_start.min_time_secs_constraint = Some(start + span * 0.1);
    let mut review_end = Marker::new(
        "review-end",
        Rgba::rgb(0.95, 0.77, 0.06),
        LineStyle::Dashed,
        start + span * 0.55,
    );
    review_end.max_time_secs_constraint = Some(start + span * 0.9);

    markers.selection_windows.push(SelectionWindow {
        id: "review-window".into(),
        start_marker: review_start,
        end_marker: review_end,
        is_moveable: true,
        color: WINDOW_COLOR,
    });

    markers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_data_builds_requested_station_count() {
        let data = build_demo_data(&DemoConfig {
            station_count: 3,
            duration_secs: 600.0,
            sample_rate: 10.0,
        });
        assert_eq!(data.stations.len(), 3);
        assert_eq!(data.end_time_secs - data.start_time_secs, 600.0);
        assert_eq!(data.markers.selection_windows.len(), 1);
    }

    #[test]
    fn first_station_carries_calibration_channel() {
        let data = build_demo_data(&DemoConfig::default());
        let cal = data.stations[0]
            .non_default_channels
            .iter()
            .find(|c| c.name == "CAL");
        assert!(cal.is_some());
    }
}
