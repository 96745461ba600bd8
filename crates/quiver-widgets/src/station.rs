//! Station row composition.
//!
//! A station renders as its default channel, optionally expanded to show
//! the non-default channels beneath it. Each visible channel gets its own
//! [`ChannelRenderer`]; the row owns them so the panel can iterate a flat
//! registry instead of reaching into rendering internals.

use quiver_core::model::{Channel, Station};
use quiver_core::pool::PositionBufferPool;
use quiver_core::types::{DistanceUnits, TimeRange};

use crate::channel::ChannelRenderer;

/// One station's channels and their renderers.
#[derive(Debug)]
pub struct StationRow {
    pub station: Station,
    /// Whether the non-default channels are shown
    pub expanded: bool,
    pub default_renderer: ChannelRenderer,
    pub non_default_renderers: Vec<ChannelRenderer>,
    /// Highlight for the slice shown in the measure window, on the channel
    /// it was selected from: (channel id, start secs, end secs)
    pub measure_selection: Option<(String, f64, f64)>,
}

impl StationRow {
    pub fn new(scope: &str, station: Station) -> Self {
        let default_renderer = ChannelRenderer::new(scope, station.default_channel.id.clone());
        let non_default_renderers = station
            .non_default_channels
            .iter()
            .map(|channel| ChannelRenderer::new(scope, channel.id.clone()))
            .collect();
        Self {
            station,
            expanded: false,
            default_renderer,
            non_default_renderers,
            measure_selection: None,
        }
    }

    /// True if the station has channels to expand.
    pub fn is_expandable(&self) -> bool {
        !self.station.non_default_channels.is_empty()
    }

    /// Flip expansion. Returns the new state.
    pub fn toggle_expansion(&mut self) -> bool {
        self.expanded = !self.expanded;
        self.expanded
    }

    /// Number of channel rows currently visible.
    pub fn visible_channel_count(&self) -> usize {
        if self.expanded {
            1 + self.station.non_default_channels.len()
        } else {
            1
        }
    }

    /// The visible channels paired with their renderers, default first.
    pub fn visible_channels(&self) -> impl Iterator<Item = (&Channel, &ChannelRenderer, bool)> {
        let default = std::iter::once((
            &self.station.default_channel,
            &self.default_renderer,
            true,
        ));
        let rest = self
            .station
            .non_default_channels
            .iter()
            .zip(self.non_default_renderers.iter())
            .map(|(channel, renderer)| (channel, renderer, false));
        default.chain(rest.take(if self.expanded { usize::MAX } else { 0 }))
    }

    /// Mutable access to a renderer by its pool-facing scoped id.
    pub fn renderer_by_scoped_id(&mut self, scoped_id: &str) -> Option<&mut ChannelRenderer> {
        if self.default_renderer.scoped_id() == scoped_id {
            return Some(&mut self.default_renderer);
        }
        self.non_default_renderers
            .iter_mut()
            .find(|renderer| renderer.scoped_id() == scoped_id)
    }

    /// The model channel for a channel id, with its default flag.
    pub fn channel_by_id(&self, channel_id: &str) -> Option<(&Channel, bool)> {
        if self.station.default_channel.id == channel_id {
            return Some((&self.station.default_channel, true));
        }
        self.station
            .non_default_channels
            .iter()
            .find(|channel| channel.id == channel_id)
            .map(|channel| (channel, false))
    }

    /// Re-request buffers for every visible channel.
    pub fn request_buffers(&mut self, display: TimeRange, pool: &PositionBufferPool) {
        self.default_renderer
            .request_buffers(&self.station.default_channel, display, pool);
        if self.expanded {
            for (channel, renderer) in self
                .station
                .non_default_channels
                .iter()
                .zip(self.non_default_renderers.iter_mut())
            {
                renderer.request_buffers(channel, display, pool);
            }
        }
    }

    /// Reset amplitude scaling on every channel of the station.
    pub fn reset_amplitude(&mut self) {
        self.default_renderer.reset_amplitude();
        for renderer in &mut self.non_default_renderers {
            renderer.reset_amplitude();
        }
    }

    /// Label text: station name plus the distance, when known.
    pub fn label(&self) -> String {
        match self.station.distance {
            Some(distance) => format!(
                "{} {}",
                self.station.name,
                format_distance(distance, self.station.distance_units)
            ),
            None => self.station.name.clone(),
        }
    }
}

/// Format a distance for the station label.
pub fn format_distance(distance: f64, units: DistanceUnits) -> String {
    match units {
        DistanceUnits::Km => format!("{distance:.1} km"),
        DistanceUnits::Degrees => format!("{distance:.1}\u{00B0}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::model::Channel;

    fn station() -> Station {
        let mut station = Station::new("sta", "STA01", Channel::new("sta/SHZ", "SHZ"));
        station.non_default_channels = vec![
            Channel::new("sta/SHN", "SHN"),
            Channel::new("sta/SHE", "SHE"),
        ];
        station.distance = Some(42.35);
        station
    }

    #[test]
    fn collapsed_row_shows_only_the_default_channel() {
        let row = StationRow::new("main", station());
        assert_eq!(row.visible_channel_count(), 1);
        assert_eq!(row.visible_channels().count(), 1);
        assert!(row.is_expandable());
    }

    #[test]
    fn expansion_reveals_non_default_channels() {
        let mut row = StationRow::new("main", station());
        assert!(row.toggle_expansion());
        assert_eq!(row.visible_channel_count(), 3);
        let ids: Vec<&str> = row
            .visible_channels()
            .map(|(channel, _, _)| channel.id.as_str())
            .collect();
        assert_eq!(ids, vec!["sta/SHZ", "sta/SHN", "sta/SHE"]);
        assert!(!row.toggle_expansion());
        assert_eq!(row.visible_channel_count(), 1);
    }

    #[test]
    fn channel_lookup_distinguishes_default() {
        let row = StationRow::new("main", station());
        assert!(row.channel_by_id("sta/SHZ").unwrap().1);
        assert!(!row.channel_by_id("sta/SHN").unwrap().1);
        assert!(row.channel_by_id("nope").is_none());
    }

    #[test]
    fn distance_formatting() {
        assert_eq!(format_distance(42.35, DistanceUnits::Km), "42.3 km");
        assert_eq!(format_distance(7.06, DistanceUnits::Degrees), "7.1\u{00B0}");
    }

    #[test]
    fn label_includes_distance() {
        let row = StationRow::new("main", station());
        assert_eq!(row.label(), "STA01 42.3 km");
    }
}
