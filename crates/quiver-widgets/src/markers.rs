//! Marker and selection-window interaction.
//!
//! Drags are modeled as explicit session value objects: pointer-down opens
//! a session holding the resolved constraints, every pointer move updates
//! only the session, and release commits the final time through the
//! caller's update callback exactly once. Nothing else mutates marker state
//! mid-drag.
//!
//! Positions are percentages of the display's total time span, matching
//! the coordinate the markers render at.

use quiver_core::model::{Marker, SelectionWindow};
use quiver_core::types::TimeRange;
use quiver_core::view::left_percent;

/// Markers may never be dragged past this percent, keeping them on the
/// waveform even when unconstrained.
pub const MARKER_EDGE_GUARD_PERCENT: f64 = 99.0;

/// A whole-window drag shorter than this much time is a click.
pub const WINDOW_CLICK_THRESHOLD_SECS: f64 = 0.05;

/// A pick-marker drag shorter than this many pixels is a click.
pub const PICK_DRAG_THRESHOLD_PX: f32 = 1.0;

/// The non-zero padding between a marker and its paired marker, as a
/// percent of the total span. Scales with the zoom level so paired markers
/// never visually collide at any magnification.
pub fn pairing_padding_percent(visible: TimeRange, total: TimeRange) -> f64 {
    (visible.duration_secs() / total.duration_secs()) * 0.001 * 100.0
}

/// The resolved minimum time for a marker: the more restrictive of its
/// explicit constraint and an associated start marker's current position,
/// falling back to the display start.
pub fn resolved_min_secs(
    marker: &Marker,
    associated_start: Option<&Marker>,
    total: TimeRange,
) -> f64 {
    let constraint = match (marker.min_time_secs_constraint, associated_start) {
        (Some(min), Some(start)) => Some(min.max(start.time_secs)),
        (Some(min), None) => Some(min),
        (None, Some(start)) => Some(start.time_secs),
        (None, None) => None,
    };
    constraint
        .unwrap_or(total.start_time_secs)
        .max(total.start_time_secs)
}

/// The resolved maximum time for a marker; mirror of [`resolved_min_secs`].
pub fn resolved_max_secs(
    marker: &Marker,
    associated_end: Option<&Marker>,
    total: TimeRange,
) -> f64 {
    let constraint = match (marker.max_time_secs_constraint, associated_end) {
        (Some(max), Some(end)) => Some(max.min(end.time_secs)),
        (Some(max), None) => Some(max),
        (None, Some(end)) => Some(end.time_secs),
        (None, None) => None,
    };
    constraint
        .unwrap_or(total.end_time_secs)
        .min(total.end_time_secs)
}

/// Resolved minimum position as a percent of the total span, padded.
pub fn min_constraint_percent(
    marker: &Marker,
    associated_start: Option<&Marker>,
    total: TimeRange,
    visible: TimeRange,
) -> f64 {
    let min_secs = resolved_min_secs(marker, associated_start, total);
    left_percent(min_secs, total.start_time_secs, total.end_time_secs)
        + pairing_padding_percent(visible, total)
}

/// Resolved maximum position as a percent of the total span, padded.
pub fn max_constraint_percent(
    marker: &Marker,
    associated_end: Option<&Marker>,
    total: TimeRange,
    visible: TimeRange,
) -> f64 {
    let max_secs = resolved_max_secs(marker, associated_end, total);
    left_percent(max_secs, total.start_time_secs, total.end_time_secs)
        - pairing_padding_percent(visible, total)
}

/// An in-flight drag of one moveable marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDrag {
    pub marker_id: String,
    pub min_percent: f64,
    pub max_percent: f64,
    /// Current position, percent of the total span
    pub position_percent: f64,
}

impl MarkerDrag {
    /// Open a session for a marker, resolving its constraints against the
    /// optional paired markers of a selection window.
    pub fn begin(
        marker: &Marker,
        associated_start: Option<&Marker>,
        associated_end: Option<&Marker>,
        total: TimeRange,
        visible: TimeRange,
    ) -> Self {
        Self {
            marker_id: marker.id.clone(),
            min_percent: min_constraint_percent(marker, associated_start, total, visible),
            max_percent: max_constraint_percent(marker, associated_end, total, visible),
            position_percent: left_percent(
                marker.time_secs,
                total.start_time_secs,
                total.end_time_secs,
            ),
        }
    }

    /// Move the session to a raw percent, clamped into the resolved
    /// constraints and the edge guard. Returns the clamped position.
    pub fn drag_to(&mut self, raw_percent: f64) -> f64 {
        let clamped = raw_percent
            .clamp(self.min_percent, self.max_percent)
            .clamp(0.0, MARKER_EDGE_GUARD_PERCENT);
        self.position_percent = clamped;
        clamped
    }

    /// The session's current time in seconds.
    pub fn time_secs(&self, total: TimeRange) -> f64 {
        total.start_time_secs + (self.position_percent / 100.0) * total.duration_secs()
    }
}

/// An in-flight drag of a whole selection window (both markers together).
#[derive(Debug, Clone, PartialEq)]
pub struct WindowDrag {
    pub window_id: String,
    /// Current position of the start marker, percent of total span
    pub lead_percent: f64,
    /// Current position of the end marker, percent of total span
    pub lag_percent: f64,
    /// Resolved lower bound for the start marker
    pub lead_min_percent: f64,
    /// Resolved upper bound for the end marker
    pub lag_max_percent: f64,
    /// True once the pointer has moved far enough to count as a drag
    pub dragging: bool,
}

impl WindowDrag {
    pub fn begin(window: &SelectionWindow, total: TimeRange, visible: TimeRange) -> Self {
        Self {
            window_id: window.id.clone(),
            lead_percent: left_percent(
                window.start_marker.time_secs,
                total.start_time_secs,
                total.end_time_secs,
            ),
            lag_percent: left_percent(
                window.end_marker.time_secs,
                total.start_time_secs,
                total.end_time_secs,
            ),
            lead_min_percent: min_constraint_percent(&window.start_marker, None, total, visible),
            lag_max_percent: max_constraint_percent(&window.end_marker, None, total, visible),

            dragging: false,
        }
    }

    /// Shift both markers by a percent delta. The move is rejected entirely
    /// (state unchanged, returns `false`) when either bound would pass its
    /// constraint, so the window snaps back rather than deforming.
    pub fn shift_by(&mut self, delta_percent: f64) -> bool {
        let lead = self.lead_percent + delta_percent;
        let lag = self.lag_percent + delta_percent;
        if lead < self.lead_min_percent || lag > self.lag_max_percent {
            return false;
        }
        self.lead_percent = lead;
        self.lag_percent = lag;
        true
    }

    /// Current (start, end) times in seconds.
    pub fn times(&self, total: TimeRange) -> (f64, f64) {
        let span = total.duration_secs();
        (
            total.start_time_secs + (self.lead_percent / 100.0) * span,
            total.start_time_secs + (self.lag_percent / 100.0) * span,
        )
    }
}

/// Drop markers whose time lies strictly outside the range. Callers run
/// this before computing percentages, since `left_percent` extrapolates.
pub fn filter_visible<'a, I>(markers: I, range: TimeRange) -> impl Iterator<Item = &'a Marker>
where
    I: IntoIterator<Item = &'a Marker>,
{
    markers
        .into_iter()
        .filter(move |m| m.time_secs >= range.start_time_secs && m.time_secs <= range.end_time_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::types::{LineStyle, Rgba};

    const TOTAL: TimeRange = TimeRange {
        start_time_secs: 1000.0,
        end_time_secs: 2000.0,
    };

    fn marker(id: &str, time: f64) -> Marker {
        Marker::new(id, Rgba::rgb(1.0, 1.0, 1.0), LineStyle::Solid, time)
    }

    fn window(start: f64, end: f64) -> SelectionWindow {
        SelectionWindow {
            id: "win".into(),
            start_marker: marker("start", start),
            end_marker: marker("end", end),
            is_moveable: true,
            color: Rgba::rgb(0.2, 0.8, 0.2),
        }
    }

    #[test]
    fn drag_clamps_to_explicit_constraints() {
        let mut m = marker("m", 1500.0);
        m.min_time_secs_constraint = Some(1200.0);
        m.max_time_secs_constraint = Some(1800.0);
        let mut drag = MarkerDrag::begin(&m, None, None, TOTAL, TOTAL);

        for raw in [-50.0, 0.0, 10.0, 19.9, 50.0, 80.1, 120.0] {
            let clamped = drag.drag_to(raw);
            assert!(clamped >= drag.min_percent, "raw {raw} gave {clamped}");
            assert!(clamped <= drag.max_percent, "raw {raw} gave {clamped}");
            assert!((0.0..=MARKER_EDGE_GUARD_PERCENT).contains(&clamped));
        }
    }

    #[test]
    fn paired_marker_is_more_restrictive_than_explicit_constraint() {
        let win = window(1400.0, 1600.0);
        let mut start = win.start_marker.clone();
        start.max_time_secs_constraint = Some(1900.0);

        // the end marker at 1600 dominates the explicit 1900 constraint
        let max = max_constraint_percent(&start, Some(&win.end_marker), TOTAL, TOTAL);
        let end_percent =
            left_percent(win.end_marker.time_secs, TOTAL.start_time_secs, TOTAL.end_time_secs);
        assert!(max < end_percent);

        // and symmetrically for the end marker's minimum
        let min = min_constraint_percent(&win.end_marker, Some(&win.start_marker), TOTAL, TOTAL);
        let start_percent =
            left_percent(win.start_marker.time_secs, TOTAL.start_time_secs, TOTAL.end_time_secs);
        assert!(min > start_percent);
    }

    #[test]
    fn paired_markers_never_cross_under_any_drag_sequence() {
        let win = window(1400.0, 1600.0);
        let mut drag = MarkerDrag::begin(
            &win.start_marker,
            None,
            Some(&win.end_marker),
            TOTAL,
            TOTAL,
        );
        let end_percent =
            left_percent(win.end_marker.time_secs, TOTAL.start_time_secs, TOTAL.end_time_secs);
        for raw in [30.0, 59.0, 60.0, 61.0, 95.0, 40.0, 100.0] {
            let pos = drag.drag_to(raw);
            assert!(pos < end_percent, "start marker crossed its pair at {pos}");
        }
    }

    #[test]
    fn padding_scales_with_zoom() {
        let zoomed_in = TimeRange::new(1400.0, 1500.0);
        let padded_full = pairing_padding_percent(TOTAL, TOTAL);
        let padded_zoomed = pairing_padding_percent(zoomed_in, TOTAL);
        assert!(padded_zoomed < padded_full);
        assert!(padded_zoomed > 0.0);
    }

    #[test]
    fn window_shift_moves_both_or_neither() {
        let win = window(1400.0, 1600.0);
        let mut drag = WindowDrag::begin(&win, TOTAL, TOTAL);
        let (lead0, lag0) = (drag.lead_percent, drag.lag_percent);

        assert!(drag.shift_by(5.0));
        assert!((drag.lead_percent - (lead0 + 5.0)).abs() < 1e-9);
        assert!((drag.lag_percent - (lag0 + 5.0)).abs() < 1e-9);

        // shifting past the end bound is rejected wholesale
        let before = drag.clone();
        assert!(!drag.shift_by(60.0));
        assert_eq!(drag, before);
    }

    #[test]
    fn window_times_follow_percents() {
        let win = window(1400.0, 1600.0);
        let mut drag = WindowDrag::begin(&win, TOTAL, TOTAL);
        drag.shift_by(10.0);
        let (start, end) = drag.times(TOTAL);
        assert!((start - 1500.0).abs() < 1e-9);
        assert!((end - 1700.0).abs() < 1e-9);
    }

    #[test]
    fn filter_visible_drops_out_of_range_markers() {
        let markers = vec![marker("a", 900.0), marker("b", 1500.0), marker("c", 2100.0)];
        let kept: Vec<&str> = filter_visible(&markers, TOTAL).map(|m| m.id.as_str()).collect();
        assert_eq!(kept, vec!["b"]);
    }
}
