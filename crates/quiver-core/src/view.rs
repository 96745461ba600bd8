//! Coordinate/time conversions.
//!
//! Quiver juggles four representations of horizontal position:
//!
//! - epoch seconds (the model's native unit)
//! - fraction of the display's total time span, in [0, 1]
//! - GL units, the x range position buffers are built against
//! - viewport fraction/percent, position within the currently visible slice
//!
//! [`ViewTransform`] is the single value type converting between all four.
//! It is constructed once per render pass from the panel's current state and
//! threaded explicitly, instead of each call site recomputing scales inline.

use crate::types::TimeRange;

/// Percent from the left edge of `[start, end]` for `time`.
///
/// Linear and extrapolating: times outside the range produce values outside
/// [0, 100]. Callers are responsible for pre-filtering markers strictly
/// outside the bounds before invoking.
pub fn left_percent(time_secs: f64, start_time_secs: f64, end_time_secs: f64) -> f64 {
    ((time_secs - start_time_secs) / (end_time_secs - start_time_secs)) * 100.0
}

/// Percent from the right edge; complements [`left_percent`] to 100.
pub fn right_percent(time_secs: f64, start_time_secs: f64, end_time_secs: f64) -> f64 {
    100.0 - left_percent(time_secs, start_time_secs, end_time_secs)
}

/// The currently visible slice of the display's total time span, as a pair
/// of fractions in [0, 1]. This is the single source of truth for what is on
/// screen; it is mutated only by pan/zoom/scroll operations on the panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRange {
    /// Left edge, 0 = display start
    pub left: f64,
    /// Right edge, 1 = display end
    pub right: f64,
}

impl Default for ViewRange {
    fn default() -> Self {
        Self { left: 0.0, right: 1.0 }
    }
}

impl ViewRange {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Width of the visible slice as a fraction of the total span.
    pub fn span(&self) -> f64 {
        self.right - self.left
    }
}

/// Conversions among epoch seconds, total-span fraction, GL units, and
/// viewport position, for one render pass.
#[derive(Debug, Clone, Copy)]
pub struct ViewTransform {
    /// The display's full time range
    pub time_range: TimeRange,
    /// The visible slice
    pub view: ViewRange,
    /// GL x coordinate of `time_range.start_time_secs`
    pub gl_min: f32,
    /// GL x coordinate of `time_range.end_time_secs`
    pub gl_max: f32,
}

impl ViewTransform {
    pub fn new(time_range: TimeRange, view: ViewRange, gl_min: f32, gl_max: f32) -> Self {
        Self {
            time_range,
            view,
            gl_min,
            gl_max,
        }
    }

    /// Fraction of the total span for a time. Extrapolates out of range.
    pub fn fraction_of(&self, time_secs: f64) -> f64 {
        (time_secs - self.time_range.start_time_secs) / self.time_range.duration_secs()
    }

    /// Time at a fraction of the total span.
    pub fn time_at_fraction(&self, fraction: f64) -> f64 {
        self.time_range.start_time_secs + fraction * self.time_range.duration_secs()
    }

    /// Percent from the left of the total span.
    pub fn percent_of(&self, time_secs: f64) -> f64 {
        left_percent(
            time_secs,
            self.time_range.start_time_secs,
            self.time_range.end_time_secs,
        )
    }

    /// GL x coordinate for a time.
    pub fn gl_of(&self, time_secs: f64) -> f32 {
        let fraction = self.fraction_of(time_secs);
        self.gl_min + (fraction as f32) * (self.gl_max - self.gl_min)
    }

    /// Time for a GL x coordinate.
    pub fn time_of_gl(&self, gl: f32) -> f64 {
        let fraction = ((gl - self.gl_min) / (self.gl_max - self.gl_min)) as f64;
        self.time_at_fraction(fraction)
    }

    /// The visible time range implied by the view range.
    pub fn visible_time_range(&self) -> TimeRange {
        TimeRange::new(
            self.time_at_fraction(self.view.left),
            self.time_at_fraction(self.view.right),
        )
    }

    /// Time for a viewport x position in [0, 1] (0 = left edge of what is on
    /// screen, 1 = right edge).
    pub fn time_for_view_x(&self, view_x: f64) -> f64 {
        let visible = self.visible_time_range();
        visible.start_time_secs + view_x * visible.duration_secs()
    }

    /// Viewport x position in [0, 1] for a time. Extrapolates out of view.
    pub fn view_x_of_time(&self, time_secs: f64) -> f64 {
        let visible = self.visible_time_range();
        (time_secs - visible.start_time_secs) / visible.duration_secs()
    }

    /// Map an absolute span fraction to a viewport fraction.
    pub fn view_x_of_fraction(&self, fraction: f64) -> f64 {
        (fraction - self.view.left) / self.view.span()
    }

    /// Map a viewport fraction to an absolute span fraction.
    pub fn fraction_of_view_x(&self, view_x: f64) -> f64 {
        self.view.left + view_x * self.view.span()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_and_right_percent_are_complementary() {
        let start = 1_527_868_426.0;
        let end = start + 3000.0;
        for time in [start, start + 1.0, start + 1500.0, end, start - 50.0, end + 75.0] {
            let sum = left_percent(time, start, end) + right_percent(time, start, end);
            assert!((sum - 100.0).abs() < 1e-9, "sum was {sum} for time {time}");
        }
    }

    #[test]
    fn left_percent_extrapolates_out_of_range() {
        assert_eq!(left_percent(90.0, 100.0, 200.0), -10.0);
        assert_eq!(left_percent(250.0, 100.0, 200.0), 150.0);
    }

    fn transform() -> ViewTransform {
        ViewTransform::new(
            TimeRange::new(1000.0, 2000.0),
            ViewRange::new(0.25, 0.75),
            0.0,
            100.0,
        )
    }

    #[test]
    fn gl_roundtrip() {
        let t = transform();
        assert_eq!(t.gl_of(1000.0), 0.0);
        assert_eq!(t.gl_of(2000.0), 100.0);
        assert_eq!(t.gl_of(1500.0), 50.0);
        assert!((t.time_of_gl(t.gl_of(1234.5)) - 1234.5).abs() < 1e-6);
    }

    #[test]
    fn visible_range_follows_view() {
        let t = transform();
        let visible = t.visible_time_range();
        assert_eq!(visible.start_time_secs, 1250.0);
        assert_eq!(visible.end_time_secs, 1750.0);
    }

    #[test]
    fn view_x_maps_into_visible_slice() {
        let t = transform();
        assert_eq!(t.time_for_view_x(0.0), 1250.0);
        assert_eq!(t.time_for_view_x(1.0), 1750.0);
        assert_eq!(t.time_for_view_x(0.5), 1500.0);
        assert!((t.view_x_of_time(1500.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn fraction_view_roundtrip() {
        let t = transform();
        let fraction = t.fraction_of_view_x(0.3);
        assert!((t.view_x_of_fraction(fraction) - 0.3).abs() < 1e-12);
    }
}
