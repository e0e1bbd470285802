//! Line segments.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A straight segment between two points.
///
/// Bullets sweep one segment per turn from their previous position to their
/// current one; collision tests run against that segment rather than a point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LineSegment {
    /// Start point
    pub start: DVec2,
    /// End point
    pub end: DVec2,
}

impl LineSegment {
    /// Creates a segment from `start` to `end`.
    #[must_use]
    pub const fn new(start: DVec2, end: DVec2) -> Self {
        Self { start, end }
    }

    /// Segment length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    /// Returns `true` if the two segments touch or cross, including collinear
    /// overlap.
    ///
    /// # Example
    ///
    /// ```
    /// use glam::DVec2;
    /// use skirmish_geom::LineSegment;
    ///
    /// let a = LineSegment::new(DVec2::new(0.0, 0.0), DVec2::new(10.0, 10.0));
    /// let b = LineSegment::new(DVec2::new(0.0, 10.0), DVec2::new(10.0, 0.0));
    /// assert!(a.intersects(&b));
    /// ```
    #[must_use]
    pub fn intersects(&self, other: &LineSegment) -> bool {
        relative_ccw(self.start, self.end, other.start) * relative_ccw(self.start, self.end, other.end)
            <= 0
            && relative_ccw(other.start, other.end, self.start)
                * relative_ccw(other.start, other.end, self.end)
                <= 0
    }

    /// Returns `true` if one segment ends exactly where the other begins.
    ///
    /// Two bullets fired from the same spot on consecutive turns chain this
    /// way without ever crossing.
    #[must_use]
    pub fn chains_with(&self, other: &LineSegment) -> bool {
        self.start == other.end || self.end == other.start
    }
}

/// Orientation of `point` relative to the directed segment `a -> b`.
///
/// Returns `1`, `-1`, or `0` when the point is collinear and within the
/// segment's extent.
fn relative_ccw(a: DVec2, b: DVec2, point: DVec2) -> i32 {
    let seg = b - a;
    let mut p = point - a;
    let mut ccw = p.x * seg.y - p.y * seg.x;
    if ccw == 0.0 {
        // Collinear: project onto the segment to see which side of it we fall.
        ccw = p.x * seg.x + p.y * seg.y;
        if ccw > 0.0 {
            p -= seg;
            ccw = p.x * seg.x + p.y * seg.y;
            if ccw < 0.0 {
                ccw = 0.0;
            }
        }
    }
    if ccw < 0.0 {
        -1
    } else if ccw > 0.0 {
        1
    } else {
        0
    }
}
