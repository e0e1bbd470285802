//! Axis-aligned bounding rectangles.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::line::LineSegment;

/// Axis-aligned rectangle anchored at its minimum (bottom-left) corner.
///
/// # Example
///
/// ```
/// use glam::DVec2;
/// use skirmish_geom::BoundingRect;
///
/// let a = BoundingRect::new(0.0, 0.0, 10.0, 10.0);
/// let b = BoundingRect::centered(DVec2::new(12.0, 5.0), 6.0, 6.0);
/// assert!(a.intersects(&b));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingRect {
    /// Minimum x coordinate
    pub x: f64,
    /// Minimum y coordinate
    pub y: f64,
    /// Extent along x
    pub width: f64,
    /// Extent along y
    pub height: f64,
}

impl BoundingRect {
    /// Creates a rectangle from its minimum corner and size.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle of the given size centered on `center`.
    #[must_use]
    pub fn centered(center: DVec2, width: f64, height: f64) -> Self {
        Self::new(
            center.x - width / 2.0,
            center.y - height / 2.0,
            width,
            height,
        )
    }

    /// Maximum x coordinate.
    #[must_use]
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    /// Maximum y coordinate.
    #[must_use]
    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> DVec2 {
        DVec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Returns `true` if the rectangle has no area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// The four corners, counter-clockwise from the minimum corner.
    #[must_use]
    pub fn corners(&self) -> [DVec2; 4] {
        [
            DVec2::new(self.x, self.y),
            DVec2::new(self.max_x(), self.y),
            DVec2::new(self.max_x(), self.max_y()),
            DVec2::new(self.x, self.max_y()),
        ]
    }

    /// The four edges as line segments.
    #[must_use]
    pub fn edges(&self) -> [LineSegment; 4] {
        let [a, b, c, d] = self.corners();
        [
            LineSegment::new(a, b),
            LineSegment::new(b, c),
            LineSegment::new(c, d),
            LineSegment::new(d, a),
        ]
    }

    /// Returns `true` if `point` lies inside or on the boundary.
    #[must_use]
    pub fn contains_point(&self, point: DVec2) -> bool {
        point.x >= self.x && point.x <= self.max_x() && point.y >= self.y && point.y <= self.max_y()
    }

    /// Returns `true` if `self` lies entirely inside `outer` (boundaries inclusive).
    #[must_use]
    pub fn is_within(&self, outer: &BoundingRect) -> bool {
        self.x >= outer.x
            && self.y >= outer.y
            && self.max_x() <= outer.max_x()
            && self.max_y() <= outer.max_y()
    }

    /// Returns `true` if the interiors of the two rectangles overlap.
    ///
    /// Rectangles that only share an edge do not intersect.
    #[must_use]
    pub fn intersects(&self, other: &BoundingRect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        other.x + other.width > self.x
            && other.y + other.height > self.y
            && other.x < self.max_x()
            && other.y < self.max_y()
    }

    /// Returns `true` if the segment touches the closed rectangle.
    ///
    /// Uses Liang-Barsky clipping of the segment parameter range.
    #[must_use]
    pub fn intersects_line(&self, line: &LineSegment) -> bool {
        if self.is_empty() {
            return false;
        }
        let delta = line.end - line.start;
        let checks = [
            (-delta.x, line.start.x - self.x),
            (delta.x, self.max_x() - line.start.x),
            (-delta.y, line.start.y - self.y),
            (delta.y, self.max_y() - line.start.y),
        ];

        let mut t_enter = 0.0_f64;
        let mut t_exit = 1.0_f64;
        for (p, q) in checks {
            if p == 0.0 {
                if q < 0.0 {
                    return false;
                }
            } else {
                let r = q / p;
                if p < 0.0 {
                    if r > t_exit {
                        return false;
                    }
                    t_enter = t_enter.max(r);
                } else {
                    if r < t_enter {
                        return false;
                    }
                    t_exit = t_exit.min(r);
                }
            }
        }
        t_enter <= t_exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod rect_tests {
        use super::*;

        #[test]
        fn centered_rect_has_expected_corners() {
            let r = BoundingRect::centered(DVec2::new(50.0, 50.0), 36.0, 36.0);
            assert!((r.x - 32.0).abs() < 1e-12);
            assert!((r.max_y() - 68.0).abs() < 1e-12);
            assert_eq!(r.center(), DVec2::new(50.0, 50.0));
        }

        #[test]
        fn overlapping_rects_intersect() {
            let a = BoundingRect::new(0.0, 0.0, 10.0, 10.0);
            let b = BoundingRect::new(5.0, 5.0, 10.0, 10.0);
            assert!(a.intersects(&b));
            assert!(b.intersects(&a));
        }

        #[test]
        fn touching_rects_do_not_intersect() {
            let a = BoundingRect::new(0.0, 0.0, 10.0, 10.0);
            let b = BoundingRect::new(10.0, 0.0, 10.0, 10.0);
            assert!(!a.intersects(&b));
        }

        #[test]
        fn empty_rect_never_intersects() {
            let a = BoundingRect::new(0.0, 0.0, 0.0, 10.0);
            let b = BoundingRect::new(-5.0, -5.0, 20.0, 20.0);
            assert!(!a.intersects(&b));
        }

        #[test]
        fn within_is_inclusive() {
            let outer = BoundingRect::new(0.0, 0.0, 100.0, 100.0);
            assert!(BoundingRect::new(0.0, 0.0, 100.0, 100.0).is_within(&outer));
            assert!(!BoundingRect::new(-0.1, 0.0, 10.0, 10.0).is_within(&outer));
        }

        #[test]
        fn serializes_with_field_names() {
            let r = BoundingRect::new(1.0, 2.0, 36.0, 36.0);
            let json = serde_json::to_value(r).unwrap();
            assert_eq!(json["width"], 36.0);
            let back: BoundingRect = serde_json::from_value(json).unwrap();
            assert_eq!(back, r);
        }
    }

    mod line_clip_tests {
        use super::*;

        #[test]
        fn line_through_rect_intersects() {
            let r = BoundingRect::new(0.0, 0.0, 10.0, 10.0);
            let line = LineSegment::new(DVec2::new(-5.0, 5.0), DVec2::new(15.0, 5.0));
            assert!(r.intersects_line(&line));
        }

        #[test]
        fn line_inside_rect_intersects() {
            let r = BoundingRect::new(0.0, 0.0, 10.0, 10.0);
            let line = LineSegment::new(DVec2::new(2.0, 2.0), DVec2::new(3.0, 3.0));
            assert!(r.intersects_line(&line));
        }

        #[test]
        fn line_short_of_rect_misses() {
            let r = BoundingRect::new(0.0, 0.0, 10.0, 10.0);
            let line = LineSegment::new(DVec2::new(-10.0, 5.0), DVec2::new(-1.0, 5.0));
            assert!(!r.intersects_line(&line));
        }

        #[test]
        fn parallel_line_outside_misses() {
            let r = BoundingRect::new(0.0, 0.0, 10.0, 10.0);
            let line = LineSegment::new(DVec2::new(-5.0, 11.0), DVec2::new(15.0, 11.0));
            assert!(!r.intersects_line(&line));
        }

        #[test]
        fn diagonal_past_corner_misses() {
            let r = BoundingRect::new(0.0, 0.0, 10.0, 10.0);
            let line = LineSegment::new(DVec2::new(8.0, 13.0), DVec2::new(13.0, 8.0));
            assert!(!r.intersects_line(&line));
        }

        #[test]
        fn point_segment_on_boundary_intersects() {
            let r = BoundingRect::new(0.0, 0.0, 10.0, 10.0);
            let p = DVec2::new(10.0, 4.0);
            assert!(r.intersects_line(&LineSegment::new(p, p)));
        }
    }
}
