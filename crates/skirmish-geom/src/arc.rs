//! Radar scan arcs.
//!
//! A [`ScanArc`] is a pie slice: the region swept by a radar beam of fixed
//! length rotating from one compass heading to another within a single turn.
//!
//! # Intersection
//!
//! A rectangle intersects the slice if any of these hold:
//!
//! 1. Either bounding radius (the beam at the start or end of the sweep)
//!    crosses the rectangle
//! 2. A rectangle corner lies inside the slice
//! 3. A rectangle edge crosses the curved part of the slice within the sweep
//!
//! Together these cover every overlap configuration, including a zero-width
//! sweep, which degenerates to the single start beam.

use std::f64::consts::{PI, TAU};

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::angle::{bearing_to, heading_vector, normal_absolute_angle};
use crate::line::LineSegment;
use crate::rect::BoundingRect;
use crate::NEAR_DELTA;

/// A pie-slice radar sweep in compass coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanArc {
    /// Center of the sweep (the scanning robot's position)
    pub center: DVec2,
    /// Beam length
    pub radius: f64,
    /// Compass heading the sweep starts at
    pub start: f64,
    /// Signed sweep; positive is clockwise
    pub extent: f64,
}

impl ScanArc {
    /// Creates a scan arc.
    #[must_use]
    pub fn new(center: DVec2, radius: f64, start: f64, extent: f64) -> Self {
        Self {
            center,
            radius,
            start: normal_absolute_angle(start),
            extent,
        }
    }

    /// Builds the sweep a radar covered while turning from `last_heading` to
    /// `heading`, taking the short way around.
    ///
    /// # Example
    ///
    /// ```
    /// use glam::DVec2;
    /// use skirmish_geom::ScanArc;
    ///
    /// // 350° to 10° is a +20° clockwise sweep, not -340°
    /// let arc = ScanArc::from_sweep(DVec2::ZERO, 1200.0, 350f64.to_radians(), 10f64.to_radians());
    /// assert!((arc.extent - 20f64.to_radians()).abs() < 1e-9);
    /// ```
    #[must_use]
    pub fn from_sweep(center: DVec2, radius: f64, last_heading: f64, heading: f64) -> Self {
        let mut extent = heading - last_heading;
        if extent < -PI {
            extent += TAU;
        } else if extent > PI {
            extent -= TAU;
        }
        Self::new(center, radius, last_heading, extent)
    }

    /// Point at the tip of the beam at the start of the sweep.
    #[must_use]
    pub fn start_point(&self) -> DVec2 {
        self.center + heading_vector(self.start) * self.radius
    }

    /// Point at the tip of the beam at the end of the sweep.
    #[must_use]
    pub fn end_point(&self) -> DVec2 {
        self.center + heading_vector(self.start + self.extent) * self.radius
    }

    /// Returns `true` if the compass direction lies within the sweep.
    #[must_use]
    pub fn contains_angle(&self, angle: f64) -> bool {
        if self.extent.abs() >= TAU {
            return true;
        }
        let offset = if self.extent >= 0.0 {
            normal_absolute_angle(angle - self.start)
        } else {
            normal_absolute_angle(self.start - angle)
        };
        offset <= self.extent.abs() + NEAR_DELTA || offset >= TAU - NEAR_DELTA
    }

    /// Returns `true` if the point lies inside the slice.
    #[must_use]
    pub fn contains_point(&self, point: DVec2) -> bool {
        let distance = self.center.distance(point);
        if distance > self.radius {
            return false;
        }
        distance == 0.0 || self.contains_angle(bearing_to(self.center, point))
    }

    /// Returns `true` if the rectangle overlaps the slice.
    #[must_use]
    pub fn intersects_rect(&self, rect: &BoundingRect) -> bool {
        let start_beam = LineSegment::new(self.center, self.start_point());
        if rect.intersects_line(&start_beam) {
            return true;
        }
        if self.extent == 0.0 {
            return false;
        }

        let end_beam = LineSegment::new(self.center, self.end_point());
        if rect.intersects_line(&end_beam) {
            return true;
        }

        if rect.corners().iter().any(|&corner| self.contains_point(corner)) {
            return true;
        }

        rect.edges().iter().any(|edge| {
            circle_crossings(self.center, self.radius, edge)
                .into_iter()
                .flatten()
                .any(|point| self.contains_angle(bearing_to(self.center, point)))
        })
    }
}

/// Points where a segment crosses a circle, if any.
fn circle_crossings(center: DVec2, radius: f64, segment: &LineSegment) -> [Option<DVec2>; 2] {
    let direction = segment.end - segment.start;
    let offset = segment.start - center;
    let a = direction.length_squared();
    if a == 0.0 {
        return [None, None];
    }
    let b = 2.0 * direction.dot(offset);
    let c = offset.length_squared() - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return [None, None];
    }
    let root = discriminant.sqrt();
    let at = |t: f64| (0.0..=1.0).contains(&t).then(|| segment.start + direction * t);
    [at((-b - root) / (2.0 * a)), at((-b + root) / (2.0 * a))]
}
