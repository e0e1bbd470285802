//! # Skirmish Geom
//!
//! Geometry substrate for the Skirmish battle engine.
//!
//! All angles use **compass convention**: `0` points north (+y), angles grow
//! clockwise, and a heading `h` moves a body by `(sin h, cos h)` per unit of
//! velocity. The arena origin is the bottom-left corner.
//!
//! This crate provides:
//!
//! - **Angle normalization**: absolute `[0, 2π)` and relative `[-π, π)` forms
//! - **Bounding rectangles**: axis-aligned boxes with rect/line intersection
//! - **Line segments**: swept paths of bullets between two turns
//! - **Scan arcs**: pie-slice radar sweeps with arc/rect intersection
//!
//! ## Quick Start
//!
//! ```
//! use glam::DVec2;
//! use skirmish_geom::{BoundingRect, ScanArc};
//!
//! // A radar sweep from north to east, radius 1200
//! let arc = ScanArc::new(DVec2::new(100.0, 100.0), 1200.0, 0.0, std::f64::consts::FRAC_PI_2);
//!
//! // A robot box north-east of the scanner
//! let target = BoundingRect::centered(DVec2::new(400.0, 400.0), 36.0, 36.0);
//! assert!(arc.intersects_rect(&target));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod angle;
pub mod arc;
pub mod line;
pub mod rect;

// Re-exports for convenience
pub use angle::{
    bearing_to, heading_vector, is_near, normal_absolute_angle, normal_near_absolute_angle,
    normal_relative_angle,
};
pub use arc::ScanArc;
pub use line::LineSegment;
pub use rect::BoundingRect;

/// Tolerance used when comparing angles and distances for "near" equality.
pub const NEAR_DELTA: f64 = 0.00001;
