//! Compass-angle helpers.
//!
//! Headings are stored in radians in `[0, 2π)`. Bearings (angles relative to
//! a heading) are stored in `[-π, π)`.

use std::f64::consts::{PI, TAU};

use glam::DVec2;

use crate::NEAR_DELTA;

/// Normalizes an angle into the absolute range `[0, 2π)`.
///
/// # Example
///
/// ```
/// use skirmish_geom::normal_absolute_angle;
/// use std::f64::consts::PI;
///
/// assert!((normal_absolute_angle(-PI / 2.0) - 3.0 * PI / 2.0).abs() < 1e-12);
/// assert_eq!(normal_absolute_angle(0.0), 0.0);
/// ```
#[must_use]
pub fn normal_absolute_angle(angle: f64) -> f64 {
    let wrapped = angle % TAU;
    let result = if wrapped >= 0.0 { wrapped } else { wrapped + TAU };
    // A tiny negative input rounds up to exactly 2π.
    if result >= TAU {
        0.0
    } else {
        result
    }
}

/// Normalizes an angle into the relative range `[-π, π)`.
///
/// # Example
///
/// ```
/// use skirmish_geom::normal_relative_angle;
/// use std::f64::consts::PI;
///
/// assert!((normal_relative_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn normal_relative_angle(angle: f64) -> f64 {
    let wrapped = angle % TAU;
    if wrapped >= 0.0 {
        if wrapped < PI {
            wrapped
        } else {
            wrapped - TAU
        }
    } else if wrapped >= -PI {
        wrapped
    } else {
        wrapped + TAU
    }
}

/// Like [`normal_absolute_angle`], but snaps values within [`NEAR_DELTA`] of a
/// cardinal direction onto it.
///
/// Used when a body turn completes so that repeated quarter turns do not
/// accumulate drift away from exact compass points.
#[must_use]
pub fn normal_near_absolute_angle(angle: f64) -> f64 {
    let angle = normal_absolute_angle(angle);
    for cardinal in [0.0, PI / 2.0, PI, 3.0 * PI / 2.0, TAU] {
        if is_near(angle, cardinal) {
            return if cardinal >= TAU { 0.0 } else { cardinal };
        }
    }
    angle
}

/// Returns `true` if two values differ by less than [`NEAR_DELTA`].
#[must_use]
pub fn is_near(a: f64, b: f64) -> bool {
    (a - b).abs() < NEAR_DELTA
}

/// Compass bearing from `from` to `to`, in `[-π, π]`.
///
/// North is `0`, east is `π/2`.
#[must_use]
pub fn bearing_to(from: DVec2, to: DVec2) -> f64 {
    let delta = to - from;
    delta.x.atan2(delta.y)
}

/// Unit vector for a compass heading.
#[must_use]
pub fn heading_vector(heading: f64) -> DVec2 {
    DVec2::new(heading.sin(), heading.cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod normalization_tests {
        use super::*;

        #[test]
        fn absolute_wraps_negative_angles() {
            assert!((normal_absolute_angle(-PI) - PI).abs() < 1e-12);
            assert!((normal_absolute_angle(-0.25) - (TAU - 0.25)).abs() < 1e-12);
        }

        #[test]
        fn absolute_wraps_large_angles() {
            assert!((normal_absolute_angle(5.0 * PI) - PI).abs() < 1e-9);
            assert!(normal_absolute_angle(TAU).abs() < 1e-12);
        }

        #[test]
        fn absolute_never_returns_tau_for_tiny_negative() {
            let result = normal_absolute_angle(-1e-18);
            assert!(result < TAU);
        }

        #[test]
        fn relative_maps_pi_to_negative_pi() {
            assert!((normal_relative_angle(PI) + PI).abs() < 1e-12);
        }

        #[test]
        fn relative_keeps_small_angles() {
            assert!((normal_relative_angle(0.5) - 0.5).abs() < 1e-12);
            assert!((normal_relative_angle(-0.5) + 0.5).abs() < 1e-12);
        }

        #[test]
        fn near_absolute_snaps_to_cardinal() {
            assert!((normal_near_absolute_angle(PI / 2.0 + 1e-7) - PI / 2.0).abs() < 1e-15);
            assert!(normal_near_absolute_angle(TAU - 1e-7).abs() < 1e-15);
            assert!((normal_near_absolute_angle(1.0) - 1.0).abs() < 1e-15);
        }
    }

    mod bearing_tests {
        use super::*;

        #[test]
        fn bearing_north_is_zero() {
            let b = bearing_to(DVec2::ZERO, DVec2::new(0.0, 10.0));
            assert!(b.abs() < 1e-12);
        }

        #[test]
        fn bearing_east_is_quarter_turn() {
            let b = bearing_to(DVec2::ZERO, DVec2::new(10.0, 0.0));
            assert!((b - PI / 2.0).abs() < 1e-12);
        }

        #[test]
        fn heading_vector_matches_compass() {
            let east = heading_vector(PI / 2.0);
            assert!((east.x - 1.0).abs() < 1e-12);
            assert!(east.y.abs() < 1e-12);
        }
    }

    proptest! {
        #[test]
        fn absolute_angle_in_range(angle in -1000.0f64..1000.0) {
            let n = normal_absolute_angle(angle);
            prop_assert!((0.0..TAU).contains(&n));
        }

        #[test]
        fn relative_angle_in_range(angle in -1000.0f64..1000.0) {
            let n = normal_relative_angle(angle);
            prop_assert!((-PI..PI).contains(&n));
        }

        #[test]
        fn relative_preserves_direction(angle in -1000.0f64..1000.0) {
            let n = normal_relative_angle(angle);
            prop_assert!((n.sin() - angle.sin()).abs() < 1e-6);
            prop_assert!((n.cos() - angle.cos()).abs() < 1e-6);
        }
    }
}
