//! Small numeric helpers shared by the pose pipeline and filters.

pub mod safe_cast;
#[cfg(feature = "opencv")]
pub mod image_conversion;

use std::f64::consts::{PI, TAU};

/// Wrap an angle in radians into `(-π, π]`
#[must_use]
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Shift `angle` by whole turns so it lies within π of `reference`.
///
/// Used before filtering angle channels so averaging never crosses the ±π seam.
#[must_use]
pub fn unwrap_angle(reference: f64, angle: f64) -> f64 {
    reference + wrap_angle(angle - reference)
}

/// Clamp a value into `[min, max]`, replacing non-finite input with `fallback`
#[must_use]
pub fn clamp_finite(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback.clamp(min, max)
    }
}
