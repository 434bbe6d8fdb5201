//! Checked conversions between pixel coordinate types

use crate::{Error, Result};

/// Safely convert f64 to i32 with bounds checking
///
/// # Errors
///
/// Returns an error if the value is not finite or outside i32 range
#[allow(clippy::cast_possible_truncation)] // Truncation after bounds check is safe
pub fn f64_to_i32(value: f64) -> Result<i32> {
    if value.is_finite() && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX) {
        Ok(value as i32)
    } else {
        Err(Error::InvalidInput(format!(
            "Value {value} cannot be safely converted to i32"
        )))
    }
}

/// Clamp and convert f64 to i32 for pixel coordinates
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn f64_to_i32_clamp(value: f64, min: i32, max: i32) -> i32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    let clamped = value.clamp(f64::from(min), f64::from(max));
    (clamped as i32).clamp(min, max)
}

/// Convert a positive f64 extent into u32 pixels, rounding and rejecting non-finite input
///
/// # Errors
///
/// Returns an error if the value is not finite, negative or too large for u32
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Range checked first
pub fn f64_to_u32(value: f64) -> Result<u32> {
    let rounded = value.round();
    if rounded.is_finite() && rounded >= 0.0 && rounded <= f64::from(u32::MAX) {
        Ok(rounded as u32)
    } else {
        Err(Error::InvalidInput(format!(
            "Value {value} cannot be safely converted to u32"
        )))
    }
}

/// Clamp and convert f64 to u32, mapping non-finite input to `min`
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Clamping ensures safe truncation
pub fn f64_to_u32_clamp(value: f64, min: u32, max: u32) -> u32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    (value.clamp(f64::from(min), f64::from(max)) as u32).clamp(min, max)
}
