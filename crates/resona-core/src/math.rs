//! Small math helpers shared across the crate.
//!
//! All functions are `libm`-backed, allocation-free and `no_std` friendly.

use libm::{log10f, powf};

/// Convert decibels to linear gain (0 dB → 1.0, -6 dB → ~0.5).
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    powf(10.0, db / 20.0)
}

/// Convert linear gain to decibels. Gains at or below zero clamp to -120 dB.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        -120.0
    } else {
        20.0 * log10f(linear)
    }
}

/// Degrees to radians.
#[inline]
pub fn deg_to_rad(deg: f32) -> f32 {
    deg * (core::f32::consts::PI / 180.0)
}

/// Radians to degrees.
#[inline]
pub fn rad_to_deg(rad: f32) -> f32 {
    rad * (180.0 / core::f32::consts::PI)
}

/// Replace NaN or infinite values with a fallback.
///
/// Spatial math runs on unchecked host-provided geometry; any intermediate
/// can go non-finite (zero-length vectors, overflow). The render contract is
/// that such values degrade to a neutral fallback instead of raising.
#[inline]
pub fn finite_or(x: f32, fallback: f32) -> f32 {
    if x.is_finite() { x } else { fallback }
}

/// Double-precision variant of [`finite_or`] for accumulated values.
#[inline]
pub fn finite_or_f64(x: f64, fallback: f64) -> f64 {
    if x.is_finite() { x } else { fallback }
}
