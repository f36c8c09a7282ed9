//! Source-to-listener angle and Doppler math.
//!
//! Pure functions shared by the spatializer node: azimuth/elevation of a
//! source relative to a listener's orientation frame, and the Doppler pitch
//! ratio from relative velocities. Degenerate geometry (coincident points,
//! zero-length frames) and non-finite intermediates degrade to neutral
//! values — azimuth/elevation 0, Doppler ratio 1 — never to NaN.

use libm::acos;

use crate::math::finite_or_f64;
use crate::vector::Vec3;

const PI: f64 = core::f64::consts::PI;

/// Doppler ratio clamp: three octaves down, four octaves up.
pub const DOPPLER_RATE_MIN: f64 = 0.125;
pub const DOPPLER_RATE_MAX: f64 = 16.0;

/// Azimuth and elevation of `source_position` in the listener's frame.
///
/// Azimuth is degrees from the listener's front, positive toward the
/// listener's right (`front × up`); elevation is degrees above the
/// horizontal plane, folded into `[-90, 90]`.
pub fn azimuth_elevation(
    source_position: Vec3,
    listener_position: Vec3,
    listener_front: Vec3,
    listener_up: Vec3,
) -> (f64, f64) {
    let source_listener = source_position - listener_position;
    if source_listener.is_zero() {
        return (0.0, 0.0);
    }
    let source_listener = source_listener.normalized();

    // Build the listener's orthonormal frame.
    let listener_right = listener_front.cross(listener_up).normalized();
    let listener_front = listener_front.normalized();
    let up = listener_right.cross(listener_front);

    let up_projection = source_listener.dot(up);
    let projected = (source_listener - up * up_projection).normalized();

    let mut azimuth = 180.0 * acos(projected.dot(listener_right) as f64) / PI;
    azimuth = finite_or_f64(azimuth, 0.0);

    // Source in front of or behind the listener.
    if (projected.dot(listener_front) as f64) < 0.0 {
        azimuth = 360.0 - azimuth;
    }

    // Make azimuth relative to the front vector rather than the right one.
    azimuth = if (0.0..=270.0).contains(&azimuth) { 90.0 - azimuth } else { 450.0 - azimuth };

    let mut elevation = 90.0 - 180.0 * acos(source_listener.dot(up) as f64) / PI;
    elevation = finite_or_f64(elevation, 0.0);

    if elevation > 90.0 {
        elevation = 180.0 - elevation;
    } else if elevation < -90.0 {
        elevation = -180.0 - elevation;
    }

    (azimuth, elevation)
}

/// Doppler pitch ratio for a moving source heard by a moving listener.
///
/// Velocity components along the source-listener axis shift the pitch by
/// `(c - k·vl) / (c - k·vs)` where `k` is the doppler factor. Projections
/// are clamped below `c / k` and the final ratio is clamped to
/// `[DOPPLER_RATE_MIN, DOPPLER_RATE_MAX]`.
pub fn doppler_rate(
    source_position: Vec3,
    source_velocity: Vec3,
    listener_position: Vec3,
    listener_velocity: Vec3,
    doppler_factor: f64,
    speed_of_sound: f64,
) -> f64 {
    if doppler_factor <= 0.0 {
        return 1.0;
    }
    if source_velocity.is_zero() && listener_velocity.is_zero() {
        return 1.0;
    }

    let source_to_listener = source_position - listener_position;
    let magnitude = source_to_listener.length() as f64;
    if magnitude == 0.0 {
        return 1.0;
    }

    let mut listener_projection =
        -(source_to_listener.dot(listener_velocity) as f64) / magnitude;
    let mut source_projection = -(source_to_listener.dot(source_velocity) as f64) / magnitude;

    let scaled_speed_of_sound = speed_of_sound / doppler_factor;
    listener_projection = listener_projection.min(scaled_speed_of_sound);
    source_projection = source_projection.min(scaled_speed_of_sound);

    let shift = (speed_of_sound - doppler_factor * listener_projection)
        / (speed_of_sound - doppler_factor * source_projection);
    let shift = finite_or_f64(shift, 1.0);

    shift.clamp(DOPPLER_RATE_MIN, DOPPLER_RATE_MAX)
}
