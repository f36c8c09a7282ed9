//! Property-based tests for resona-core spatial math.
//!
//! Randomized geometry and velocities must never push the spatial chain
//! outside its documented ranges: angles stay bounded and finite, gains stay
//! in [0, 1], Doppler ratios stay inside the octave clamp, and the panners
//! keep constant power and finite output.

use proptest::prelude::*;
use resona_core::{
    azimuth_elevation, doppler_rate, ConeEffect, DistanceEffect, DistanceModel, EqualPowerPanner,
    PanInput, SmoothedValue, SpatialPanner, Vec3, DOPPLER_RATE_MAX, DOPPLER_RATE_MIN,
};

fn vec3(range: f32) -> impl Strategy<Value = Vec3> {
    (-range..range, -range..range, -range..range).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Azimuth is always finite and within [-180, 180]; elevation within
    /// [-90, 90] — for any source/listener geometry, including degenerate
    /// frames.
    #[test]
    fn angles_stay_bounded(
        source in vec3(1000.0),
        listener in vec3(1000.0),
        front in vec3(2.0),
        up in vec3(2.0),
    ) {
        let (az, el) = azimuth_elevation(source, listener, front, up);
        prop_assert!(az.is_finite() && el.is_finite());
        prop_assert!((-180.0..=180.0).contains(&az), "azimuth {az}");
        prop_assert!((-90.0..=90.0).contains(&el), "elevation {el}");
    }

    /// Doppler ratio is always inside the documented clamp, whatever the
    /// velocities.
    #[test]
    fn doppler_stays_clamped(
        source in vec3(100.0),
        source_vel in vec3(1e6),
        listener in vec3(100.0),
        listener_vel in vec3(1e6),
        factor in 0.0f64..10.0,
    ) {
        let rate = doppler_rate(source, source_vel, listener, listener_vel, factor, 343.3);
        prop_assert!(rate.is_finite());
        prop_assert!((DOPPLER_RATE_MIN..=DOPPLER_RATE_MAX).contains(&rate), "rate {rate}");
    }

    /// Distance gain is within [0, 1] for every model and parameter choice.
    #[test]
    fn distance_gain_stays_normalized(
        model in 0u16..3,
        distance in 0.0f64..1e6,
        rolloff in 0.0f64..100.0,
    ) {
        let mut fx = DistanceEffect::default();
        fx.set_model(DistanceModel::from_raw(model).unwrap());
        fx.set_rolloff(rolloff);
        let gain = fx.gain(distance);
        prop_assert!((0.0..=1.0).contains(&gain), "gain {gain}");
    }

    /// Cone gain interpolates within [min(1, outer), max(1, outer)].
    #[test]
    fn cone_gain_stays_in_range(
        source in vec3(100.0),
        orientation in vec3(2.0),
        listener in vec3(100.0),
        inner in 0.0f64..360.0,
        outer in 0.0f64..360.0,
        outer_gain in 0.0f64..1.0,
    ) {
        let mut cone = ConeEffect::default();
        cone.set_inner_angle(inner);
        cone.set_outer_angle(outer);
        cone.set_outer_gain(outer_gain);
        let gain = cone.gain(source, orientation, listener);
        prop_assert!(gain.is_finite());
        prop_assert!(gain >= outer_gain.min(1.0) - 1e-9 && gain <= 1.0 + 1e-9, "gain {gain}");
    }

    /// The equal-power panner conserves power for mono input at any azimuth.
    #[test]
    fn equal_power_conserves_power(azimuth in -180.0f32..180.0) {
        let mut panner = EqualPowerPanner::new();
        let input = [1.0f32; 8];
        let mut left = [0.0f32; 8];
        let mut right = [0.0f32; 8];
        panner.pan(azimuth, 0.0, PanInput::Mono(&input), &mut left, &mut right);
        let power = left[0] * left[0] + right[0] * right[0];
        prop_assert!((power - 1.0).abs() < 1e-4, "power {power} at {azimuth}");
    }

    /// A smoothed value converges toward any constant target without
    /// overshoot.
    #[test]
    fn smoothing_never_overshoots(
        start in -10.0f32..10.0,
        target in -10.0f32..10.0,
    ) {
        let mut v = SmoothedValue::new(start, 48000.0);
        v.set_target(target);
        let (lo, hi) = if start <= target { (start, target) } else { (target, start) };
        for _ in 0..10_000 {
            let next = v.advance();
            prop_assert!(next >= lo - 1e-5 && next <= hi + 1e-5, "{next} outside [{lo}, {hi}]");
        }
        prop_assert!((v.value() - target).abs() < 1e-2);
    }
}
