//! Equal-power stereo panning.
//!
//! The classic constant-power pan law: left and right gains follow a quarter
//! cosine/sine so perceived loudness stays flat as a source sweeps the
//! stereo field. Mono sources pan across the whole field; stereo sources
//! keep the near channel intact and re-pan the far channel within its half
//! of the field.

use libm::{cosf, sinf};

use crate::panner::{PanInput, SpatialPanner};

const HALF_PI: f32 = core::f32::consts::FRAC_PI_2;

/// Equal-power panner. Stateless between blocks.
#[derive(Debug, Default)]
pub struct EqualPowerPanner;

impl EqualPowerPanner {
    pub fn new() -> Self {
        Self
    }
}

impl SpatialPanner for EqualPowerPanner {
    fn pan(
        &mut self,
        azimuth: f32,
        _elevation: f32,
        source: PanInput<'_>,
        left: &mut [f32],
        right: &mut [f32],
    ) {
        let azimuth = azimuth.clamp(-180.0, 180.0);

        match source {
            PanInput::Mono(input) => {
                // Mirror rear azimuths into the front hemisphere.
                let az = if azimuth < -90.0 {
                    -180.0 - azimuth
                } else if azimuth > 90.0 {
                    180.0 - azimuth
                } else {
                    azimuth
                };
                let pan = (az + 90.0) / 180.0;
                let gain_l = cosf(pan * HALF_PI);
                let gain_r = sinf(pan * HALF_PI);

                for ((l, r), &s) in left.iter_mut().zip(right.iter_mut()).zip(input) {
                    *l = s * gain_l;
                    *r = s * gain_r;
                }
            }
            PanInput::Stereo(in_l, in_r) => {
                if azimuth <= 0.0 {
                    // Source on the left: left channel passes through, the
                    // right channel pans within the left half of the field.
                    let az = if azimuth < -90.0 { -180.0 - azimuth } else { azimuth };
                    let pan = (az + 90.0) / 90.0;
                    let gain_l = cosf(pan * HALF_PI);
                    let gain_r = sinf(pan * HALF_PI);

                    for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
                        *l = in_l[i] + in_r[i] * gain_l;
                        *r = in_r[i] * gain_r;
                    }
                } else {
                    let az = if azimuth > 90.0 { 180.0 - azimuth } else { azimuth };
                    let pan = az / 90.0;
                    let gain_l = cosf(pan * HALF_PI);
                    let gain_r = sinf(pan * HALF_PI);

                    for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
                        *l = in_l[i] * gain_l;
                        *r = in_r[i] + in_l[i] * gain_r;
                    }
                }
            }
        }
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pan_mono(azimuth: f32, sample: f32) -> (f32, f32) {
        let mut panner = EqualPowerPanner::new();
        let input = [sample; 4];
        let mut left = [0.0; 4];
        let mut right = [0.0; 4];
        panner.pan(azimuth, 0.0, PanInput::Mono(&input), &mut left, &mut right);
        (left[0], right[0])
    }

    #[test]
    fn center_is_equal_power() {
        let (l, r) = pan_mono(0.0, 1.0);
        assert!((l - r).abs() < 1e-6);
        // cos(45deg) = sin(45deg) = sqrt(0.5)
        assert!((l - core::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn hard_left_and_right() {
        let (l, r) = pan_mono(-90.0, 1.0);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);

        let (l, r) = pan_mono(90.0, 1.0);
        assert!(l.abs() < 1e-6 && (r - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rear_mirrors_to_front() {
        // 135 degrees behind-right sounds like 45 degrees front-right.
        let (l1, r1) = pan_mono(135.0, 1.0);
        let (l2, r2) = pan_mono(45.0, 1.0);
        assert!((l1 - l2).abs() < 1e-6);
        assert!((r1 - r2).abs() < 1e-6);
    }

    #[test]
    fn power_is_constant_across_field() {
        for deg in -90..=90 {
            let (l, r) = pan_mono(deg as f32, 1.0);
            let power = l * l + r * r;
            assert!((power - 1.0).abs() < 1e-5, "power {power} at {deg}");
        }
    }

    #[test]
    fn stereo_left_sweep_keeps_left_channel() {
        let mut panner = EqualPowerPanner::new();
        let in_l = [0.5; 4];
        let in_r = [0.25; 4];
        let mut left = [0.0; 4];
        let mut right = [0.0; 4];
        panner.pan(-90.0, 0.0, PanInput::Stereo(&in_l, &in_r), &mut left, &mut right);
        // Fully left: right channel folds entirely into the left output.
        assert!((left[0] - 0.75).abs() < 1e-6);
        assert!(right[0].abs() < 1e-6);
    }
}
