//! Head-model binaural panner.
//!
//! Stands in for a measured-HRTF convolution engine with a spherical-head
//! approximation: equal-power level differences, an interaural time
//! difference realized by a fractional delay on the far ear, and a one-pole
//! head-shadow lowpass that darkens the far ear as the source moves
//! off-center. The node-facing interface (pan per block, reset) is the same
//! one a convolution-backed implementation would present.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use libm::{cosf, expf, fabsf, sinf};

use crate::math::deg_to_rad;
use crate::panner::{PanInput, SpatialPanner};

const HALF_PI: f32 = core::f32::consts::FRAC_PI_2;

/// Maximum interaural time difference in seconds (ear-to-ear path length).
const MAX_ITD_SECONDS: f32 = 0.00066;

/// Far-ear shadow cutoff range in Hz.
const SHADOW_CUTOFF_MAX: f32 = 18000.0;
const SHADOW_CUTOFF_MIN: f32 = 1500.0;

/// Binaural panner using a spherical head model.
pub struct HrtfPanner {
    sample_rate: f32,
    delay_left: FractionalDelay,
    delay_right: FractionalDelay,
    shadow_left: OnePole,
    shadow_right: OnePole,
}

impl HrtfPanner {
    pub fn new(sample_rate: f32) -> Self {
        let max_delay_frames = (MAX_ITD_SECONDS * sample_rate) as usize + 2;
        Self {
            sample_rate,
            delay_left: FractionalDelay::new(max_delay_frames),
            delay_right: FractionalDelay::new(max_delay_frames),
            shadow_left: OnePole::new(),
            shadow_right: OnePole::new(),
        }
    }

    /// Per-ear delay in frames and shadow coefficient for an azimuth.
    fn ear_params(&self, azimuth: f32) -> ([f32; 2], [f32; 2]) {
        // Mirror rear azimuths; the ITD of a rear source matches its front
        // reflection on a sphere.
        let az = azimuth.clamp(-180.0, 180.0);
        let az = if az < -90.0 {
            -180.0 - az
        } else if az > 90.0 {
            180.0 - az
        } else {
            az
        };

        let az_rad = deg_to_rad(az);
        let itd_frames = MAX_ITD_SECONDS * self.sample_rate * fabsf(sinf(az_rad));

        // Positive azimuth: source on the right, left ear is far.
        let (delay_l, delay_r) = if az >= 0.0 { (itd_frames, 0.0) } else { (0.0, itd_frames) };

        let lateral = fabsf(sinf(az_rad));
        let far_cutoff = SHADOW_CUTOFF_MAX - (SHADOW_CUTOFF_MAX - SHADOW_CUTOFF_MIN) * lateral;
        let near_coeff = OnePole::coeff_for(SHADOW_CUTOFF_MAX, self.sample_rate);
        let far_coeff = OnePole::coeff_for(far_cutoff, self.sample_rate);
        let (coeff_l, coeff_r) =
            if az >= 0.0 { (far_coeff, near_coeff) } else { (near_coeff, far_coeff) };

        ([delay_l, delay_r], [coeff_l, coeff_r])
    }
}

impl SpatialPanner for HrtfPanner {
    fn pan(
        &mut self,
        azimuth: f32,
        _elevation: f32,
        source: PanInput<'_>,
        left: &mut [f32],
        right: &mut [f32],
    ) {
        let ([delay_l, delay_r], [coeff_l, coeff_r]) = self.ear_params(azimuth);

        // Equal-power level difference on top of the time difference.
        let az = azimuth.clamp(-90.0, 90.0);
        let pan = (az + 90.0) / 180.0;
        let gain_l = cosf(pan * HALF_PI);
        let gain_r = sinf(pan * HALF_PI);

        self.delay_left.set_delay(delay_l);
        self.delay_right.set_delay(delay_r);
        self.shadow_left.set_coeff(coeff_l);
        self.shadow_right.set_coeff(coeff_r);

        for i in 0..left.len() {
            let (in_l, in_r) = match source {
                PanInput::Mono(c) => (c[i], c[i]),
                PanInput::Stereo(l, r) => (l[i], r[i]),
            };
            let l = self.delay_left.process(in_l * gain_l);
            let r = self.delay_right.process(in_r * gain_r);
            left[i] = self.shadow_left.process(l);
            right[i] = self.shadow_right.process(r);
        }
    }

    fn reset(&mut self) {
        self.delay_left.clear();
        self.delay_right.clear();
        self.shadow_left.clear();
        self.shadow_right.clear();
    }
}

/// Ring-buffer delay with linear interpolation between taps.
struct FractionalDelay {
    buffer: Vec<f32>,
    write_pos: usize,
    delay_frames: f32,
}

impl FractionalDelay {
    fn new(max_frames: usize) -> Self {
        Self {
            buffer: vec![0.0; max_frames.max(2)],
            write_pos: 0,
            delay_frames: 0.0,
        }
    }

    fn set_delay(&mut self, frames: f32) {
        self.delay_frames = frames.clamp(0.0, (self.buffer.len() - 2) as f32);
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let len = self.buffer.len();
        self.buffer[self.write_pos] = input;

        let read = self.write_pos as f32 + len as f32 - self.delay_frames;
        let index = read as usize;
        let frac = read - index as f32;
        let a = self.buffer[index % len];
        let b = self.buffer[(index + 1) % len];

        self.write_pos = (self.write_pos + 1) % len;
        a + (b - a) * frac
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// One-pole lowpass used for the head-shadow filter.
struct OnePole {
    coeff: f32,
    state: f32,
}

impl OnePole {
    fn new() -> Self {
        Self { coeff: 1.0, state: 0.0 }
    }

    fn coeff_for(cutoff: f32, sample_rate: f32) -> f32 {
        if cutoff >= sample_rate * 0.5 {
            1.0
        } else {
            1.0 - expf(-core::f32::consts::TAU * cutoff / sample_rate)
        }
    }

    fn set_coeff(&mut self, coeff: f32) {
        self.coeff = coeff;
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.state += self.coeff * (input - self.state);
        self.state
    }

    fn clear(&mut self) {
        self.state = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_source_is_symmetric() {
        let mut panner = HrtfPanner::new(48000.0);
        let input: Vec<f32> = (0..64).map(|i| sinf(i as f32 * 0.2)).collect();
        let mut left = vec![0.0; 64];
        let mut right = vec![0.0; 64];
        panner.pan(0.0, 0.0, PanInput::Mono(&input), &mut left, &mut right);
        for (l, r) in left.iter().zip(right.iter()) {
            assert!((l - r).abs() < 1e-6);
        }
    }

    #[test]
    fn right_source_delays_left_ear() {
        let mut panner = HrtfPanner::new(48000.0);
        // Impulse from front-right: the right ear must lead the left.
        let mut input = vec![0.0; 64];
        input[0] = 1.0;
        let mut left = vec![0.0; 64];
        let mut right = vec![0.0; 64];
        panner.pan(45.0, 0.0, PanInput::Mono(&input), &mut left, &mut right);

        let first_right = right.iter().position(|&s| s.abs() > 1e-4).unwrap();
        let first_left = left.iter().position(|&s| s.abs() > 1e-4).unwrap_or(usize::MAX);
        assert!(first_right < first_left, "right {first_right}, left {first_left}");
    }

    #[test]
    fn reset_clears_tails() {
        let mut panner = HrtfPanner::new(48000.0);
        let input = vec![1.0; 16];
        let mut left = vec![0.0; 16];
        let mut right = vec![0.0; 16];
        panner.pan(45.0, 0.0, PanInput::Mono(&input), &mut left, &mut right);

        panner.reset();
        let silence = vec![0.0; 16];
        panner.pan(45.0, 0.0, PanInput::Mono(&silence), &mut left, &mut right);
        assert!(left.iter().chain(right.iter()).all(|&s| s.abs() < 1e-6));
    }
}
