//! Directional cone attenuation for spatialized sources.
//!
//! A source can radiate in a cone: full gain inside the inner cone,
//! `outer_gain` beyond the outer cone, and a linear blend in between. Angles
//! are full apertures in degrees (not half-angles).

use libm::{acos, fabs};

use crate::math::finite_or_f64;
use crate::vector::Vec3;

/// Cone-based gain computation.
#[derive(Clone, Debug)]
pub struct ConeEffect {
    inner_angle: f64,
    outer_angle: f64,
    outer_gain: f64,
}

impl Default for ConeEffect {
    fn default() -> Self {
        // 360-degree apertures: omnidirectional until configured.
        Self {
            inner_angle: 360.0,
            outer_angle: 360.0,
            outer_gain: 0.0,
        }
    }
}

impl ConeEffect {
    pub fn set_inner_angle(&mut self, degrees: f64) {
        self.inner_angle = degrees;
    }

    pub fn set_outer_angle(&mut self, degrees: f64) {
        self.outer_angle = degrees;
    }

    pub fn set_outer_gain(&mut self, gain: f64) {
        self.outer_gain = gain;
    }

    pub fn inner_angle(&self) -> f64 {
        self.inner_angle
    }

    pub fn outer_angle(&self) -> f64 {
        self.outer_angle
    }

    pub fn outer_gain(&self) -> f64 {
        self.outer_gain
    }

    /// Gain for a source at `source_position` facing `source_orientation`,
    /// heard from `listener_position`.
    pub fn gain(
        &self,
        source_position: Vec3,
        source_orientation: Vec3,
        listener_position: Vec3,
    ) -> f64 {
        if source_orientation.is_zero() || (self.inner_angle == 360.0 && self.outer_angle == 360.0)
        {
            return 1.0;
        }

        let source_to_listener = (listener_position - source_position).normalized();
        let orientation = source_orientation.normalized();

        let dot = source_to_listener.dot(orientation) as f64;
        let angle = 180.0 * acos(dot.clamp(-1.0, 1.0)) / core::f64::consts::PI;
        let abs_angle = fabs(angle);

        // The public API takes full apertures; the comparison wants half.
        let abs_inner = fabs(self.inner_angle) / 2.0;
        let abs_outer = fabs(self.outer_angle) / 2.0;

        let gain = if abs_angle <= abs_inner {
            1.0
        } else if abs_angle >= abs_outer {
            self.outer_gain
        } else {
            let x = (abs_angle - abs_inner) / (abs_outer - abs_inner);
            (1.0 - x) + self.outer_gain * x
        };
        finite_or_f64(gain, 1.0)
    }
}
