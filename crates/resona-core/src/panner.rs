//! The spatialization strategy interface.
//!
//! A panner renders a mono or stereo source into a stereo image for a given
//! azimuth/elevation. The graph's spatializer node owns one strategy at a
//! time and swaps it when the panning model changes; strategies keep their
//! own per-ear state (delay lines, filters) and must be [`reset`] when the
//! signal chain restarts.
//!
//! [`reset`]: SpatialPanner::reset

/// Source channels handed to a panner for one block.
#[derive(Clone, Copy)]
pub enum PanInput<'a> {
    Mono(&'a [f32]),
    Stereo(&'a [f32], &'a [f32]),
}

impl<'a> PanInput<'a> {
    /// Frames in the block.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            PanInput::Mono(c) => c.len(),
            PanInput::Stereo(l, _) => l.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renders a source into a stereo image at an azimuth/elevation.
///
/// Azimuth is in degrees, 0 straight ahead, positive to the listener's
/// right; implementations clamp to `[-180, 180]`. Elevation is in degrees,
/// positive above the horizontal plane.
pub trait SpatialPanner: Send {
    /// Render one block. `left` and `right` are fully overwritten.
    fn pan(
        &mut self,
        azimuth: f32,
        elevation: f32,
        source: PanInput<'_>,
        left: &mut [f32],
        right: &mut [f32],
    );

    /// Clear internal state (delay lines, filter history).
    fn reset(&mut self);
}
