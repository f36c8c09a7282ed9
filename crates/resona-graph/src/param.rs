//! Node parameters: atomic control-side values, per-block render-side ramps.
//!
//! A parameter is split across the two threads. The control thread holds a
//! [`ParamHandle`] and assigns targets with a single atomic store — no lock,
//! no allocation. The render side owns a [`ParamState`] that reads the
//! target once per block and materializes an F-sample value ramp:
//!
//! - with no modulator connections, a de-zippered exponential approach from
//!   the previous value toward the target (snapping on the first block after
//!   a reset);
//! - with modulators, the connected outputs are pulled and summed
//!   sample-by-sample on top of the de-zippered base, clamped to the
//!   parameter's range.
//!
//! Assigned values outside `[min, max]` clamp silently.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use resona_core::SmoothedValue;

use crate::graph::OutputRef;

/// An `f32` stored as atomic bits, for lock-free cross-thread parameter and
/// doppler-rate sharing.
pub(crate) struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub(crate) fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub(crate) fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Static description of a parameter: name, default and range.
#[derive(Clone, Copy, Debug)]
pub struct ParamDescriptor {
    pub name: &'static str,
    pub default: f32,
    pub min: f32,
    pub max: f32,
}

pub(crate) struct ParamShared {
    descriptor: ParamDescriptor,
    target: AtomicF32,
}

impl ParamShared {
    pub(crate) fn new(descriptor: ParamDescriptor) -> Arc<Self> {
        Arc::new(Self {
            target: AtomicF32::new(descriptor.default),
            descriptor,
        })
    }

    /// Clamp into range and store atomically.
    pub(crate) fn set_target(&self, value: f32) {
        self.target
            .store(value.clamp(self.descriptor.min, self.descriptor.max));
    }

    pub(crate) fn target(&self) -> f32 {
        self.target.load()
    }
}

/// Control-thread handle to one node parameter.
#[derive(Clone)]
pub struct ParamHandle {
    pub(crate) shared: Arc<ParamShared>,
    pub(crate) context: Arc<crate::context::ContextShared>,
    pub(crate) node: crate::graph::NodeId,
    pub(crate) index: usize,
}

impl ParamHandle {
    /// Assign a new target value, silently clamped into `[min, max]`.
    ///
    /// An atomic store; the audio thread picks the new target up at its next
    /// block and de-zippers toward it.
    pub fn set_value(&self, value: f32) {
        self.shared.set_target(value);
    }

    /// The most recently assigned (clamped) target.
    pub fn value(&self) -> f32 {
        self.shared.target()
    }

    pub fn descriptor(&self) -> ParamDescriptor {
        self.shared.descriptor
    }
}

/// Render-side parameter state: smoothing, the materialized block, and the
/// audio-rate modulator connections.
pub struct ParamState {
    pub(crate) shared: Arc<ParamShared>,
    pub(crate) smoother: SmoothedValue,
    pub(crate) values: Vec<f32>,
    pub(crate) modulators: Vec<OutputRef>,
    pub(crate) needs_snap: bool,
}

impl ParamState {
    pub(crate) fn new(shared: Arc<ParamShared>, sample_rate: f32, frames: usize) -> Self {
        let default = shared.descriptor.default;
        Self {
            shared,
            smoother: SmoothedValue::new(default, sample_rate),
            values: vec![default; frames],
            modulators: Vec::new(),
            needs_snap: true,
        }
    }

    /// The materialized per-sample values for the current block.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// The last sample of the current block — the per-block scalar view.
    #[inline]
    pub fn final_value(&self) -> f32 {
        *self.values.last().unwrap_or(&self.shared.descriptor.default)
    }

    /// True when modulator connections make this block sample-accurate.
    #[inline]
    pub fn is_sample_accurate(&self) -> bool {
        !self.modulators.is_empty()
    }

    /// Write the de-zippered base ramp for this block. Modulator
    /// contributions are added on top by the dispatch loop, which has access
    /// to the graph.
    pub(crate) fn materialize_base(&mut self, frames: usize) {
        let target = self.shared.target.load();
        self.smoother.set_target(target);
        if self.needs_snap {
            self.smoother.snap();
            self.needs_snap = false;
        }
        for value in self.values.iter_mut().take(frames) {
            *value = self.smoother.advance();
        }
    }

    /// Clamp the materialized block into the parameter's range. Run after
    /// modulator summing.
    pub(crate) fn clamp_block(&mut self, frames: usize) {
        let d = self.shared.descriptor;
        for value in self.values.iter_mut().take(frames) {
            *value = value.clamp(d.min, d.max);
        }
    }

    /// Forget smoothing history so the next block snaps to the target.
    pub(crate) fn reset(&mut self) {
        self.needs_snap = true;
    }
}

/// Shared doppler pitch ratio, written by a spatializer node and read by the
/// sources it has discovered upstream.
#[derive(Clone)]
pub struct DopplerHandle(pub(crate) Arc<AtomicF32>);

impl DopplerHandle {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicF32::new(1.0)))
    }

    #[inline]
    pub fn rate(&self) -> f32 {
        self.0.load()
    }

    #[inline]
    pub(crate) fn set_rate(&self, rate: f32) {
        self.0.store(rate);
    }
}
