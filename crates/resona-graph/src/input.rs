//! Input port: fan-in summing with channel negotiation.
//!
//! A [`NodeInput`] mixes every connected upstream output into an internal
//! summing bus. Two connection lists coexist: `connections` is the
//! control-thread truth, mutated under the graph lock; `rendering` is the
//! audio thread's view, updated only at graph-lock sync points so the render
//! path never observes a half-applied topology change.
//!
//! The negotiated channel count is `max(1, max over connected outputs)`,
//! recomputed whenever topology changes while the lock is held.

use crate::bus::AudioBus;
use crate::graph::OutputRef;

/// One input port.
pub struct NodeInput {
    bus: AudioBus,
    /// Upstream outputs connected to this input (control-thread truth).
    pub(crate) connections: Vec<OutputRef>,
    /// The audio thread's connection view; updated only at graph-lock
    /// points.
    pub(crate) rendering: Vec<OutputRef>,
}

impl NodeInput {
    pub(crate) fn new(frames: usize) -> Self {
        Self {
            bus: AudioBus::new(1, frames),
            connections: Vec::new(),
            rendering: Vec::new(),
        }
    }

    /// The internal summing bus holding this quantum's mixed input.
    #[inline]
    pub fn bus(&self) -> &AudioBus {
        &self.bus
    }

    #[inline]
    pub(crate) fn bus_mut(&mut self) -> &mut AudioBus {
        &mut self.bus
    }

    /// True if any upstream output is connected (enabled or not).
    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Connections the render path will actually mix this quantum.
    pub fn rendering_connection_count(&self) -> usize {
        self.rendering.len()
    }

    pub fn channel_count(&self) -> usize {
        self.bus.channel_count()
    }
}
