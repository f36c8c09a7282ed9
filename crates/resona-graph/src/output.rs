//! Output port: owns its bus, tracks downstream connections.
//!
//! A [`NodeOutput`] owns the bus its node renders into, plus the set of
//! downstream inputs and parameters connected to it. Connections hold the
//! owning node's arena id, never ownership — the arena is the single owner
//! of every node, so ports cannot form reference cycles.
//!
//! Enable/disable and disconnect-all cascade through other nodes' rendering
//! sets and reference counts, so those operations live on
//! [`Graph`](crate::graph::Graph) and run only at graph-lock points; the
//! port itself is plain data.

use crate::bus::AudioBus;
use crate::graph::{InputRef, NodeId};

/// One output port.
pub struct NodeOutput {
    bus: AudioBus,
    /// Downstream inputs this output feeds (control-thread truth).
    pub(crate) connected_inputs: Vec<InputRef>,
    /// Parameters this output modulates, as `(node, param index)`.
    pub(crate) connected_params: Vec<(NodeId, usize)>,
    /// Disabled outputs are severed from their inputs' rendering sets and
    /// cost nothing to the render path.
    pub(crate) enabled: bool,
}

impl NodeOutput {
    pub(crate) fn new(channel_count: usize, frames: usize) -> Self {
        Self {
            bus: AudioBus::new(channel_count, frames),
            connected_inputs: Vec::new(),
            connected_params: Vec::new(),
            enabled: true,
        }
    }

    /// The bus this output renders into.
    #[inline]
    pub fn bus(&self) -> &AudioBus {
        &self.bus
    }

    #[inline]
    pub fn bus_mut(&mut self) -> &mut AudioBus {
        &mut self.bus
    }

    pub fn channel_count(&self) -> usize {
        self.bus.channel_count()
    }

    /// Number of downstream inputs currently fed by this output.
    pub fn fan_out_count(&self) -> usize {
        self.connected_inputs.len()
    }

    pub(crate) fn set_channel_count(&mut self, channel_count: usize) {
        self.bus.set_channel_count(channel_count);
    }
}
