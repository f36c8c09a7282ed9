//! The node arena and the pull-based render protocol.
//!
//! All nodes live in a flat arena addressed by stable [`NodeId`]s; ports
//! refer to other nodes by id, never by pointer, so the graph has no
//! ownership cycles. The renderer owns the arena outright — rendering never
//! takes a lock — and every topology mutation in this module runs at a
//! graph-lock sync point.
//!
//! Rendering is pull-based: processing a node first recursively processes
//! everything upstream of it. Two mechanisms keep that sound:
//!
//! - **Fan-out memoization**: a node records the context time of its last
//!   dispatch and refuses to run twice in one quantum; consumers after the
//!   first read its cached output buses.
//! - **Take/put-back**: the node being dispatched is moved out of its arena
//!   slot for the duration, so recursive pulls of a feedback edge find an
//!   empty slot and skip it instead of aliasing.

use std::sync::Arc;

use crate::node::{NodeCore, ProcessIo, Processor, RefCounts, RefKind, RenderContext};

/// Stable arena identifier for a node.
///
/// Ids are assigned sequentially and never reused within a context, so a
/// stale id can never address a different node than it was created for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Identifies one output port: `(owning node, output index)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OutputRef {
    pub node: NodeId,
    pub index: usize,
}

/// Identifies one input port: `(owning node, input index)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct InputRef {
    pub node: NodeId,
    pub index: usize,
}

/// One arena slot: shared node state plus the per-type processor.
pub(crate) struct NodeEntry {
    pub(crate) core: NodeCore,
    pub(crate) processor: Box<dyn Processor>,
    /// Guards against reporting a finished source more than once.
    pub(crate) finished_reported: bool,
}

/// The renderer-owned node arena.
pub(crate) struct Graph {
    nodes: Vec<Option<NodeEntry>>,
    quantum_frames: usize,
    /// Sources that finished during a render quantum. This is the deferred
    /// deref queue: entries are completed at the next sync that acquires
    /// the graph lock.
    pub(crate) finished_sources: Vec<NodeId>,
    /// Inputs whose connections changed; channel negotiation pending.
    dirty_inputs: Vec<InputRef>,
}

impl Graph {
    pub(crate) fn new(quantum_frames: usize) -> Self {
        Self {
            nodes: Vec::new(),
            quantum_frames,
            finished_sources: Vec::new(),
            dirty_inputs: Vec::new(),
        }
    }

    pub(crate) fn quantum_frames(&self) -> usize {
        self.quantum_frames
    }

    pub(crate) fn add_node(&mut self, id: NodeId, entry: NodeEntry) {
        let index = id.index();
        if index >= self.nodes.len() {
            self.nodes.resize_with(index + 1, || None);
        }
        self.nodes[index] = Some(entry);
    }

    pub(crate) fn remove_node(&mut self, id: NodeId) -> Option<NodeEntry> {
        self.nodes.get_mut(id.index())?.take()
    }

    pub(crate) fn entry(&self, id: NodeId) -> Option<&NodeEntry> {
        self.nodes.get(id.index())?.as_ref()
    }

    pub(crate) fn entry_mut(&mut self, id: NodeId) -> Option<&mut NodeEntry> {
        self.nodes.get_mut(id.index())?.as_mut()
    }

    fn take(&mut self, id: NodeId) -> Option<NodeEntry> {
        self.nodes.get_mut(id.index())?.take()
    }

    fn put_back(&mut self, id: NodeId, entry: NodeEntry) {
        self.nodes[id.index()] = Some(entry);
    }

    // --- Render protocol ---

    /// Dispatch one node for the current quantum, pulling upstream first.
    ///
    /// Safe against fan-out (memoized on context time) and feedback edges
    /// (a node already mid-dispatch is absent from the arena and skipped).
    pub(crate) fn process_node(&mut self, id: NodeId, ctx: &RenderContext) {
        let Some(mut entry) = self.take(id) else {
            return;
        };

        if entry.core.initialized && entry.core.last_processing_time != ctx.current_time {
            // Update the time stamp before pulling so a feedback loop back
            // into this node terminates.
            entry.core.last_processing_time = ctx.current_time;

            self.pull_inputs(&mut entry.core, ctx);

            let silent_inputs = entry.core.inputs.iter().all(|input| input.bus().is_silent());
            if !silent_inputs {
                entry.core.last_non_silent_time = (ctx.current_frame as f64 + ctx.frames as f64)
                    / f64::from(entry.core.sample_rate);
            }

            let propagates = entry
                .processor
                .propagates_silence(entry.core.last_non_silent_time, ctx.current_time);

            if silent_inputs && propagates {
                for output in &mut entry.core.outputs {
                    output.bus_mut().zero();
                }
            } else {
                self.materialize_params(&mut entry.core, ctx);
                entry.processor.process(
                    ProcessIo {
                        inputs: &entry.core.inputs,
                        outputs: &mut entry.core.outputs,
                        params: &entry.core.params,
                    },
                    ctx,
                );
                for output in &mut entry.core.outputs {
                    output.bus_mut().clear_silent_flag();
                }
            }

            if entry.processor.finished() && !entry.finished_reported {
                entry.finished_reported = true;
                self.finished_sources.push(id);
            }
        }

        self.put_back(id, entry);
    }

    /// Pull every rendering connection of every input and mix into the
    /// input's summing bus. An input with no rendering connections ends the
    /// quantum zeroed with its silent flag set.
    fn pull_inputs(&mut self, core: &mut NodeCore, ctx: &RenderContext) {
        for input in &mut core.inputs {
            input.bus_mut().zero();
            for i in 0..input.rendering.len() {
                let conn = input.rendering[i];
                self.process_node(conn.node, ctx);
                if let Some(source) = self.entry(conn.node) {
                    if let Some(output) = source.core.outputs.get(conn.index) {
                        input.bus_mut().sum_from(output.bus());
                    }
                }
            }
        }
    }

    /// Write each parameter's block: de-zippered base ramp, plus pulled
    /// modulator outputs summed sample-by-sample, clamped to range.
    fn materialize_params(&mut self, core: &mut NodeCore, ctx: &RenderContext) {
        for param in &mut core.params {
            param.materialize_base(ctx.frames);
            if param.modulators.is_empty() {
                continue;
            }
            for i in 0..param.modulators.len() {
                let conn = param.modulators[i];
                self.process_node(conn.node, ctx);
                if let Some(source) = self.entry(conn.node) {
                    if let Some(output) = source.core.outputs.get(conn.index) {
                        let bus = output.bus();
                        if !bus.is_silent() {
                            let samples = bus.channel(0);
                            let frames = ctx.frames.min(samples.len());
                            for f in 0..frames {
                                param.values[f] += samples[f];
                            }
                        }
                    }
                }
            }
            param.clamp_block(ctx.frames);
        }
    }

    // --- Topology mutation (graph-lock points only) ---

    /// Wire `from` into `to`. Bumps the destination's connection ref and
    /// re-enables its outputs if it was dormant. Duplicate edges are
    /// ignored.
    pub(crate) fn connect(&mut self, from: OutputRef, to: InputRef) {
        {
            let Some(dst) = self.entry_mut(to.node) else {
                return;
            };
            let Some(input) = dst.core.inputs.get_mut(to.index) else {
                return;
            };
            if input.connections.contains(&from) {
                return;
            }
            input.connections.push(from);
        }

        let mut source_enabled = false;
        if let Some(src) = self.entry_mut(from.node) {
            if let Some(output) = src.core.outputs.get_mut(from.index) {
                output.connected_inputs.push(to);
                source_enabled = output.enabled;
            }
        }

        let refs = match self.entry(to.node) {
            Some(dst) => Arc::clone(&dst.core.refs),
            None => return,
        };

        if source_enabled {
            if let Some(dst) = self.entry_mut(to.node) {
                if let Some(input) = dst.core.inputs.get_mut(to.index) {
                    if !input.rendering.contains(&from) {
                        input.rendering.push(from);
                    }
                }
            }
        }

        // Somebody just connected to the destination: count it.
        refs.increment(RefKind::Connection);
        self.enable_outputs_if_necessary(to.node);
        self.mark_input_dirty(to);
    }

    /// Wire `from` into a parameter as an audio-rate modulator.
    pub(crate) fn connect_param(&mut self, from: OutputRef, node: NodeId, param_index: usize) {
        {
            let Some(dst) = self.entry_mut(node) else {
                return;
            };
            let Some(param) = dst.core.params.get_mut(param_index) else {
                return;
            };
            if param.modulators.contains(&from) {
                return;
            }
            param.modulators.push(from);
        }
        if let Some(src) = self.entry_mut(from.node) {
            if let Some(output) = src.core.outputs.get_mut(from.index) {
                output.connected_params.push((node, param_index));
            }
        }
    }

    /// Remove every connection leaving one output, dereffing each
    /// downstream node. Deletion cascades land in `deletions`.
    pub(crate) fn disconnect_all(
        &mut self,
        id: NodeId,
        output_index: usize,
        deletions: &mut Vec<NodeId>,
    ) {
        let (input_refs, param_refs) = {
            let Some(entry) = self.entry_mut(id) else {
                return;
            };
            let Some(output) = entry.core.outputs.get_mut(output_index) else {
                return;
            };
            (
                std::mem::take(&mut output.connected_inputs),
                std::mem::take(&mut output.connected_params),
            )
        };

        let from = OutputRef {
            node: id,
            index: output_index,
        };

        for input_ref in input_refs {
            let refs = {
                let Some(dst) = self.entry_mut(input_ref.node) else {
                    continue;
                };
                if let Some(input) = dst.core.inputs.get_mut(input_ref.index) {
                    input.connections.retain(|c| *c != from);
                    input.rendering.retain(|c| *c != from);
                }
                Arc::clone(&dst.core.refs)
            };
            refs.decrement(RefKind::Connection);
            self.mark_input_dirty(input_ref);
            self.deref_consequences(input_ref.node, RefKind::Connection, deletions);
        }

        for (node, param_index) in param_refs {
            if let Some(dst) = self.entry_mut(node) {
                if let Some(param) = dst.core.params.get_mut(param_index) {
                    param.modulators.retain(|c| *c != from);
                }
            }
        }
    }

    /// Structural consequences after a reference count was decremented.
    ///
    /// With no connections left: a node nobody holds a handle to is marked
    /// for deletion (disconnecting its outputs, which recursively derefs
    /// downstream); a node the host still holds goes dormant instead.
    pub(crate) fn deref_consequences(
        &mut self,
        id: NodeId,
        kind: RefKind,
        deletions: &mut Vec<NodeId>,
    ) {
        let (connection, normal, marked) = {
            let Some(entry) = self.entry(id) else {
                return;
            };
            (
                entry.core.refs.connection(),
                entry.core.refs.normal(),
                entry.core.marked_for_deletion,
            )
        };

        if connection != 0 {
            return;
        }

        if normal == 0 {
            if !marked {
                if let Some(entry) = self.entry_mut(id) {
                    entry.core.marked_for_deletion = true;
                }
                let output_count = self.entry(id).map_or(0, |e| e.core.outputs.len());
                for index in 0..output_count {
                    self.disconnect_all(id, index, deletions);
                }
                deletions.push(id);
            }
        } else if kind == RefKind::Connection {
            self.disable_outputs_if_necessary(id);
        }
    }

    /// Put a node's outputs in the dormant state when its last active
    /// connection went away.
    ///
    /// The threshold is `connection_ref <= 1`: a node down to a single live
    /// connection is already considered on its way out. Nodes reporting a
    /// tail are exempt: they must keep rendering until the tail has
    /// drained, however they are referenced.
    pub(crate) fn disable_outputs_if_necessary(&mut self, id: NodeId) {
        let should_disable = {
            let Some(entry) = self.entry(id) else {
                return;
            };
            entry.core.refs.connection() <= 1
                && !entry.core.disabled
                && entry.processor.tail_time() == 0.0
        };
        if should_disable {
            if let Some(entry) = self.entry_mut(id) {
                entry.core.disabled = true;
            }
            self.set_outputs_enabled(id, false);
        }
    }

    /// Re-enable a dormant node that has picked up a live connection again.
    pub(crate) fn enable_outputs_if_necessary(&mut self, id: NodeId) {
        let should_enable = {
            let Some(entry) = self.entry(id) else {
                return;
            };
            entry.core.disabled && entry.core.refs.connection() > 0
        };
        if should_enable {
            if let Some(entry) = self.entry_mut(id) {
                entry.core.disabled = false;
                // Parameters snap on the next block: ramping from a value
                // last smoothed before the dormant gap would be audible.
                for param in &mut entry.core.params {
                    param.reset();
                }
            }
            self.set_outputs_enabled(id, true);
        }
    }

    /// Add or remove a node's outputs from their downstream inputs'
    /// rendering sets.
    fn set_outputs_enabled(&mut self, id: NodeId, enabled: bool) {
        let output_count = self.entry(id).map_or(0, |e| e.core.outputs.len());

        for output_index in 0..output_count {
            let connected = {
                let Some(entry) = self.entry_mut(id) else {
                    return;
                };
                let Some(output) = entry.core.outputs.get_mut(output_index) else {
                    continue;
                };
                output.enabled = enabled;
                std::mem::take(&mut output.connected_inputs)
            };

            let from = OutputRef {
                node: id,
                index: output_index,
            };

            for input_ref in &connected {
                if let Some(dst) = self.entry_mut(input_ref.node) {
                    if let Some(input) = dst.core.inputs.get_mut(input_ref.index) {
                        if enabled {
                            if !input.rendering.contains(&from) {
                                input.rendering.push(from);
                            }
                        } else {
                            input.rendering.retain(|c| *c != from);
                        }
                    }
                }
                self.mark_input_dirty(*input_ref);
            }

            if let Some(entry) = self.entry_mut(id) {
                if let Some(output) = entry.core.outputs.get_mut(output_index) {
                    output.connected_inputs = connected;
                }
            }
        }
    }

    pub(crate) fn mark_input_dirty(&mut self, input_ref: InputRef) {
        self.dirty_inputs.push(input_ref);
    }

    /// Recompute negotiated channel counts for inputs whose topology
    /// changed, propagating width changes through pass-through nodes.
    pub(crate) fn negotiate_channels(&mut self) {
        // The graph is a DAG in practice, but a safety budget keeps a
        // pathological feedback topology from spinning here forever.
        let mut budget = self.nodes.len() * 8 + 64;

        while let Some(input_ref) = self.dirty_inputs.pop() {
            if budget == 0 {
                self.dirty_inputs.clear();
                return;
            }
            budget -= 1;

            let desired = {
                let Some(entry) = self.entry(input_ref.node) else {
                    continue;
                };
                let Some(input) = entry.core.inputs.get(input_ref.index) else {
                    continue;
                };
                let mut max_channels = 0;
                for conn in &input.connections {
                    if let Some(source) = self.entry(conn.node) {
                        if let Some(output) = source.core.outputs.get(conn.index) {
                            max_channels = max_channels.max(output.channel_count());
                        }
                    }
                }
                max_channels.max(1)
            };

            let Some(entry) = self.entry_mut(input_ref.node) else {
                continue;
            };
            if let Some(input) = entry.core.inputs.get_mut(input_ref.index) {
                if input.channel_count() != desired {
                    input.bus_mut().set_channel_count(desired);
                }
            }

            // Pass-through nodes follow their input width on output 0.
            let Some(want) = entry.processor.preferred_output_channels(desired) else {
                continue;
            };
            let Some(output) = entry.core.outputs.get_mut(0) else {
                continue;
            };
            if output.channel_count() == want {
                continue;
            }
            output.set_channel_count(want);
            let downstream: Vec<InputRef> = output.connected_inputs.clone();
            entry.processor.on_output_channels_changed(want);
            for input_ref in downstream {
                self.mark_input_dirty(input_ref);
            }
        }
    }

    /// Let spatializers that saw the topology change rediscover the sources
    /// upstream of them, handing each its doppler ratio.
    pub(crate) fn run_source_scans(&mut self, connection_count: u64) {
        let spatializers: Vec<NodeId> = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let entry = slot.as_ref()?;
                entry.processor.doppler_source().map(|_| NodeId(index as u32))
            })
            .collect();

        for id in spatializers {
            let (handle, wants) = {
                let Some(entry) = self.entry_mut(id) else {
                    continue;
                };
                let wants = entry.processor.wants_source_scan(connection_count);
                (entry.processor.doppler_source(), wants)
            };
            if !wants {
                continue;
            }
            let Some(handle) = handle else {
                continue;
            };

            // Depth-first walk upstream over the rendering connections.
            let mut stack: Vec<NodeId> = Vec::new();
            if let Some(entry) = self.entry(id) {
                for input in &entry.core.inputs {
                    for conn in &input.rendering {
                        stack.push(conn.node);
                    }
                }
            }

            let mut visited: Vec<NodeId> = Vec::new();
            while let Some(node) = stack.pop() {
                if visited.contains(&node) {
                    continue;
                }
                visited.push(node);
                if let Some(entry) = self.entry_mut(node) {
                    entry.processor.set_doppler(handle.clone());
                }
                if let Some(entry) = self.entry(node) {
                    for input in &entry.core.inputs {
                        for conn in &input.rendering {
                            stack.push(conn.node);
                        }
                    }
                }
            }
        }
    }

    /// Reference counts of a node, for control-side observation.
    pub(crate) fn refs(&self, id: NodeId) -> Option<Arc<RefCounts>> {
        self.entry(id).map(|entry| Arc::clone(&entry.core.refs))
    }
}
