//! The renderer: audio-thread owner of the node arena.
//!
//! One [`Renderer`] exists per context. Moving it onto the audio thread is
//! the thread-affinity handoff: the type is `Send` but deliberately not
//! cloneable, so exactly one thread can ever drive rendering.
//!
//! Each quantum starts with a `try_lock` on the graph lock. If it succeeds,
//! queued topology operations are applied, deferred derefs completed,
//! deletions unlinked and channel counts renegotiated — then the lock is
//! released and the quantum renders. If the control thread holds the lock,
//! the quantum renders against the previous topology and the bookkeeping
//! waits for a later quantum; a contended lock never drops a quantum.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::trace;

use crate::context::{ContextShared, ControlState, GraphOp};
use crate::graph::{Graph, NodeId};
use crate::node::{RefKind, RenderContext};

/// Audio-thread rendering object. Produced by
/// [`AudioContext::new`](crate::AudioContext::new).
pub struct Renderer {
    graph: Graph,
    shared: Arc<ContextShared>,
    destination: NodeId,
}

impl Renderer {
    pub(crate) fn new(graph: Graph, shared: Arc<ContextShared>, destination: NodeId) -> Self {
        Self {
            graph,
            shared,
            destination,
        }
    }

    /// Frames rendered per call to [`render_quantum`](Self::render_quantum).
    pub fn quantum_frames(&self) -> usize {
        self.graph.quantum_frames()
    }

    /// Render one quantum of interleaved stereo into `output`.
    ///
    /// `output` must hold at least `quantum_frames() * 2` samples. A mono
    /// destination mix is duplicated into both channels; layouts wider than
    /// stereo fold down to their first two channels.
    pub fn render_quantum(&mut self, output: &mut [f32]) {
        let frames = self.graph.quantum_frames();
        assert!(
            output.len() >= frames * 2,
            "output buffer holds {} samples, quantum needs {}",
            output.len(),
            frames * 2
        );

        self.sync();

        let current_frame = self.shared.current_frame.load(Ordering::Acquire);
        let ctx = RenderContext {
            sample_rate: self.shared.sample_rate,
            frames,
            current_time: current_frame as f64 / f64::from(self.shared.sample_rate),
            current_frame,
            listener: self.shared.listener.snapshot(),
        };

        if !self.shared.closed.load(Ordering::Acquire) {
            self.graph.process_node(self.destination, &ctx);
        }

        self.write_destination(output, frames);
        self.shared
            .current_frame
            .fetch_add(frames as u64, Ordering::AcqRel);
    }

    /// Quantum-boundary bookkeeping, gated on a try-lock.
    fn sync(&mut self) {
        // Hold the guard through a local Arc so `self` stays free for the
        // arena mutations below.
        let shared = Arc::clone(&self.shared);
        let Some(mut guard) = shared.ctl.try_lock() else {
            // Contended: render against the previous topology; deferred
            // items accumulate until a later quantum acquires the lock.
            return;
        };
        let ctl: &mut ControlState = &mut guard;

        // Complete deferred derefs from sources that finished mid-render.
        while let Some(id) = self.graph.finished_sources.pop() {
            if let Some(refs) = self.graph.refs(id) {
                refs.decrement(RefKind::Normal);
            }
            self.graph
                .deref_consequences(id, RefKind::Normal, &mut ctl.deletion_list);
        }

        let ops = std::mem::take(&mut ctl.ops);
        let op_count = ops.len();
        for op in ops {
            self.apply_op(op, ctl);
        }
        if op_count > 0 {
            trace!(op_count, "applied graph operations");
        }

        self.graph.negotiate_channels();

        // Unlink deleted nodes; their storage goes back to the control
        // thread for deallocation at the next sweep.
        while let Some(id) = ctl.deletion_list.pop() {
            if let Some(entry) = self.graph.remove_node(id) {
                trace!(node = %id, kind = ?entry.core.kind, "unlinked deleted node");
                if let Some(Some(record)) = ctl.registry.get_mut(id.index()) {
                    record.alive = false;
                }
                ctl.garbage.push(entry);
            }
        }

        self.graph
            .run_source_scans(self.shared.connection_count.load(Ordering::Acquire));
    }

    fn apply_op(&mut self, op: GraphOp, ctl: &mut ControlState) {
        match op {
            GraphOp::AddNode { id, entry } => self.graph.add_node(id, entry),
            GraphOp::Connect { from, to } => self.graph.connect(from, to),
            GraphOp::ConnectParam {
                from,
                node,
                param_index,
            } => self.graph.connect_param(from, node, param_index),
            GraphOp::DisconnectOutput { node, output_index } => {
                self.graph
                    .disconnect_all(node, output_index, &mut ctl.deletion_list)
            }
            GraphOp::Message { node, message } => {
                if let Some(entry) = self.graph.entry_mut(node) {
                    entry.processor.handle_message(message);
                }
            }
            GraphOp::FinishDeref { node, kind } => {
                self.graph
                    .deref_consequences(node, kind, &mut ctl.deletion_list)
            }
        }
    }

    /// Copy the destination's mixed input bus into the interleaved output.
    fn write_destination(&self, output: &mut [f32], frames: usize) {
        let out = &mut output[..frames * 2];

        let Some(entry) = self.graph.entry(self.destination) else {
            out.fill(0.0);
            return;
        };
        let Some(input) = entry.core.inputs.first() else {
            out.fill(0.0);
            return;
        };

        let bus = input.bus();
        if bus.is_silent() || self.shared.closed.load(Ordering::Acquire) {
            out.fill(0.0);
            return;
        }

        if bus.channel_count() == 1 {
            let mono = bus.channel(0);
            for (frame, &sample) in mono.iter().take(frames).enumerate() {
                out[frame * 2] = sample;
                out[frame * 2 + 1] = sample;
            }
        } else {
            let left = bus.channel(0);
            let right = bus.channel(1);
            for frame in 0..frames {
                out[frame * 2] = left[frame];
                out[frame * 2 + 1] = right[frame];
            }
        }
    }
}
