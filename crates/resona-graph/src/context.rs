//! The audio context: control-thread handle, graph lock and node registry.
//!
//! [`AudioContext::new`] returns a pair: the cloneable control-side context
//! and the [`Renderer`](crate::render::Renderer), which owns the node arena
//! and belongs on the audio thread. All topology mutation flows through the
//! context as validated operations appended to the queue behind the graph
//! lock; the renderer applies them at the next quantum boundary where its
//! try-lock succeeds.
//!
//! Lock discipline: the control thread always locks blockingly and never
//! holds the lock while calling user code; the audio thread only ever
//! try-locks. Reference counts are atomics touched from both threads;
//! their structural consequences run only under the lock.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{GraphError, PortKind};
use crate::graph::{Graph, InputRef, NodeEntry, NodeId, OutputRef};
use crate::input::NodeInput;
use crate::listener::{AudioListener, ListenerShared};
use crate::node::{NodeCore, NodeKind, NodeMessage, Processor, RefCounts, RefKind};
use crate::nodes::destination::DestinationProcessor;
use crate::nodes::panner::PanningModel;
use crate::output::NodeOutput;
use crate::param::{ParamDescriptor, ParamHandle, ParamShared, ParamState};
use crate::render::Renderer;

/// Default frames per render quantum.
pub const RENDER_QUANTUM_FRAMES: usize = 128;

/// Context construction options.
#[derive(Clone, Copy, Debug)]
pub struct ContextOptions {
    pub sample_rate: f32,
    /// Frames per render quantum. Every bus in the graph holds exactly one
    /// quantum.
    pub quantum_frames: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            quantum_frames: RENDER_QUANTUM_FRAMES,
        }
    }
}

impl ContextOptions {
    pub fn with_sample_rate(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }
}

/// A topology operation, validated control-side and applied by the renderer
/// at the next sync point.
pub(crate) enum GraphOp {
    AddNode { id: NodeId, entry: NodeEntry },
    Connect { from: OutputRef, to: InputRef },
    ConnectParam { from: OutputRef, node: NodeId, param_index: usize },
    DisconnectOutput { node: NodeId, output_index: usize },
    Message { node: NodeId, message: NodeMessage },
    /// Complete a deref whose atomic decrement already happened.
    FinishDeref { node: NodeId, kind: RefKind },
}

/// Control-side record of a live node: everything needed to validate
/// operations without touching the arena.
pub(crate) struct ControlRecord {
    pub(crate) kind: NodeKind,
    pub(crate) refs: Arc<RefCounts>,
    pub(crate) input_count: usize,
    pub(crate) output_count: usize,
    pub(crate) panner_model: Option<PanningModel>,
    pub(crate) alive: bool,
}

/// Everything behind the graph lock.
pub(crate) struct ControlState {
    pub(crate) ops: Vec<GraphOp>,
    pub(crate) registry: Vec<Option<ControlRecord>>,
    /// Nodes whose both ref counts reached zero; the renderer unlinks them
    /// from the arena at its next sync.
    pub(crate) deletion_list: Vec<NodeId>,
    /// Unlinked node storage awaiting the control-side sweep, so boxes are
    /// freed off the audio thread.
    pub(crate) garbage: Vec<NodeEntry>,
}

pub(crate) struct ContextShared {
    pub(crate) sample_rate: f32,
    pub(crate) quantum_frames: usize,
    pub(crate) current_frame: AtomicU64,
    /// Bumped on every successful connect; spatializers use it to detect
    /// topology changes.
    pub(crate) connection_count: AtomicU64,
    pub(crate) closed: AtomicBool,
    pub(crate) listener: ListenerShared,
    next_node_id: AtomicU32,
    /// The graph lock.
    pub(crate) ctl: Mutex<ControlState>,
}

/// Cloneable control-thread handle to one audio graph.
#[derive(Clone)]
pub struct AudioContext {
    pub(crate) shared: Arc<ContextShared>,
    destination: NodeId,
}

impl AudioContext {
    /// Create a context and its renderer.
    ///
    /// The context stays with the control thread; the renderer moves to
    /// whatever thread drives output. The destination node exists from
    /// birth and is owned by the context.
    pub fn new(options: ContextOptions) -> (AudioContext, Renderer) {
        let shared = Arc::new(ContextShared {
            sample_rate: options.sample_rate,
            quantum_frames: options.quantum_frames,
            current_frame: AtomicU64::new(0),
            connection_count: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            listener: ListenerShared::new(),
            next_node_id: AtomicU32::new(0),
            ctl: Mutex::new(ControlState {
                ops: Vec::new(),
                registry: Vec::new(),
                deletion_list: Vec::new(),
                garbage: Vec::new(),
            }),
        });

        let mut graph = Graph::new(options.quantum_frames);

        // The destination is created directly rather than through the op
        // queue: it must exist before the first quantum.
        let destination = NodeId(shared.next_node_id.fetch_add(1, Ordering::Relaxed));
        let refs = RefCounts::new();
        let mut core = NodeCore::new(NodeKind::Destination, options.sample_rate, Arc::clone(&refs));
        core.inputs.push(NodeInput::new(options.quantum_frames));
        graph.add_node(
            destination,
            NodeEntry {
                core,
                processor: Box::new(DestinationProcessor),
                finished_reported: false,
            },
        );
        shared.ctl.lock().registry.push(Some(ControlRecord {
            kind: NodeKind::Destination,
            refs,
            input_count: 1,
            output_count: 0,
            panner_model: None,
            alive: true,
        }));

        let context = AudioContext {
            shared: Arc::clone(&shared),
            destination,
        };
        let renderer = Renderer::new(graph, shared, destination);
        (context, renderer)
    }

    pub fn sample_rate(&self) -> f32 {
        self.shared.sample_rate
    }

    pub fn quantum_frames(&self) -> usize {
        self.shared.quantum_frames
    }

    /// Context time in seconds: rendered frames over sample rate.
    pub fn current_time(&self) -> f64 {
        self.shared.current_frame.load(Ordering::Acquire) as f64 / f64::from(self.shared.sample_rate)
    }

    /// Monotonic count of successful connects.
    pub fn connection_count(&self) -> u64 {
        self.shared.connection_count.load(Ordering::Acquire)
    }

    /// Handle to the destination node (input index 0 is the mix point).
    pub fn destination(&self) -> NodeHandle {
        let refs = {
            let ctl = self.shared.ctl.lock();
            let record = ctl.registry[self.destination.index()]
                .as_ref()
                .expect("destination record always exists");
            Arc::clone(&record.refs)
        };
        refs.increment(RefKind::Normal);
        NodeHandle {
            shared: Arc::clone(&self.shared),
            id: self.destination,
            refs,
        }
    }

    /// The context's listener.
    pub fn listener(&self) -> AudioListener<'_> {
        AudioListener {
            shared: &self.shared.listener,
        }
    }

    /// Close the context: all further topology operations fail with
    /// [`GraphError::ContextClosed`] and rendering emits silence.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        debug!("audio context closed");
    }

    // --- Topology operations ---

    /// Connect `source`'s output to `dest`'s input.
    pub fn connect(
        &self,
        source: &impl AsNode,
        dest: &impl AsNode,
        output_index: usize,
        input_index: usize,
    ) -> Result<(), GraphError> {
        let source = source.node();
        let dest = dest.node();
        self.check_open()?;
        if !Arc::ptr_eq(&self.shared, &source.shared) || !Arc::ptr_eq(&self.shared, &dest.shared) {
            return Err(GraphError::CrossContext);
        }

        let mut ctl = self.shared.ctl.lock();
        check_port(&ctl, source.id, PortKind::Output, output_index)?;
        check_port(&ctl, dest.id, PortKind::Input, input_index)?;

        ctl.ops.push(GraphOp::Connect {
            from: OutputRef {
                node: source.id,
                index: output_index,
            },
            to: InputRef {
                node: dest.id,
                index: input_index,
            },
        });
        drop(ctl);

        // Let the spatializers know a connection has been made.
        self.shared.connection_count.fetch_add(1, Ordering::AcqRel);
        debug!(source = %source.id, dest = %dest.id, output_index, input_index, "connect");
        Ok(())
    }

    /// Connect `source`'s output to a parameter as an audio-rate modulator.
    pub fn connect_param(
        &self,
        source: &impl AsNode,
        param: &ParamHandle,
        output_index: usize,
    ) -> Result<(), GraphError> {
        let source = source.node();
        self.check_open()?;
        if !Arc::ptr_eq(&self.shared, &source.shared) || !Arc::ptr_eq(&self.shared, &param.context)
        {
            return Err(GraphError::CrossContext);
        }

        let mut ctl = self.shared.ctl.lock();
        check_port(&ctl, source.id, PortKind::Output, output_index)?;

        ctl.ops.push(GraphOp::ConnectParam {
            from: OutputRef {
                node: source.id,
                index: output_index,
            },
            node: param.node,
            param_index: param.index,
        });
        drop(ctl);

        debug!(source = %source.id, param = param.descriptor().name, "connect param");
        Ok(())
    }

    /// Remove all connections leaving `source`'s output.
    pub fn disconnect(&self, source: &impl AsNode, output_index: usize) -> Result<(), GraphError> {
        let source = source.node();
        self.check_open()?;

        let mut ctl = self.shared.ctl.lock();
        check_port(&ctl, source.id, PortKind::Output, output_index)?;

        ctl.ops.push(GraphOp::DisconnectOutput {
            node: source.id,
            output_index,
        });
        drop(ctl);

        debug!(source = %source.id, output_index, "disconnect");
        Ok(())
    }

    /// Drop freed node storage and report the nodes still alive.
    ///
    /// Nodes whose reference counts both reached zero are unlinked by the
    /// renderer, but their storage is handed back here so deallocation
    /// happens on the control thread.
    pub fn sweep(&self) -> Vec<NodeId> {
        let garbage = {
            let mut ctl = self.shared.ctl.lock();
            std::mem::take(&mut ctl.garbage)
        };
        if !garbage.is_empty() {
            debug!(freed = garbage.len(), "swept deleted nodes");
        }
        // Dropping outside the lock: processor destructors are user code.
        drop(garbage);
        self.live_nodes()
    }

    /// The kind tag of a live node.
    pub fn node_kind(&self, node: NodeId) -> Option<NodeKind> {
        let ctl = self.shared.ctl.lock();
        ctl.registry
            .get(node.index())?
            .as_ref()
            .filter(|record| record.alive)
            .map(|record| record.kind)
    }

    /// Ids of nodes that currently exist (counting nodes whose creation is
    /// still queued).
    pub fn live_nodes(&self) -> Vec<NodeId> {
        let ctl = self.shared.ctl.lock();
        ctl.registry
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .filter(|record| record.alive)
                    .map(|_| NodeId(index as u32))
            })
            .collect()
    }

    /// Create a node from a user-supplied [`Processor`].
    ///
    /// `output_channels` has one entry per output port giving its initial
    /// channel count. The escape hatch for node types the crate does not
    /// ship.
    pub fn create_custom(
        &self,
        processor: Box<dyn Processor>,
        input_count: usize,
        output_channels: &[usize],
        params: &[ParamDescriptor],
    ) -> Result<(NodeHandle, Vec<ParamHandle>), GraphError> {
        self.register_node(NodeKind::Custom, processor, input_count, output_channels, params)
    }

    // --- Internal plumbing ---

    pub(crate) fn check_open(&self) -> Result<(), GraphError> {
        if self.shared.closed.load(Ordering::Acquire) {
            Err(GraphError::ContextClosed)
        } else {
            Ok(())
        }
    }

    /// Build a node control-side and queue its arena insertion. Buses are
    /// fully sized here so the renderer adopts them without allocating.
    pub(crate) fn register_node(
        &self,
        kind: NodeKind,
        processor: Box<dyn Processor>,
        input_count: usize,
        output_channels: &[usize],
        params: &[ParamDescriptor],
    ) -> Result<(NodeHandle, Vec<ParamHandle>), GraphError> {
        self.check_open()?;

        let frames = self.shared.quantum_frames;
        let sample_rate = self.shared.sample_rate;
        let refs = RefCounts::new();

        let mut core = NodeCore::new(kind, sample_rate, Arc::clone(&refs));
        for _ in 0..input_count {
            core.inputs.push(NodeInput::new(frames));
        }
        for &channels in output_channels {
            core.outputs.push(NodeOutput::new(channels, frames));
        }

        let mut param_handles = Vec::with_capacity(params.len());
        let id;
        {
            let mut ctl = self.shared.ctl.lock();
            id = NodeId(self.shared.next_node_id.fetch_add(1, Ordering::Relaxed));

            for descriptor in params {
                let shared = ParamShared::new(*descriptor);
                core.params
                    .push(ParamState::new(Arc::clone(&shared), sample_rate, frames));
                param_handles.push(ParamHandle {
                    shared,
                    context: Arc::clone(&self.shared),
                    node: id,
                    index: param_handles.len(),
                });
            }

            let index = id.index();
            if index >= ctl.registry.len() {
                ctl.registry.resize_with(index + 1, || None);
            }
            ctl.registry[index] = Some(ControlRecord {
                kind,
                refs: Arc::clone(&refs),
                input_count,
                output_count: output_channels.len(),
                panner_model: if kind == NodeKind::Panner {
                    Some(PanningModel::Hrtf)
                } else {
                    None
                },
                alive: true,
            });

            ctl.ops.push(GraphOp::AddNode {
                id,
                entry: NodeEntry {
                    core,
                    processor,
                    finished_reported: false,
                },
            });
        }

        debug!(node = %id, ?kind, "created node");
        Ok((
            NodeHandle {
                shared: Arc::clone(&self.shared),
                id,
                refs,
            },
            param_handles,
        ))
    }

    /// Queue a control message for a node's processor.
    pub(crate) fn send_message(&self, node: NodeId, message: NodeMessage) -> Result<(), GraphError> {
        self.check_open()?;
        self.shared
            .ctl
            .lock()
            .ops
            .push(GraphOp::Message { node, message });
        Ok(())
    }

    /// Take an extra normal reference on behalf of a playing source.
    pub(crate) fn take_playing_ref(&self, node: &NodeHandle) {
        node.refs.increment(RefKind::Normal);
    }

    pub(crate) fn registry_record<R>(
        &self,
        node: NodeId,
        read: impl FnOnce(&mut ControlRecord) -> R,
    ) -> Option<R> {
        let mut ctl = self.shared.ctl.lock();
        ctl.registry.get_mut(node.index())?.as_mut().map(read)
    }
}

fn check_port(
    ctl: &ControlState,
    node: NodeId,
    kind: PortKind,
    index: usize,
) -> Result<(), GraphError> {
    let record = ctl
        .registry
        .get(node.index())
        .and_then(|slot| slot.as_ref())
        .ok_or(GraphError::CrossContext)?;
    let count = match kind {
        PortKind::Input => record.input_count,
        PortKind::Output => record.output_count,
    };
    if index >= count {
        return Err(GraphError::IndexOutOfRange { kind, index, count });
    }
    Ok(())
}

/// Untyped handle to a node. Each clone holds one normal reference;
/// dropping the last clone releases the node's logical existence (it keeps
/// rendering only while inbound connections hold connection references).
pub struct NodeHandle {
    pub(crate) shared: Arc<ContextShared>,
    pub(crate) id: NodeId,
    pub(crate) refs: Arc<RefCounts>,
}

impl NodeHandle {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Current reference counts, for diagnostics and tests.
    pub fn ref_counts(&self) -> (i32, i32) {
        (self.refs.normal(), self.refs.connection())
    }
}

impl Clone for NodeHandle {
    fn clone(&self) -> Self {
        self.refs.increment(RefKind::Normal);
        Self {
            shared: Arc::clone(&self.shared),
            id: self.id,
            refs: Arc::clone(&self.refs),
        }
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        // The decrement is lock-free; the structural consequences are
        // completed under the graph lock at the renderer's next sync.
        self.refs.decrement(RefKind::Normal);
        self.shared.ctl.lock().ops.push(GraphOp::FinishDeref {
            node: self.id,
            kind: RefKind::Normal,
        });
    }
}

/// Anything that can stand in for a node in topology operations.
pub trait AsNode {
    fn node(&self) -> &NodeHandle;
}

impl AsNode for NodeHandle {
    fn node(&self) -> &NodeHandle {
        self
    }
}
