//! Node base: shared state, the processor trait, and per-quantum dispatch
//! support.
//!
//! Every node in the arena is a [`NodeCore`] (ports, parameters, lifetime
//! state — identical across node types) paired with a boxed [`Processor`]
//! (the per-type render behavior). The dispatch loop in
//! [`graph`](crate::graph) owns the protocol — pull inputs, materialize
//! parameters, decide silence, call [`Processor::process`] — so individual
//! processors only ever see their own ports.
//!
//! ## Lifetime
//!
//! Two reference counts with distinct meanings govern a node's life:
//!
//! - **normal**: held by host-side handles. Purely about logical existence.
//! - **connection**: one per inbound graph connection. Governs whether the
//!   node is actively rendering; when the last connection goes away the
//!   node's outputs are disabled (made dormant) so rendering cost drops to
//!   zero while the host still holds a handle.
//!
//! Both counts are atomics because they are touched from both threads; the
//! structural consequences of a count reaching zero run only while the
//! graph lock is held.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use resona_core::{ClipMode, DistanceModel, SpatialPanner, Vec3};

use crate::input::NodeInput;
use crate::listener::ListenerSnapshot;
use crate::nodes::panner::PanningModel;
use crate::output::NodeOutput;
use crate::param::{DopplerHandle, ParamState};

/// Node type tag. Drives nothing in the hot path — dispatch is through the
/// processor — but names nodes in logs and lets hosts introspect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Destination,
    BufferSource,
    Oscillator,
    Gain,
    Delay,
    Clip,
    Panner,
    Custom,
}

/// The two reference-count flavors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefKind {
    Normal,
    Connection,
}

/// Atomic reference counts shared between host handles, the control
/// registry and the arena entry.
pub struct RefCounts {
    normal: AtomicI32,
    connection: AtomicI32,
}

impl RefCounts {
    /// Nodes are born with one normal reference: the creating host handle.
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            normal: AtomicI32::new(1),
            connection: AtomicI32::new(0),
        })
    }

    #[inline]
    pub(crate) fn increment(&self, kind: RefKind) {
        match kind {
            RefKind::Normal => self.normal.fetch_add(1, Ordering::AcqRel),
            RefKind::Connection => self.connection.fetch_add(1, Ordering::AcqRel),
        };
    }

    #[inline]
    pub(crate) fn decrement(&self, kind: RefKind) {
        let previous = match kind {
            RefKind::Normal => self.normal.fetch_sub(1, Ordering::AcqRel),
            RefKind::Connection => self.connection.fetch_sub(1, Ordering::AcqRel),
        };
        debug_assert!(previous > 0, "{kind:?} ref count underflow");
    }

    #[inline]
    pub fn normal(&self) -> i32 {
        self.normal.load(Ordering::Acquire)
    }

    #[inline]
    pub fn connection(&self) -> i32 {
        self.connection.load(Ordering::Acquire)
    }
}

/// Shared per-node state, identical across node types.
pub(crate) struct NodeCore {
    pub(crate) kind: NodeKind,
    pub(crate) sample_rate: f32,
    pub(crate) initialized: bool,
    pub(crate) disabled: bool,
    pub(crate) marked_for_deletion: bool,
    pub(crate) refs: Arc<RefCounts>,
    /// Context time of the last completed dispatch; the fan-out guard.
    pub(crate) last_processing_time: f64,
    /// Context time just past the last quantum with non-silent input.
    pub(crate) last_non_silent_time: f64,
    pub(crate) inputs: Vec<NodeInput>,
    pub(crate) outputs: Vec<NodeOutput>,
    pub(crate) params: Vec<ParamState>,
}

impl NodeCore {
    pub(crate) fn new(kind: NodeKind, sample_rate: f32, refs: Arc<RefCounts>) -> Self {
        Self {
            kind,
            sample_rate,
            initialized: true,
            disabled: false,
            marked_for_deletion: false,
            refs,
            last_processing_time: -1.0,
            last_non_silent_time: -1.0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: Vec::new(),
        }
    }
}

/// Per-quantum information handed to every processor.
pub struct RenderContext {
    pub sample_rate: f32,
    pub frames: usize,
    /// Context time at the start of this quantum, in seconds.
    pub current_time: f64,
    /// Sample frame counter at the start of this quantum.
    pub current_frame: u64,
    pub listener: ListenerSnapshot,
}

/// A processor's view of its own ports for one `process` call.
pub struct ProcessIo<'a> {
    pub inputs: &'a [NodeInput],
    pub outputs: &'a mut [NodeOutput],
    pub params: &'a [ParamState],
}

/// Control messages delivered to a processor at graph-lock sync points.
///
/// Node-specific control state (positions, modes, buffers) travels as
/// messages through the operation queue rather than shared mutable state;
/// the processor applies them between quanta, never mid-block.
pub enum NodeMessage {
    SetPosition(Vec3),
    SetOrientation(Vec3),
    SetVelocity(Vec3),
    SetPannerStrategy {
        model: PanningModel,
        strategy: Box<dyn SpatialPanner + Send>,
    },
    SetDistanceModel(DistanceModel),
    SetClipMode(ClipMode),
    Start,
    SetLoop(bool),
}

/// Per-type node behavior.
///
/// The base dispatch handles everything protocol-level (fan-out
/// memoization, input pulling, silence propagation); implementors only
/// render their block and answer a few static questions. All methods other
/// than `process` have defaults, so a minimal source or effect implements
/// exactly one method.
pub trait Processor: Send {
    /// Render one quantum. Inputs are pulled and parameter blocks
    /// materialized before this is called; outputs' silent flags are cleared
    /// after it returns.
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext);

    /// Clear internal DSP state (delay lines, phase, ramp history).
    fn reset(&mut self) {}

    /// Seconds the node may keep emitting after its inputs go silent.
    /// Nodes with a non-zero tail are exempt from output disabling.
    fn tail_time(&self) -> f64 {
        0.0
    }

    /// Seconds of delay the node introduces from input to output.
    fn latency_time(&self) -> f64 {
        0.0
    }

    /// Whether silent inputs produce silent output right now.
    ///
    /// The default is the tail-time rule. Sources override this: while
    /// playing they generate signal out of nothing.
    fn propagates_silence(&self, last_non_silent_time: f64, current_time: f64) -> bool {
        last_non_silent_time + self.latency_time() + self.tail_time() < current_time
    }

    /// Desired channel count for output 0 given the negotiated input
    /// channel count. `None` keeps the output's count fixed.
    fn preferred_output_channels(&self, _input_channels: usize) -> Option<usize> {
        None
    }

    /// Notification that output 0's channel count changed during
    /// negotiation. Runs at a graph-lock sync point, so processors may
    /// grow per-channel state here.
    fn on_output_channels_changed(&mut self, _channels: usize) {}

    /// Apply a control message. Runs at a graph-lock sync point.
    fn handle_message(&mut self, _message: NodeMessage) {}

    /// A spatializer's published doppler ratio, if this node is one.
    fn doppler_source(&self) -> Option<DopplerHandle> {
        None
    }

    /// Called on nodes discovered upstream of a spatializer so they can
    /// apply its doppler pitch ratio. Default: not a source, ignore.
    fn set_doppler(&mut self, _handle: DopplerHandle) {}

    /// Whether this node wants an upstream source scan because the graph
    /// changed. Only spatializers return true; `connection_count` lets the
    /// implementation remember what it last saw.
    fn wants_source_scan(&mut self, _connection_count: u64) -> bool {
        false
    }

    /// True once a finite source has played to completion. The renderer
    /// releases the playing reference through the deferred-deref queue.
    fn finished(&self) -> bool {
        false
    }
}
