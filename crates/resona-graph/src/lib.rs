//! Resona Graph - pull-based real-time audio processing graph runtime
//!
//! Client code builds a directed graph of processing nodes (sources,
//! effects, a spatializer, a destination); the engine pulls audio from the
//! destination in fixed-size quanta at a constant sample rate and produces
//! a continuous, glitch-free stream.
//!
//! # Architecture
//!
//! The runtime is split in two at construction:
//!
//! - [`AudioContext`] — the cloneable control-thread handle. Creates nodes,
//!   connects and disconnects them, assigns parameters, moves the listener.
//!   Topology operations validate synchronously and queue behind the graph
//!   lock.
//! - [`Renderer`] — owns the node arena and belongs on the audio thread.
//!   Each [`render_quantum`](Renderer::render_quantum) try-locks the graph
//!   lock: on success it applies queued operations, completes deferred
//!   derefs and sweeps deletions; on contention it renders against the
//!   previous topology. A held lock never drops a quantum, and the render
//!   path itself never locks, blocks or allocates.
//!
//! Rendering is pull-based with fan-out memoization: a node processes at
//! most once per quantum however many consumers it has, and per-bus silent
//! flags let whole silent subgraphs skip their DSP.
//!
//! # Lifetime
//!
//! Nodes carry two reference counts: a *normal* count held by host handles
//! and a *connection* count held by inbound graph edges. A node with
//! handles but no live connections goes dormant (zero render cost); a node
//! with neither is unlinked by the renderer and freed on the next
//! control-side [`sweep`](AudioContext::sweep).
//!
//! # Example
//!
//! ```rust
//! use resona_graph::{AudioContext, ContextOptions};
//!
//! let (context, mut renderer) = AudioContext::new(ContextOptions::default());
//! let oscillator = context.create_oscillator()?;
//! let gain = context.create_gain()?;
//! gain.gain().set_value(0.5);
//!
//! context.connect(&oscillator, &gain, 0, 0)?;
//! context.connect(&gain, &context.destination(), 0, 0)?;
//!
//! let mut block = vec![0.0_f32; renderer.quantum_frames() * 2];
//! renderer.render_quantum(&mut block);
//! # Ok::<(), resona_graph::GraphError>(())
//! ```

pub mod bus;
pub mod context;
pub mod error;
pub mod graph;
pub mod input;
pub mod listener;
pub mod node;
pub mod nodes;
pub mod output;
pub mod param;
pub mod render;

pub use resona_core::{ClipMode, DistanceModel, Vec3};

pub use bus::AudioBus;
pub use context::{AsNode, AudioContext, ContextOptions, NodeHandle, RENDER_QUANTUM_FRAMES};
pub use error::{GraphError, PortKind};
pub use graph::NodeId;
pub use input::NodeInput;
pub use listener::{AudioListener, ListenerSnapshot};
pub use node::{NodeKind, ProcessIo, Processor, RenderContext};
pub use nodes::{
    BufferSourceNode, ClipNode, DelayNode, GainNode, OscillatorNode, PannerNode, PanningModel,
    SampleBuffer,
};
pub use output::NodeOutput;
pub use param::{DopplerHandle, ParamDescriptor, ParamHandle, ParamState};
pub use render::Renderer;
