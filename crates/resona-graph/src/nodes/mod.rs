//! Built-in node types.
//!
//! Each module pairs a control-side node struct (handles, parameter access,
//! node-specific setters) with its render-side processor. Constructors hang
//! off [`AudioContext`](crate::AudioContext) as `create_*` methods.

pub mod buffer_source;
pub mod clip;
pub mod delay;
pub(crate) mod destination;
pub mod gain;
pub mod oscillator;
pub mod panner;

pub use buffer_source::{BufferSourceNode, SampleBuffer};
pub use clip::ClipNode;
pub use delay::DelayNode;
pub use gain::GainNode;
pub use oscillator::OscillatorNode;
pub use panner::{PannerNode, PanningModel};
