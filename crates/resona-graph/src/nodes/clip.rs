//! Clip node: per-sample waveshaping.
//!
//! Wraps [`ClipShape`] from the core crate. In `Clip` mode the `a`/`b`
//! parameters are the minimum and maximum thresholds; in `Tanh` mode `a` is
//! the output gain and `b` the input gain, with higher input gain driving
//! harder saturation.

use resona_core::{ClipMode, ClipShape};

use crate::context::{AsNode, AudioContext, NodeHandle};
use crate::error::GraphError;
use crate::node::{NodeKind, NodeMessage, ProcessIo, Processor, RenderContext};
use crate::param::{ParamDescriptor, ParamHandle};

const A: ParamDescriptor = ParamDescriptor {
    name: "a",
    default: -1.0,
    min: -100.0,
    max: 100.0,
};

const B: ParamDescriptor = ParamDescriptor {
    name: "b",
    default: 1.0,
    min: -100.0,
    max: 100.0,
};

/// Control-side handle to a clip node.
pub struct ClipNode {
    handle: NodeHandle,
    context: AudioContext,
    a: ParamHandle,
    b: ParamHandle,
}

impl ClipNode {
    pub fn set_mode(&self, mode: ClipMode) -> Result<(), GraphError> {
        self.context
            .send_message(self.handle.id, NodeMessage::SetClipMode(mode))
    }

    /// Minimum threshold (`Clip` mode) or output gain (`Tanh` mode).
    pub fn a(&self) -> &ParamHandle {
        &self.a
    }

    /// Maximum threshold (`Clip` mode) or input gain (`Tanh` mode).
    pub fn b(&self) -> &ParamHandle {
        &self.b
    }
}

impl AsNode for ClipNode {
    fn node(&self) -> &NodeHandle {
        &self.handle
    }
}

impl AudioContext {
    pub fn create_clip(&self, mode: ClipMode) -> Result<ClipNode, GraphError> {
        let (handle, mut params) = self.register_node(
            NodeKind::Clip,
            Box::new(ClipProcessor {
                shape: ClipShape::new(mode),
            }),
            1,
            &[1],
            &[A, B],
        )?;
        let a = params.remove(0);
        let b = params.remove(0);
        Ok(ClipNode {
            handle,
            context: self.clone(),
            a,
            b,
        })
    }
}

pub(crate) struct ClipProcessor {
    shape: ClipShape,
}

impl Processor for ClipProcessor {
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext) {
        let input = &io.inputs[0];
        let output = &mut io.outputs[0];
        let a = io.params[0].final_value();
        let b = io.params[1].final_value();

        let channels = output.bus().channel_count().min(input.bus().channel_count());
        for c in 0..channels {
            for f in 0..ctx.frames {
                let sample = self.shape.process(input.bus().channel(c)[f], a, b);
                output.bus_mut().channel_mut(c)[f] = sample;
            }
        }
    }

    fn preferred_output_channels(&self, input_channels: usize) -> Option<usize> {
        Some(input_channels)
    }

    fn handle_message(&mut self, message: NodeMessage) {
        if let NodeMessage::SetClipMode(mode) = message {
            self.shape.set_mode(mode);
        }
    }
}
