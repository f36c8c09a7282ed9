//! Gain node: scalar or audio-rate amplitude control.
//!
//! With a plain parameter value the gain is applied as a de-zippered ramp
//! per block; with a modulator connected to the `gain` parameter the ramp
//! is sample-accurate.

use crate::context::{AsNode, AudioContext, NodeHandle};
use crate::error::GraphError;
use crate::node::{NodeKind, ProcessIo, Processor, RenderContext};
use crate::param::{ParamDescriptor, ParamHandle};

const GAIN: ParamDescriptor = ParamDescriptor {
    name: "gain",
    default: 1.0,
    min: 0.0,
    max: 1.0,
};

/// Control-side handle to a gain node.
pub struct GainNode {
    handle: NodeHandle,
    gain: ParamHandle,
}

impl GainNode {
    /// The `gain` parameter.
    pub fn gain(&self) -> &ParamHandle {
        &self.gain
    }
}

impl AsNode for GainNode {
    fn node(&self) -> &NodeHandle {
        &self.handle
    }
}

impl AudioContext {
    pub fn create_gain(&self) -> Result<GainNode, GraphError> {
        let (handle, mut params) = self.register_node(
            NodeKind::Gain,
            Box::new(GainProcessor { last_gain: -1.0 }),
            1,
            &[1],
            &[GAIN],
        )?;
        Ok(GainNode {
            handle,
            gain: params.remove(0),
        })
    }
}

pub(crate) struct GainProcessor {
    /// De-zipper state; negative means snap on the first block.
    last_gain: f32,
}

impl Processor for GainProcessor {
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext) {
        let input = &io.inputs[0];
        let output = &mut io.outputs[0];
        let gain = &io.params[0];

        if gain.is_sample_accurate() {
            let values = gain.values();
            let channels = output.bus().channel_count().min(input.bus().channel_count());
            for c in 0..channels {
                for f in 0..ctx.frames {
                    let sample = input.bus().channel(c)[f] * values[f];
                    output.bus_mut().channel_mut(c)[f] = sample;
                }
            }
            self.last_gain = gain.final_value();
        } else {
            let target = gain.final_value();
            let (input_bus, output_bus) = (input.bus(), output.bus_mut());
            output_bus.copy_with_gain_from(input_bus, &mut self.last_gain, target);
        }
    }

    fn reset(&mut self) {
        self.last_gain = -1.0;
    }

    fn preferred_output_channels(&self, input_channels: usize) -> Option<usize> {
        Some(input_channels)
    }
}
