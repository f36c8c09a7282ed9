//! Sine oscillator source.
//!
//! Mono sine generator with `frequency` and `detune` parameters, both
//! modulatable at audio rate — the standard way to exercise sample-accurate
//! parameter ramps. Runs from creation; a source generates signal out of
//! nothing, so it never propagates silence.

use std::f32::consts::TAU;

use crate::context::{AsNode, AudioContext, NodeHandle};
use crate::error::GraphError;
use crate::node::{NodeKind, ProcessIo, Processor, RenderContext};
use crate::param::{ParamDescriptor, ParamHandle};

const FREQUENCY: ParamDescriptor = ParamDescriptor {
    name: "frequency",
    default: 440.0,
    min: 0.0,
    max: 22050.0,
};

const DETUNE: ParamDescriptor = ParamDescriptor {
    name: "detune",
    default: 0.0,
    min: -1200.0,
    max: 1200.0,
};

/// Control-side handle to an oscillator node.
pub struct OscillatorNode {
    handle: NodeHandle,
    frequency: ParamHandle,
    detune: ParamHandle,
}

impl OscillatorNode {
    /// Frequency in Hz.
    pub fn frequency(&self) -> &ParamHandle {
        &self.frequency
    }

    /// Detune in cents.
    pub fn detune(&self) -> &ParamHandle {
        &self.detune
    }
}

impl AsNode for OscillatorNode {
    fn node(&self) -> &NodeHandle {
        &self.handle
    }
}

impl AudioContext {
    pub fn create_oscillator(&self) -> Result<OscillatorNode, GraphError> {
        let (handle, mut params) = self.register_node(
            NodeKind::Oscillator,
            Box::new(OscillatorProcessor { phase: 0.0 }),
            0,
            &[1],
            &[FREQUENCY, DETUNE],
        )?;
        let frequency = params.remove(0);
        let detune = params.remove(0);
        Ok(OscillatorNode {
            handle,
            frequency,
            detune,
        })
    }
}

pub(crate) struct OscillatorProcessor {
    phase: f32,
}

impl Processor for OscillatorProcessor {
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext) {
        let frequency = &io.params[0];
        let detune = &io.params[1];
        let sample_accurate = frequency.is_sample_accurate() || detune.is_sample_accurate();

        let samples = io.outputs[0].bus_mut().channel_mut(0);

        if sample_accurate {
            let freq_values = frequency.values();
            let detune_values = detune.values();
            for f in 0..ctx.frames {
                let hz = freq_values[f] * (detune_values[f] / 1200.0).exp2();
                samples[f] = self.phase.sin();
                self.phase += TAU * hz / ctx.sample_rate;
            }
        } else {
            let hz = frequency.final_value() * (detune.final_value() / 1200.0).exp2();
            let increment = TAU * hz / ctx.sample_rate;
            for sample in samples.iter_mut().take(ctx.frames) {
                *sample = self.phase.sin();
                self.phase += increment;
            }
        }

        self.phase %= TAU;
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn propagates_silence(&self, _last_non_silent_time: f64, _current_time: f64) -> bool {
        false
    }
}
