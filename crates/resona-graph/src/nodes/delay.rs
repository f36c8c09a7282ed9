//! Delay line node.
//!
//! Delays its input by `delayTime` seconds (up to a fixed maximum chosen at
//! creation) with linear interpolation between taps. A delay line keeps
//! ringing for up to its maximum delay after the input stops, so the node
//! reports that as its tail time — which both holds off silence propagation
//! and exempts the node from output disabling while it drains.

use crate::context::{AsNode, AudioContext, NodeHandle};
use crate::error::GraphError;
use crate::node::{NodeKind, ProcessIo, Processor, RenderContext};
use crate::param::{ParamDescriptor, ParamHandle};

/// Control-side handle to a delay node.
pub struct DelayNode {
    handle: NodeHandle,
    delay_time: ParamHandle,
}

impl DelayNode {
    /// The `delayTime` parameter, in seconds.
    pub fn delay_time(&self) -> &ParamHandle {
        &self.delay_time
    }
}

impl AsNode for DelayNode {
    fn node(&self) -> &NodeHandle {
        &self.handle
    }
}

impl AudioContext {
    /// Create a delay node able to delay up to `max_delay_seconds`.
    pub fn create_delay(&self, max_delay_seconds: f64) -> Result<DelayNode, GraphError> {
        let max_delay_seconds = max_delay_seconds.max(0.0);
        let descriptor = ParamDescriptor {
            name: "delayTime",
            default: 0.0,
            min: 0.0,
            max: max_delay_seconds as f32,
        };
        let max_frames = (max_delay_seconds * f64::from(self.sample_rate())).ceil() as usize + 2;

        let (handle, mut params) = self.register_node(
            NodeKind::Delay,
            Box::new(DelayProcessor {
                rings: vec![DelayRing::new(max_frames)],
                max_frames,
                max_delay_seconds,
            }),
            1,
            &[1],
            &[descriptor],
        )?;
        Ok(DelayNode {
            handle,
            delay_time: params.remove(0),
        })
    }
}

struct DelayRing {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayRing {
    fn new(frames: usize) -> Self {
        Self {
            buffer: vec![0.0; frames.max(2)],
            write_pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, delay_frames: f32) -> f32 {
        let len = self.buffer.len();
        self.buffer[self.write_pos] = input;

        let read = self.write_pos as f32 + len as f32 - delay_frames;
        let index = read as usize;
        let frac = read - index as f32;
        let a = self.buffer[index % len];
        let b = self.buffer[(index + 1) % len];

        self.write_pos = (self.write_pos + 1) % len;
        a + (b - a) * frac
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

pub(crate) struct DelayProcessor {
    rings: Vec<DelayRing>,
    max_frames: usize,
    max_delay_seconds: f64,
}

impl Processor for DelayProcessor {
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext) {
        let input = &io.inputs[0];
        let output = &mut io.outputs[0];

        let delay_seconds = io.params[0].final_value();
        let delay_frames =
            (delay_seconds * ctx.sample_rate).clamp(0.0, (self.max_frames - 2) as f32);

        let channels = output
            .bus()
            .channel_count()
            .min(input.bus().channel_count())
            .min(self.rings.len());

        for c in 0..channels {
            let ring = &mut self.rings[c];
            for f in 0..ctx.frames {
                let sample = ring.process(input.bus().channel(c)[f], delay_frames);
                output.bus_mut().channel_mut(c)[f] = sample;
            }
        }
    }

    fn reset(&mut self) {
        for ring in &mut self.rings {
            ring.clear();
        }
    }

    fn tail_time(&self) -> f64 {
        self.max_delay_seconds
    }

    fn preferred_output_channels(&self, input_channels: usize) -> Option<usize> {
        Some(input_channels)
    }

    fn on_output_channels_changed(&mut self, channels: usize) {
        // Runs at a graph-lock sync point; growing here keeps allocation
        // off the steady-state render path.
        while self.rings.len() < channels {
            self.rings.push(DelayRing::new(self.max_frames));
        }
    }
}
