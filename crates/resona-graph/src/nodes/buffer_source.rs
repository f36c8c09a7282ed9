//! Sample-buffer playback source.
//!
//! Plays a caller-provided [`SampleBuffer`] with linear-interpolation
//! resampling. The effective rate is `playback_rate × doppler ratio × (buffer
//! rate / context rate)`; the doppler ratio arrives through the handle a
//! spatializer registered after discovering this source upstream.
//!
//! Starting takes an extra playing reference on the node so it survives the
//! host dropping its handle mid-playback; when the buffer runs out the
//! renderer releases that reference through the deferred-deref queue.

use std::cell::Cell;
use std::sync::Arc;

use crate::context::{AsNode, AudioContext, NodeHandle};
use crate::error::GraphError;
use crate::node::{NodeKind, NodeMessage, ProcessIo, Processor, RenderContext};
use crate::param::{DopplerHandle, ParamDescriptor, ParamHandle};

const PLAYBACK_RATE: ParamDescriptor = ParamDescriptor {
    name: "playbackRate",
    default: 1.0,
    min: 0.0,
    max: 32.0,
};

/// Immutable multi-channel sample data shared with the render side.
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: f32,
}

impl SampleBuffer {
    /// Build from planar channel data. All channels must share a length.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: f32) -> Self {
        debug_assert!(
            channels.windows(2).all(|w| w[0].len() == w[1].len()),
            "channels must have equal length"
        );
        Self {
            channels,
            sample_rate,
        }
    }

    pub fn from_mono(samples: Vec<f32>, sample_rate: f32) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }
}

/// Control-side handle to a buffer playback source.
pub struct BufferSourceNode {
    handle: NodeHandle,
    context: AudioContext,
    playback_rate: ParamHandle,
    started: Cell<bool>,
}

impl BufferSourceNode {
    /// Begin playback at the next quantum. Idempotent.
    pub fn start(&self) -> Result<(), GraphError> {
        if self.started.get() {
            return Ok(());
        }
        self.context.check_open()?;
        // The playing reference keeps the node alive until the buffer ends,
        // independent of the host handle.
        self.context.take_playing_ref(&self.handle);
        self.context.send_message(self.handle.id, NodeMessage::Start)?;
        self.started.set(true);
        Ok(())
    }

    pub fn set_loop(&self, looping: bool) -> Result<(), GraphError> {
        self.context
            .send_message(self.handle.id, NodeMessage::SetLoop(looping))
    }

    pub fn playback_rate(&self) -> &ParamHandle {
        &self.playback_rate
    }
}

impl AsNode for BufferSourceNode {
    fn node(&self) -> &NodeHandle {
        &self.handle
    }
}

impl AudioContext {
    pub fn create_buffer_source(
        &self,
        buffer: Arc<SampleBuffer>,
    ) -> Result<BufferSourceNode, GraphError> {
        let channels = buffer.channel_count().max(1);
        let (handle, mut params) = self.register_node(
            NodeKind::BufferSource,
            Box::new(BufferSourceProcessor {
                buffer,
                position: 0.0,
                playing: false,
                looping: false,
                finished: false,
                doppler: None,
            }),
            0,
            &[channels],
            &[PLAYBACK_RATE],
        )?;
        Ok(BufferSourceNode {
            handle,
            context: self.clone(),
            playback_rate: params.remove(0),
            started: Cell::new(false),
        })
    }
}

pub(crate) struct BufferSourceProcessor {
    buffer: Arc<SampleBuffer>,
    position: f64,
    playing: bool,
    looping: bool,
    finished: bool,
    doppler: Option<DopplerHandle>,
}

impl Processor for BufferSourceProcessor {
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext) {
        let buffer_frames = self.buffer.frames();
        let output = io.outputs[0].bus_mut();

        if !self.playing || buffer_frames == 0 {
            output.zero();
            return;
        }

        let doppler = self.doppler.as_ref().map_or(1.0, DopplerHandle::rate);
        let rate = f64::from(io.params[0].final_value())
            * f64::from(doppler)
            * f64::from(self.buffer.sample_rate)
            / f64::from(ctx.sample_rate);

        let channel_count = output.channel_count().min(self.buffer.channel_count());

        for frame in 0..ctx.frames {
            if self.position >= buffer_frames as f64 {
                if self.looping {
                    self.position -= buffer_frames as f64;
                } else {
                    // Ran out: emit silence for the rest of the block and
                    // report completion.
                    for c in 0..channel_count {
                        for rest in frame..ctx.frames {
                            output.channel_mut(c)[rest] = 0.0;
                        }
                    }
                    self.playing = false;
                    self.finished = true;
                    return;
                }
            }

            let index = self.position as usize;
            let frac = (self.position - index as f64) as f32;
            for c in 0..channel_count {
                let samples = &self.buffer.channels[c];
                let a = samples[index.min(buffer_frames - 1)];
                let b = samples[(index + 1).min(buffer_frames - 1)];
                output.channel_mut(c)[frame] = a + (b - a) * frac;
            }
            self.position += rate;
        }
    }

    fn reset(&mut self) {
        self.position = 0.0;
    }

    fn propagates_silence(&self, _last_non_silent_time: f64, _current_time: f64) -> bool {
        !self.playing
    }

    fn handle_message(&mut self, message: NodeMessage) {
        match message {
            NodeMessage::Start => {
                if !self.finished {
                    self.playing = true;
                }
            }
            NodeMessage::SetLoop(looping) => self.looping = looping,
            _ => {}
        }
    }

    fn set_doppler(&mut self, handle: DopplerHandle) {
        self.doppler = Some(handle);
    }

    fn finished(&self) -> bool {
        self.finished
    }
}
