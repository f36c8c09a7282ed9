//! Spatializer node: position, orientation and velocity into a stereo image.
//!
//! The worked end-to-end exercise of the runtime: per block it derives
//! azimuth/elevation from the listener frame, renders through the active
//! panning strategy, publishes its Doppler ratio for the sources it
//! discovered upstream, and applies the combined distance/cone gain with
//! de-zippering (snapping on the first block after creation or reset).
//!
//! Failure semantics are the real-time contract: an uninitialized node, a
//! disconnected input or degenerate geometry produce silence for the
//! quantum, never an error.

use resona_core::{
    azimuth_elevation, doppler_rate, ConeEffect, DistanceEffect, DistanceModel, EqualPowerPanner,
    HrtfPanner, PanInput, SpatialPanner, Vec3,
};

use crate::context::{AsNode, AudioContext, NodeHandle};
use crate::error::GraphError;
use crate::node::{NodeKind, NodeMessage, ProcessIo, Processor, RenderContext};
use crate::param::DopplerHandle;

/// Spatialization strategy selection. The numeric values are the wire
/// protocol of `set_panning_model`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum PanningModel {
    EqualPower = 0,
    Hrtf = 1,
}

/// Wire value reserved for the unimplemented soundfield model.
const SOUNDFIELD: u16 = 2;

impl PanningModel {
    /// Decode a wire value. Soundfield is reserved and, like any unknown
    /// value, reports as unsupported.
    pub fn from_raw(raw: u16) -> Result<Self, GraphError> {
        match raw {
            0 => Ok(Self::EqualPower),
            1 => Ok(Self::Hrtf),
            SOUNDFIELD => Err(GraphError::NotSupported(raw)),
            _ => Err(GraphError::NotSupported(raw)),
        }
    }
}

/// Control-side handle to a spatializer node.
pub struct PannerNode {
    handle: NodeHandle,
    context: AudioContext,
}

impl PannerNode {
    /// Select the panning strategy. `EQUALPOWER = 0`, `HRTF = 1`;
    /// `SOUNDFIELD = 2` and anything else report as unsupported.
    ///
    /// Setting the model it already uses is a no-op and does not recreate
    /// the strategy.
    pub fn set_panning_model(&self, raw: u16) -> Result<(), GraphError> {
        let model = PanningModel::from_raw(raw)?;
        self.context.check_open()?;

        let unchanged = self
            .context
            .registry_record(self.handle.id, |record| {
                if record.panner_model == Some(model) {
                    true
                } else {
                    record.panner_model = Some(model);
                    false
                }
            })
            .unwrap_or(true);
        if unchanged {
            return Ok(());
        }

        let strategy: Box<dyn SpatialPanner + Send> = match model {
            PanningModel::EqualPower => Box::new(EqualPowerPanner::new()),
            PanningModel::Hrtf => Box::new(HrtfPanner::new(self.context.sample_rate())),
        };
        self.context.send_message(
            self.handle.id,
            NodeMessage::SetPannerStrategy { model, strategy },
        )
    }

    /// Select the distance attenuation model. `LINEAR = 0`, `INVERSE = 1`,
    /// `EXPONENTIAL = 2`; anything else reports as unsupported.
    pub fn set_distance_model(&self, raw: u16) -> Result<(), GraphError> {
        let model = DistanceModel::from_raw(raw).ok_or(GraphError::NotSupported(raw))?;
        self.context
            .send_message(self.handle.id, NodeMessage::SetDistanceModel(model))
    }

    pub fn set_position(&self, x: f32, y: f32, z: f32) -> Result<(), GraphError> {
        self.context
            .send_message(self.handle.id, NodeMessage::SetPosition(Vec3::new(x, y, z)))
    }

    /// The direction the source radiates toward, for the cone effect.
    pub fn set_orientation(&self, x: f32, y: f32, z: f32) -> Result<(), GraphError> {
        self.context.send_message(
            self.handle.id,
            NodeMessage::SetOrientation(Vec3::new(x, y, z)),
        )
    }

    pub fn set_velocity(&self, x: f32, y: f32, z: f32) -> Result<(), GraphError> {
        self.context
            .send_message(self.handle.id, NodeMessage::SetVelocity(Vec3::new(x, y, z)))
    }
}

impl AsNode for PannerNode {
    fn node(&self) -> &NodeHandle {
        &self.handle
    }
}

impl AudioContext {
    /// Create a spatializer. The default panning model is HRTF.
    pub fn create_panner(&self) -> Result<PannerNode, GraphError> {
        let (handle, _) = self.register_node(
            NodeKind::Panner,
            Box::new(PannerProcessor {
                strategy: Box::new(HrtfPanner::new(self.sample_rate())),
                position: Vec3::ZERO,
                orientation: Vec3::new(1.0, 0.0, 0.0),
                velocity: Vec3::ZERO,
                distance: DistanceEffect::default(),
                cone: ConeEffect::default(),
                last_gain: -1.0,
                doppler: DopplerHandle::new(),
                // Force a source scan on the first sync.
                last_connection_count: u64::MAX,
            }),
            1,
            &[2],
            &[],
        )?;
        Ok(PannerNode {
            handle,
            context: self.clone(),
        })
    }
}

pub(crate) struct PannerProcessor {
    strategy: Box<dyn SpatialPanner + Send>,
    position: Vec3,
    orientation: Vec3,
    velocity: Vec3,
    distance: DistanceEffect,
    cone: ConeEffect,
    /// Gain de-zipper state; negative means snap on the first block.
    last_gain: f32,
    doppler: DopplerHandle,
    last_connection_count: u64,
}

impl Processor for PannerProcessor {
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext) {
        let input = &io.inputs[0];
        let output = &mut io.outputs[0];

        if !input.is_connected() {
            output.bus_mut().zero();
            return;
        }

        let listener = &ctx.listener;
        let (azimuth, elevation) = azimuth_elevation(
            self.position,
            listener.position,
            listener.orientation,
            listener.up,
        );

        let source_bus = input.bus();
        let source = if source_bus.channel_count() >= 2 {
            PanInput::Stereo(source_bus.channel(0), source_bus.channel(1))
        } else {
            PanInput::Mono(source_bus.channel(0))
        };

        let output_bus = output.bus_mut();
        let Some((left, right)) = output_bus.stereo_pair_mut() else {
            return;
        };
        self.strategy
            .pan(azimuth as f32, elevation as f32, source, left, right);

        // Publish the pitch ratio for upstream sources.
        let rate = doppler_rate(
            self.position,
            self.velocity,
            listener.position,
            listener.velocity,
            f64::from(listener.doppler_factor),
            f64::from(listener.speed_of_sound),
        );
        self.doppler.set_rate(rate as f32);

        // Distance and cone attenuation, de-zippered together.
        let distance = f64::from(self.position.distance_to(listener.position));
        let total_gain = (self.distance.gain(distance)
            * self.cone.gain(self.position, self.orientation, listener.position))
            as f32;
        output_bus.apply_gain(&mut self.last_gain, total_gain);
    }

    fn reset(&mut self) {
        // Force the gain to snap on the next block.
        self.last_gain = -1.0;
        self.strategy.reset();
    }

    fn handle_message(&mut self, message: NodeMessage) {
        match message {
            NodeMessage::SetPosition(v) => self.position = v,
            NodeMessage::SetOrientation(v) => self.orientation = v,
            NodeMessage::SetVelocity(v) => self.velocity = v,
            NodeMessage::SetPannerStrategy { strategy, .. } => self.strategy = strategy,
            NodeMessage::SetDistanceModel(model) => self.distance.set_model(model),
            _ => {}
        }
    }

    fn doppler_source(&self) -> Option<DopplerHandle> {
        Some(self.doppler.clone())
    }

    fn wants_source_scan(&mut self, connection_count: u64) -> bool {
        if self.last_connection_count != connection_count {
            self.last_connection_count = connection_count;
            true
        } else {
            false
        }
    }
}
