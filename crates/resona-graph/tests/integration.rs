//! End-to-end render scenarios for the graph runtime.
//!
//! Each test builds a small graph, drives the renderer synchronously (on
//! the test thread the quantum-boundary try-lock always succeeds, so
//! queued topology lands before the block renders) and asserts on the
//! produced samples.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use resona_graph::{
    AudioContext, ContextOptions, GraphError, ProcessIo, Processor, RenderContext,
};

const SQRT_HALF: f32 = std::f32::consts::FRAC_1_SQRT_2;

fn small_context() -> (AudioContext, resona_graph::Renderer) {
    AudioContext::new(ContextOptions {
        sample_rate: 44100.0,
        quantum_frames: 4,
    })
}

/// Mono source emitting 0, 1, 2, … and counting its process invocations.
struct RampSource {
    next: f32,
    process_calls: Arc<AtomicUsize>,
}

impl Processor for RampSource {
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext) {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        let samples = io.outputs[0].bus_mut().channel_mut(0);
        for sample in samples.iter_mut().take(ctx.frames) {
            *sample = self.next;
            self.next += 1.0;
        }
    }

    fn propagates_silence(&self, _last_non_silent_time: f64, _current_time: f64) -> bool {
        false
    }
}

/// Mono source emitting a constant value forever.
struct DcSource(f32);

impl Processor for DcSource {
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext) {
        let samples = io.outputs[0].bus_mut().channel_mut(0);
        for sample in samples.iter_mut().take(ctx.frames) {
            *sample = self.0;
        }
    }

    fn propagates_silence(&self, _last_non_silent_time: f64, _current_time: f64) -> bool {
        false
    }
}

/// Source emitting exactly one non-silent quantum of ones, then silence.
struct OneQuantumSource {
    emitted: bool,
}

impl Processor for OneQuantumSource {
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext) {
        let samples = io.outputs[0].bus_mut().channel_mut(0);
        for sample in samples.iter_mut().take(ctx.frames) {
            *sample = 1.0;
        }
        self.emitted = true;
    }

    fn propagates_silence(&self, _last_non_silent_time: f64, _current_time: f64) -> bool {
        self.emitted
    }
}

/// Pass-through node recording its input's silent flag each quantum.
struct SilenceProbe {
    log: Arc<Mutex<Vec<bool>>>,
}

impl Processor for SilenceProbe {
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext) {
        self.log.lock().unwrap().push(io.inputs[0].bus().is_silent());
        let frames = ctx.frames;
        for f in 0..frames {
            let sample = io.inputs[0].bus().channel(0)[f];
            io.outputs[0].bus_mut().channel_mut(0)[f] = sample;
        }
    }

    fn propagates_silence(&self, _last_non_silent_time: f64, _current_time: f64) -> bool {
        false
    }
}

#[test]
fn fan_out_processes_source_exactly_once() {
    let (context, mut renderer) = small_context();
    let calls = Arc::new(AtomicUsize::new(0));
    let (source, _) = context
        .create_custom(
            Box::new(RampSource {
                next: 0.0,
                process_calls: Arc::clone(&calls),
            }),
            0,
            &[1],
            &[],
        )
        .unwrap();

    let a = context.create_gain().unwrap();
    let b = context.create_gain().unwrap();

    context.connect(&source, &a, 0, 0).unwrap();
    context.connect(&source, &b, 0, 0).unwrap();
    context.connect(&a, &context.destination(), 0, 0).unwrap();
    context.connect(&b, &context.destination(), 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);

    // Both paths carry the same ramp; the destination input sums them.
    assert_eq!(out, [0.0, 0.0, 2.0, 2.0, 4.0, 4.0, 6.0, 6.0]);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "fan-out must memoize");
}

#[test]
fn fan_out_consumers_see_identical_buses() {
    let (context, mut renderer) = small_context();
    let (source, _) = context
        .create_custom(
            Box::new(RampSource {
                next: 0.0,
                process_calls: Arc::new(AtomicUsize::new(0)),
            }),
            0,
            &[1],
            &[],
        )
        .unwrap();

    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));
    let (probe_a, _) = context
        .create_custom(
            Box::new(CaptureProbe {
                captured: Arc::clone(&first),
            }),
            1,
            &[1],
            &[],
        )
        .unwrap();
    let (probe_b, _) = context
        .create_custom(
            Box::new(CaptureProbe {
                captured: Arc::clone(&second),
            }),
            1,
            &[1],
            &[],
        )
        .unwrap();

    context.connect(&source, &probe_a, 0, 0).unwrap();
    context.connect(&source, &probe_b, 0, 0).unwrap();
    context.connect(&probe_a, &context.destination(), 0, 0).unwrap();
    context.connect(&probe_b, &context.destination(), 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);

    let first = first.lock().unwrap().clone();
    let second = second.lock().unwrap().clone();
    assert_eq!(first, second, "all consumers must read bit-identical samples");
    assert_eq!(first, vec![0.0, 1.0, 2.0, 3.0]);
}

/// Pass-through that keeps a copy of its input samples.
struct CaptureProbe {
    captured: Arc<Mutex<Vec<f32>>>,
}

impl Processor for CaptureProbe {
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext) {
        let mut captured = self.captured.lock().unwrap();
        captured.clear();
        captured.extend_from_slice(&io.inputs[0].bus().channel(0)[..ctx.frames]);
        for f in 0..ctx.frames {
            let sample = io.inputs[0].bus().channel(0)[f];
            io.outputs[0].bus_mut().channel_mut(0)[f] = sample;
        }
    }

    fn propagates_silence(&self, _last_non_silent_time: f64, _current_time: f64) -> bool {
        false
    }
}

#[test]
fn silence_propagates_once_past_the_tail() {
    let (context, mut renderer) = small_context();
    let (source, _) = context
        .create_custom(Box::new(OneQuantumSource { emitted: false }), 0, &[1], &[])
        .unwrap();
    let gain = context.create_gain().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let (probe, _) = context
        .create_custom(
            Box::new(SilenceProbe {
                log: Arc::clone(&log),
            }),
            1,
            &[1],
            &[],
        )
        .unwrap();

    context.connect(&source, &gain, 0, 0).unwrap();
    context.connect(&gain, &probe, 0, 0).unwrap();
    context.connect(&probe, &context.destination(), 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    for _ in 0..3 {
        renderer.render_quantum(&mut out);
    }

    // Quantum 0 is audible. Quantum 1 still renders (the last non-silent
    // time sits exactly on the boundary, and `propagates_silence` uses a
    // strict comparison) but carries zeros. By quantum 2 the gain node's
    // outputs are silent-flagged and the probe sees the flag.
    assert_eq!(*log.lock().unwrap(), vec![false, false, true]);
}

#[test]
fn gain_scales_and_dezippers() {
    let (context, mut renderer) = small_context();
    let (source, _) = context
        .create_custom(Box::new(DcSource(1.0)), 0, &[1], &[])
        .unwrap();
    let gain = context.create_gain().unwrap();
    gain.gain().set_value(0.5);

    context.connect(&source, &gain, 0, 0).unwrap();
    context.connect(&gain, &context.destination(), 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);
    // First block snaps to the assigned value.
    assert!((out[0] - 0.5).abs() < 1e-6);
    assert!((out[6] - 0.5).abs() < 1e-6);

    // A later change ramps instead of stepping.
    gain.gain().set_value(0.0);
    renderer.render_quantum(&mut out);
    assert!(out[0] > 0.0 && out[0] < 0.5);
    assert!(out[6] < out[0]);
}

#[test]
fn param_modulation_is_sample_accurate() {
    let (context, mut renderer) = small_context();
    let (source, _) = context
        .create_custom(Box::new(DcSource(1.0)), 0, &[1], &[])
        .unwrap();
    let (modulator, _) = context
        .create_custom(Box::new(DcSource(0.5)), 0, &[1], &[])
        .unwrap();
    let gain = context.create_gain().unwrap();
    gain.gain().set_value(0.25);

    context.connect(&source, &gain, 0, 0).unwrap();
    context.connect_param(&modulator, gain.gain(), 0).unwrap();
    context.connect(&gain, &context.destination(), 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);

    // Base 0.25 plus modulator 0.5, applied to a unit input.
    assert!((out[0] - 0.75).abs() < 1e-6, "got {}", out[0]);
    assert!((out[6] - 0.75).abs() < 1e-6);
}

#[test]
fn panner_centers_a_front_source() {
    let (context, mut renderer) = small_context();
    let (source, _) = context
        .create_custom(Box::new(DcSource(1.0)), 0, &[1], &[])
        .unwrap();
    let panner = context.create_panner().unwrap();
    panner.set_panning_model(0).unwrap();
    // Listener faces -z by default; straight ahead at the reference
    // distance.
    panner.set_position(0.0, 0.0, -1.0).unwrap();

    context.connect(&source, &panner, 0, 0).unwrap();
    context.connect(&panner, &context.destination(), 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);

    // Equal-power center: both channels at sqrt(1/2).
    assert!((out[0] - SQRT_HALF).abs() < 1e-4, "left {}", out[0]);
    assert!((out[1] - SQRT_HALF).abs() < 1e-4, "right {}", out[1]);
}

#[test]
fn panner_moves_a_source_hard_right() {
    let (context, mut renderer) = small_context();
    let (source, _) = context
        .create_custom(Box::new(DcSource(1.0)), 0, &[1], &[])
        .unwrap();
    let panner = context.create_panner().unwrap();
    panner.set_panning_model(0).unwrap();
    // On the listener's right (+x for the default frame).
    panner.set_position(1.0, 0.0, 0.0).unwrap();

    context.connect(&source, &panner, 0, 0).unwrap();
    context.connect(&panner, &context.destination(), 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);

    assert!(out[0].abs() < 1e-4, "left must be empty, got {}", out[0]);
    assert!((out[1] - 1.0).abs() < 1e-4, "right {}", out[1]);
}

#[test]
fn doppler_shifts_a_registered_source() {
    let (context, mut renderer) = AudioContext::new(ContextOptions {
        sample_rate: 44100.0,
        quantum_frames: 4,
    });
    context.listener().set_speed_of_sound(340.0);

    let ramp: Vec<f32> = (0..1000).map(|i| i as f32).collect();
    let buffer = Arc::new(resona_graph::SampleBuffer::from_mono(ramp, 44100.0));
    let source = context.create_buffer_source(buffer).unwrap();
    source.start().unwrap();

    let panner = context.create_panner().unwrap();
    panner.set_panning_model(0).unwrap();
    panner.set_position(0.0, 0.0, -1.0).unwrap();
    // Approaching the listener at 34 m/s: ratio 340 / (340 - 34).
    panner.set_velocity(0.0, 0.0, 34.0).unwrap();

    context.connect(&source, &panner, 0, 0).unwrap();
    context.connect(&panner, &context.destination(), 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    // Quantum 0: the panner publishes its ratio after the source has
    // already run, so playback is still at unity rate.
    renderer.render_quantum(&mut out);
    // Quantum 1: the source reads the published ratio.
    renderer.render_quantum(&mut out);

    let rate = 340.0 / (340.0 - 34.0);
    for frame in 0..4 {
        let expected = (4.0 + frame as f32 * rate) * SQRT_HALF;
        assert!(
            (out[frame * 2] - expected).abs() < 1e-2,
            "frame {frame}: got {}, expected {expected}",
            out[frame * 2]
        );
    }
}

#[test]
fn clip_node_thresholds_the_signal() {
    let (context, mut renderer) = small_context();
    let (source, _) = context
        .create_custom(Box::new(DcSource(3.0)), 0, &[1], &[])
        .unwrap();
    let clip = context.create_clip(resona_graph::ClipMode::Clip).unwrap();

    context.connect(&source, &clip, 0, 0).unwrap();
    context.connect(&clip, &context.destination(), 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);
    // Default thresholds are [-1, 1].
    assert_eq!(out[0], 1.0);
}

#[test]
fn delay_node_delays_by_whole_frames() {
    let (context, mut renderer) = small_context();
    let (source, _) = context
        .create_custom(
            Box::new(RampSource {
                next: 1.0,
                process_calls: Arc::new(AtomicUsize::new(0)),
            }),
            0,
            &[1],
            &[],
        )
        .unwrap();
    let delay = context.create_delay(1.0).unwrap();
    delay.delay_time().set_value(2.0 / 44100.0);

    context.connect(&source, &delay, 0, 0).unwrap();
    context.connect(&delay, &context.destination(), 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);

    // Two frames of initial silence, then the ramp starting at 1.
    assert_eq!(out[0], 0.0);
    assert_eq!(out[2], 0.0);
    assert!((out[4] - 1.0).abs() < 1e-4);
    assert!((out[6] - 2.0).abs() < 1e-4);
}

#[test]
fn topology_errors_surface_synchronously() {
    let (context, _renderer) = small_context();
    let (other_context, _other_renderer) = small_context();

    let gain = context.create_gain().unwrap();
    let foreign = other_context.create_gain().unwrap();

    // Out-of-range port indices.
    let err = context.connect(&gain, &context.destination(), 1, 0).unwrap_err();
    assert!(matches!(err, GraphError::IndexOutOfRange { .. }));
    let err = context.connect(&gain, &context.destination(), 0, 3).unwrap_err();
    assert!(matches!(err, GraphError::IndexOutOfRange { .. }));

    // Cross-context connection.
    let err = context.connect(&gain, &foreign, 0, 0).unwrap_err();
    assert_eq!(err, GraphError::CrossContext);

    // Closed context.
    context.close();
    let err = context.connect(&gain, &context.destination(), 0, 0).unwrap_err();
    assert_eq!(err, GraphError::ContextClosed);
}

#[test]
fn panner_model_wire_values() {
    let (context, _renderer) = small_context();
    let panner = context.create_panner().unwrap();

    assert!(panner.set_panning_model(0).is_ok());
    // Same model twice is idempotent.
    assert!(panner.set_panning_model(0).is_ok());
    assert!(panner.set_panning_model(1).is_ok());

    // Soundfield is reserved; everything else is unknown.
    assert_eq!(panner.set_panning_model(2), Err(GraphError::NotSupported(2)));
    assert_eq!(panner.set_panning_model(7), Err(GraphError::NotSupported(7)));

    assert!(panner.set_distance_model(0).is_ok());
    assert!(panner.set_distance_model(2).is_ok());
    assert_eq!(panner.set_distance_model(3), Err(GraphError::NotSupported(3)));
}

#[test]
fn render_continues_through_faults() {
    let (context, mut renderer) = small_context();
    // A panner with nothing connected must emit silence, not fail.
    let panner = context.create_panner().unwrap();
    context.connect(&panner, &context.destination(), 0, 0).unwrap();

    let mut out = [1.0_f32; 8];
    renderer.render_quantum(&mut out);
    assert_eq!(out, [0.0; 8]);
}
