//! Criterion benchmarks for the pull-based graph runtime.
//!
//! Measures runtime overhead independently of DSP cost using a trivial
//! constant source and unit gains. Two axes:
//!
//! - **Chain depth** — pull recursion and dispatch cost per node
//! - **Fan-out** — memoization cost when one source feeds many consumers
//!
//! Run with: `cargo bench -p resona-graph`
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use resona_graph::{
    AudioContext, ContextOptions, ProcessIo, Processor, RenderContext, Renderer,
};

const SAMPLE_RATE: f32 = 48000.0;

// ---------------------------------------------------------------------------
// Trivial source — isolates graph overhead from DSP cost
// ---------------------------------------------------------------------------

struct Dc(f32);

impl Processor for Dc {
    fn process(&mut self, io: ProcessIo<'_>, ctx: &RenderContext) {
        let samples = io.outputs[0].bus_mut().channel_mut(0);
        for sample in samples.iter_mut().take(ctx.frames) {
            *sample = self.0;
        }
    }

    fn propagates_silence(&self, _last: f64, _now: f64) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Graph constructors
// ---------------------------------------------------------------------------

/// Keeps the context and node handles alive for the benchmark's lifetime so
/// no deref bookkeeping runs inside the measured loop.
struct Fixture {
    renderer: Renderer,
    _context: AudioContext,
    _handles: Vec<resona_graph::GainNode>,
    _source: resona_graph::NodeHandle,
}

fn make_chain(depth: usize) -> Fixture {
    let (context, mut renderer) =
        AudioContext::new(ContextOptions::with_sample_rate(SAMPLE_RATE));
    let (source, _) = context
        .create_custom(Box::new(Dc(0.5)), 0, &[1], &[])
        .unwrap();

    let mut gains = Vec::new();
    for _ in 0..depth {
        gains.push(context.create_gain().unwrap());
    }
    context.connect(&source, &gains[0], 0, 0).unwrap();
    for pair in gains.windows(2) {
        context.connect(&pair[0], &pair[1], 0, 0).unwrap();
    }
    context
        .connect(gains.last().unwrap(), &context.destination(), 0, 0)
        .unwrap();

    // Flush topology so the benchmark loop measures steady-state rendering.
    let mut block = vec![0.0; renderer.quantum_frames() * 2];
    renderer.render_quantum(&mut block);
    Fixture {
        renderer,
        _context: context,
        _handles: gains,
        _source: source,
    }
}

fn make_fan_out(consumers: usize) -> Fixture {
    let (context, mut renderer) =
        AudioContext::new(ContextOptions::with_sample_rate(SAMPLE_RATE));
    let (source, _) = context
        .create_custom(Box::new(Dc(0.5)), 0, &[1], &[])
        .unwrap();

    let mut gains = Vec::new();
    for _ in 0..consumers {
        let gain = context.create_gain().unwrap();
        context.connect(&source, &gain, 0, 0).unwrap();
        context.connect(&gain, &context.destination(), 0, 0).unwrap();
        gains.push(gain);
    }

    let mut block = vec![0.0; renderer.quantum_frames() * 2];
    renderer.render_quantum(&mut block);
    Fixture {
        renderer,
        _context: context,
        _handles: gains,
        _source: source,
    }
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_chain_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/chain");
    for depth in [1usize, 4, 16, 64] {
        let mut fixture = make_chain(depth);
        let mut block = vec![0.0_f32; fixture.renderer.quantum_frames() * 2];
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                fixture.renderer.render_quantum(black_box(&mut block));
            });
        });
    }
    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/fan_out");
    for consumers in [2usize, 8, 32] {
        let mut fixture = make_fan_out(consumers);
        let mut block = vec![0.0_f32; fixture.renderer.quantum_frames() * 2];
        group.bench_with_input(BenchmarkId::from_parameter(consumers), &consumers, |b, _| {
            b.iter(|| {
                fixture.renderer.render_quantum(black_box(&mut block));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_chain_depth, bench_fan_out);
criterion_main!(benches);
