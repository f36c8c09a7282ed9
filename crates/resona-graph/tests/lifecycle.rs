//! Reference counting, dormancy and deletion across the two-thread split.
//!
//! These tests observe the lifetime machinery: connection refs bumped and
//! restored by topology changes, outputs going dormant when the last live
//! connection disappears, deletion sweeps, and the deferred deref a
//! finished source issues from the audio side.

use std::sync::Arc;

use resona_graph::{
    AsNode, AudioContext, ContextOptions, ProcessIo, Processor, RenderContext, SampleBuffer,
};

fn small_context() -> (AudioContext, resona_graph::Renderer) {
    AudioContext::new(ContextOptions {
        sample_rate: 44100.0,
        quantum_frames: 4,
    })
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

#[test]
fn connect_bumps_counts_and_disconnect_restores_them() {
    let (context, mut renderer) = small_context();
    let a = context.create_gain().unwrap();
    let b = context.create_gain().unwrap();

    let before = context.connection_count();
    context.connect(&a, &b, 0, 0).unwrap();
    assert_eq!(context.connection_count(), before + 1);

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);
    // One inbound edge on b.
    assert_eq!(b.node().ref_counts(), (1, 1));

    context.disconnect(&a, 0).unwrap();
    renderer.render_quantum(&mut out);
    assert_eq!(b.node().ref_counts(), (1, 0));
    // The connect counter is a monotonic change detector, not a live edge
    // count; disconnecting does not rewind it.
    assert_eq!(context.connection_count(), before + 1);
}

#[test]
fn ref_counts_never_go_negative() {
    let (context, mut renderer) = small_context();
    let a = context.create_gain().unwrap();
    let b = context.create_gain().unwrap();
    context.connect(&a, &b, 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);

    // Disconnect twice: the second is a no-op on the counts.
    context.disconnect(&a, 0).unwrap();
    context.disconnect(&a, 0).unwrap();
    renderer.render_quantum(&mut out);

    let (normal, connection) = b.node().ref_counts();
    assert!(normal >= 0 && connection >= 0);
    assert_eq!(connection, 0);
}

#[test]
fn handle_clones_track_normal_refs() {
    let (context, _renderer) = small_context();
    let gain = context.create_gain().unwrap();
    assert_eq!(gain.node().ref_counts().0, 1);

    let extra = gain.node().clone();
    assert_eq!(gain.node().ref_counts().0, 2);
    drop(extra);
    assert_eq!(gain.node().ref_counts().0, 1);
}

#[test]
fn losing_the_last_connection_makes_a_node_dormant() {
    let (context, mut renderer) = small_context();
    let (source, _) = context
        .create_custom(Box::new(DcSource(1.0)), 0, &[1], &[])
        .unwrap();
    let through = context.create_gain().unwrap();

    context.connect(&source, &through, 0, 0).unwrap();
    context.connect(&through, &context.destination(), 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);
    assert!(out[0] > 0.9, "audible before the disconnect");

    // Removing the inbound edge drops the gain's connection refs to zero;
    // its outputs go dormant even though it is still wired to the
    // destination and the host still holds its handle.
    context.disconnect(&source, 0).unwrap();
    renderer.render_quantum(&mut out);
    renderer.render_quantum(&mut out);
    assert_eq!(out, [0.0; 8], "dormant node renders nothing");

    // Reconnecting re-enables the outputs.
    context.connect(&source, &through, 0, 0).unwrap();
    renderer.render_quantum(&mut out);
    assert!(out[0] > 0.9, "audible again after reconnect");
}

#[test]
fn release_and_disconnect_free_the_chain() {
    let (context, mut renderer) = small_context();
    let a = context.create_gain().unwrap();
    let b = context.create_gain().unwrap();
    let destination = context.destination();

    context.connect(&a, &b, 0, 0).unwrap();
    context.connect(&b, &destination, 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);
    assert_eq!(context.live_nodes().len(), 3);

    // Release the host handle to a, then sever and release b.
    drop(a);
    context.disconnect(&b, 0).unwrap();
    drop(b);
    drop(destination);

    renderer.render_quantum(&mut out);
    let live = context.sweep();

    assert_eq!(live.len(), 1, "only the destination survives, got {live:?}");

    // A second sweep finds nothing more to free.
    let live = context.sweep();
    assert_eq!(live.len(), 1);
}

#[test]
fn finished_source_releases_its_playing_ref_deferred() {
    let (context, mut renderer) = small_context();
    let buffer = Arc::new(SampleBuffer::from_mono(vec![1.0, 1.0, 1.0, 1.0], 44100.0));
    let source = context.create_buffer_source(buffer).unwrap();
    source.start().unwrap();
    context.connect(&source, &context.destination(), 0, 0).unwrap();

    // Playing ref plus the host handle.
    assert_eq!(source.node().ref_counts().0, 2);

    // Release the host handle mid-playback; the playing ref keeps the node
    // alive until the buffer runs out.
    let id = source.node().id();
    drop(source);

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);
    assert!((out[0] - 1.0).abs() < 1e-6, "still audible after drop");
    assert!(context.live_nodes().contains(&id));

    // The buffer ends; the renderer reports the source through the
    // deferred-deref queue and a later sync completes the release.
    renderer.render_quantum(&mut out);
    renderer.render_quantum(&mut out);
    let live = context.sweep();
    assert!(!live.contains(&id), "finished source must be freed");
}

#[test]
fn delay_nodes_are_exempt_from_dormancy() {
    let (context, mut renderer) = small_context();
    let (source, _) = context
        .create_custom(Box::new(DcSource(1.0)), 0, &[1], &[])
        .unwrap();
    let delay = context.create_delay(0.5).unwrap();
    delay.delay_time().set_value(2.0 / 44100.0);

    context.connect(&source, &delay, 0, 0).unwrap();
    context.connect(&delay, &context.destination(), 0, 0).unwrap();

    let mut out = [0.0_f32; 8];
    renderer.render_quantum(&mut out);

    // Cut the input: a delay still owes its tail, so its outputs stay
    // live and the buffered samples drain instead of being cut off.
    context.disconnect(&source, 0).unwrap();
    renderer.render_quantum(&mut out);
    assert!(
        out.iter().any(|&s| s > 0.9),
        "tail must keep draining, got {out:?}"
    );
}

#[test]
fn repeated_connect_disconnect_stays_balanced() {
    // Rapid connect/disconnect cycles leave counts exactly restored.
    let (context, mut renderer) = small_context();
    let a = context.create_gain().unwrap();
    let b = context.create_gain().unwrap();
    let mut out = [0.0_f32; 8];

    for _ in 0..10 {
        context.connect(&a, &b, 0, 0).unwrap();
        renderer.render_quantum(&mut out);
        assert_eq!(b.node().ref_counts(), (1, 1));

        context.disconnect(&a, 0).unwrap();
        renderer.render_quantum(&mut out);
        assert_eq!(b.node().ref_counts(), (1, 0));
    }
}
