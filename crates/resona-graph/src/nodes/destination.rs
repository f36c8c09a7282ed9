//! The destination node: the graph's terminal pull target.
//!
//! One per context, created with it. Its single input is the final mix
//! point; the renderer reads that input's summing bus directly after the
//! pull, so the processor itself has nothing to do.

use crate::node::{ProcessIo, Processor, RenderContext};

pub(crate) struct DestinationProcessor;

impl Processor for DestinationProcessor {
    fn process(&mut self, _io: ProcessIo<'_>, _ctx: &RenderContext) {}
}
