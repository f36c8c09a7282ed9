//! Error types for graph topology operations.
//!
//! Errors only ever surface on the control thread, synchronously, with the
//! graph left unmodified. Render-time anomalies (missing upstream buses,
//! non-finite geometry, uninitialized nodes) never raise — the affected node
//! emits silence for the quantum instead.

use thiserror::Error;

/// Which port collection an out-of-range index referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Input,
    Output,
}

impl core::fmt::Display for PortKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PortKind::Input => write!(f, "input"),
            PortKind::Output => write!(f, "output"),
        }
    }
}

/// Errors from control-thread topology operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A port index was out of range for the node it addressed.
    #[error("{kind} index {index} out of range (node has {count})")]
    IndexOutOfRange {
        kind: PortKind,
        index: usize,
        count: usize,
    },

    /// The two endpoints belong to different contexts.
    #[error("nodes belong to different audio contexts")]
    CrossContext,

    /// An enum wire value names a model this build does not implement.
    #[error("unsupported model value {0}")]
    NotSupported(u16),

    /// The context has been closed; the operation was a no-op.
    #[error("audio context is closed")]
    ContextClosed,
}
