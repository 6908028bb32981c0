//! Trace source seam
//!
//! The trace source drives forced collection passes on the host and streams
//! the resulting construction events back to the analyzer. One event
//! variant exists per callback of the underlying collector listener.

use async_trait::async_trait;

use crate::graph::Address;

/// One construction event from a cycle-collector trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A reference-counted object was described
    RefCounted {
        address: Address,
        ref_count: u32,
        description: String,
    },
    /// A traced (garbage-collected) object was described
    Traced {
        address: Address,
        marked: bool,
        description: String,
    },
    /// A labeled reference between two objects
    Edge {
        from: Address,
        to: Address,
        label: String,
    },
    /// An object the collector treats as unconditionally reachable
    Root { address: Address, known_edges: u64 },
    /// An object identified as collectable in this pass
    Garbage { address: Address },
}

/// Fatal trace source failures
///
/// Either variant aborts the run; recoverable oddities in the event stream
/// (forward references, re-described nodes) are absorbed by the graph and
/// never surface here.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// The collector listener could not be created on the host
    #[error("cycle collector listener unavailable")]
    Unavailable,
    /// The heap trace could not be read
    #[error("failed to read heap trace")]
    Read(#[source] anyhow::Error),
}

/// Driver for forced collection passes and the resulting event stream
///
/// A capture run calls `collect_pass` a configurable number of times to let
/// the heap stabilize, then `begin_capture` once to attach the listener,
/// then pulls `next_event` until it returns `Ok(None)`.
#[async_trait]
pub trait TraceSource {
    /// Run one forced collection pass without capturing a trace
    async fn collect_pass(&mut self) -> Result<(), TraceError>;

    /// Run the final collection pass with the trace listener attached
    ///
    /// With `all_traces` set the listener reports the entire heap, not just
    /// the cycle-collected subset; this is the thorough mode used for full
    /// captures, the probe mode leaves it unset.
    async fn begin_capture(&mut self, all_traces: bool) -> Result<(), TraceError>;

    /// Pull the next construction event; `None` ends the stream
    fn next_event(&mut self) -> Result<Option<TraceEvent>, TraceError>;
}
