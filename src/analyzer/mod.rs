//! Capture engine
//!
//! Drives forced collection passes on the trace source, then drains the
//! resulting event stream into an [`ObjectGraph`] in bounded batches,
//! yielding back to the scheduler between batches so an arbitrarily large
//! heap never stalls the host for longer than one batch.

mod ingest;

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use crate::graph::ObjectGraph;
use crate::source::{TraceError, TraceSource};

/// Tunable capture parameters
///
/// The pass counts are empirical, environment-dependent values: enough
/// passes to let the heap stabilize before the trace is taken. They are
/// deliberately configuration, not constants.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Collection passes for a cheap probe capture
    pub probe_passes: u32,
    /// Collection passes for a thorough full capture
    pub full_passes: u32,
    /// Delay between successive collection passes
    pub pass_delay: Duration,
    /// Events applied per scheduler turn while draining
    pub batch_size: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            probe_passes: 2,
            full_passes: 3,
            pass_delay: Duration::ZERO,
            batch_size: 10_000,
        }
    }
}

/// Capture thoroughness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Few passes, cycle-collected subset only
    Probe,
    /// Full pass count, entire heap traced
    Full,
}

impl CaptureMode {
    fn passes(self, config: &RunConfig) -> u32 {
        match self {
            CaptureMode::Probe => config.probe_passes,
            CaptureMode::Full => config.full_passes,
        }
    }

    fn all_traces(self) -> bool {
        matches!(self, CaptureMode::Full)
    }
}

/// Observable run state
///
/// `Complete` and `Error` are terminal for a run; the next capture on the
/// same analyzer starts over from `Priming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Priming,
    Draining,
    Complete,
    Error,
}

impl RunState {
    fn in_flight(self) -> bool {
        matches!(self, RunState::Priming | RunState::Draining)
    }
}

/// Capture failures
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A capture was started while another one was in flight
    #[error("an analysis run is already in flight")]
    AlreadyRunning,
    /// The trace source failed fatally; no graph is produced
    #[error("trace capture failed")]
    Trace(#[from] TraceError),
}

/// Builds one object graph per capture run
///
/// Single-threaded, cooperatively scheduled: the only suspension points are
/// the delays between collection passes and the yields between ingestion
/// batches. Exactly one run may be in flight at a time; a concurrent start
/// is rejected deterministically and cannot touch the in-flight graph.
pub struct Analyzer<S: TraceSource> {
    source: RefCell<S>,
    config: RunConfig,
    state: Cell<RunState>,
}

impl<S: TraceSource> Analyzer<S> {
    pub fn new(source: S, config: RunConfig) -> Self {
        Self {
            source: RefCell::new(source),
            config,
            state: Cell::new(RunState::Idle),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Tear down the analyzer and hand back the trace source
    pub fn into_source(self) -> S {
        self.source.into_inner()
    }

    /// Run one capture and return the graph snapshot by value
    ///
    /// The returned [`ObjectGraph`] is this run's snapshot; ownership moves
    /// to the caller and nothing of the run survives inside the analyzer,
    /// so a failing consumer cannot corrupt a subsequent run.
    pub async fn capture(&self, mode: CaptureMode) -> Result<ObjectGraph, RunError> {
        if self.state.get().in_flight() {
            return Err(RunError::AlreadyRunning);
        }
        self.state.set(RunState::Priming);
        let result = self.capture_inner(mode).await;
        self.state.set(match result {
            Ok(_) => RunState::Complete,
            Err(_) => RunState::Error,
        });
        result
    }

    /// Run a capture and hand the snapshot to a completion callback
    ///
    /// The callback is invoked exactly once, after the run's state has been
    /// cleared, so it may immediately start a follow-up run on the same
    /// analyzer (the probe-then-full pattern). A panicking callback is
    /// caught and logged, never propagated.
    pub async fn start_run<F>(&self, full_trace: bool, on_complete: F) -> Result<(), RunError>
    where
        F: FnOnce(ObjectGraph),
    {
        let mode = if full_trace {
            CaptureMode::Full
        } else {
            CaptureMode::Probe
        };
        let graph = self.capture(mode).await?;
        if let Err(payload) = catch_unwind(AssertUnwindSafe(move || on_complete(graph))) {
            let message = panic_message(&payload);
            tracing::error!("capture completion callback panicked: {}", message);
        }
        Ok(())
    }

    async fn capture_inner(&self, mode: CaptureMode) -> Result<ObjectGraph, RunError> {
        let passes = mode.passes(&self.config);
        tracing::debug!("priming heap with {} collection passes", passes);

        {
            let mut source = self.source.borrow_mut();
            for _ in 1..passes {
                source.collect_pass().await?;
                tokio::time::sleep(self.config.pass_delay).await;
            }
            source.begin_capture(mode.all_traces()).await?;
        }

        self.state.set(RunState::Draining);
        let mut graph = ObjectGraph::new();
        let mut source = self.source.borrow_mut();

        loop {
            let batch_start = Instant::now();
            let mut drained = 0usize;
            while drained < self.config.batch_size {
                match source.next_event()? {
                    Some(event) => {
                        ingest::apply_event(&mut graph, event);
                        drained += 1;
                    }
                    None => {
                        tracing::debug!("trace drained, {} nodes in graph", graph.len());
                        return Ok(graph);
                    }
                }
            }
            let elapsed = batch_start.elapsed().max(Duration::from_micros(1));
            tracing::debug!(
                "processed batch of {} events ({} obj/s)",
                drained,
                (drained as f64 / elapsed.as_secs_f64()).round()
            );
            // Hand control back to the scheduler before the next batch
            tokio::task::yield_now().await;
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
