//! Cross-domain leak diagnosis for cycle-collected object graphs
//!
//! Captures a snapshot of the host's reference graph through a trace
//! source, finds objects retained across isolation-domain boundaries, and
//! renders a diagnostic report naming the references responsible. The crate
//! is a library embedded in a host process; it owns no heap of its own and
//! reaches live objects only through the [`inspect::ObjectIntrospector`]
//! seam.

pub mod analyze;
pub mod analyzer;
pub mod graph;
pub mod inspect;
pub mod logging;
pub mod source;

// Re-export the types a typical embedding needs
pub use analyze::{DiagnoseOptions, LeakKind, LeakRecord, Report, diagnose};
pub use analyzer::{Analyzer, CaptureMode, RunConfig, RunError, RunState};
pub use graph::{Address, NodeId, NodeKind, ObjectGraph};
pub use inspect::{Domain, GlobalDescription, Handle, ObjectIntrospector, PropertyValue};
pub use source::{TraceError, TraceEvent, TraceSource};
