//! Diagnostic report
//!
//! The value handed back to the caller at the end of a run: an ordered
//! sequence of leak records, each with its rendered diagnostic lines.
//! The crate defines no file format; consumers serialize or render as
//! they see fit.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::graph::Address;

/// Which classifier pattern produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LeakKind {
    /// Event listener retaining a proxied object across the boundary
    Listener,
    /// Call scope capturing a foreign object in a variable
    ScopeVariable,
    /// No pattern matched; recursive dump of both endpoints
    Generic,
}

/// One diagnosed boundary crossing
#[derive(Debug, Clone, Serialize)]
pub struct LeakRecord {
    /// Label of the crossing reference (`EDGE:`-prefixed when outgoing)
    pub link: String,
    /// Domain-member endpoint
    pub src: Address,
    /// Foreign endpoint
    pub dst: Address,
    pub kind: LeakKind,
    /// Rendered diagnostic lines, in emission order
    pub lines: Vec<String>,
}

/// Complete result of one analysis run
///
/// A run yields either this value in full or an error; nothing partial is
/// ever emitted mid-run.
#[derive(Debug, Serialize)]
pub struct Report {
    /// UTC time the run started
    pub started_at: DateTime<Utc>,
    /// Nodes in the analyzed capture
    pub node_count: usize,
    /// Addresses of the suspect nodes that seeded the analysis
    pub suspects: Vec<Address>,
    pub leaks: Vec<LeakRecord>,
}

impl Report {
    /// A report for a run that found nothing suspicious
    pub fn clean(started_at: DateTime<Utc>, node_count: usize) -> Self {
        Self {
            started_at,
            node_count,
            suspects: Vec::new(),
            leaks: Vec::new(),
        }
    }

    /// Render the report as human-readable text
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# objects in capture: {}\n", self.node_count));
        let suspects: Vec<String> = self.suspects.iter().map(|a| a.to_string()).collect();
        out.push_str(&format!("# suspects: {}\n", suspects.join(", ")));
        for leak in &self.leaks {
            out.push_str(
                "\n############################################################################\n",
            );
            out.push_str(&format!("link edge name: {}\n", leak.link));
            for line in &leak.lines {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}
