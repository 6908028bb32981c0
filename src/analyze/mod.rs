//! Leak diagnosis pipeline
//!
//! Ties the capture engine and the structural analyses together: a cheap
//! probe capture finds suspect objects, a full capture gives the complete
//! reference graph, and the per-domain analyses turn boundary crossings
//! into a [`Report`].

pub mod classify;
pub mod compartments;
pub mod global_path;
pub mod report;
pub mod wrappers;

pub use classify::classify;
pub use compartments::{domain_members, resolve_domains, seed_domain};
pub use global_path::{GlobalPath, resolve_global_path};
pub use report::{LeakKind, LeakRecord, Report};
pub use wrappers::{CrossingDirection, WrapperRecord, detect_wrappers};

use chrono::Utc;

use crate::analyzer::{Analyzer, CaptureMode, RunError};
use crate::inspect::{Domain, ObjectIntrospector};
use crate::source::TraceSource;

/// Tunables for one diagnosis run
#[derive(Debug, Clone)]
pub struct DiagnoseOptions {
    /// Description substring that marks a node as a leak suspect
    pub suspect_pattern: String,
    /// Edge/owner entries rendered per node in generic dumps
    pub dump_fan_out: usize,
}

impl Default for DiagnoseOptions {
    fn default() -> Self {
        Self {
            // Detached document fragments are the canonical leak anchor
            suspect_pattern: "Fragment".to_string(),
            dump_fan_out: 100,
        }
    }
}

/// Run the full probe-then-diagnose pipeline
///
/// The probe capture is the cheap early exit: when it finds no suspects the
/// expensive full capture never happens and a clean report is returned.
pub async fn diagnose<S: TraceSource>(
    analyzer: &Analyzer<S>,
    introspector: &dyn ObjectIntrospector,
    options: &DiagnoseOptions,
) -> Result<Report, RunError> {
    let started_at = Utc::now();

    let probe = analyzer.capture(CaptureMode::Probe).await?;
    let probe_suspects = probe.find_by_description(&options.suspect_pattern);
    if probe_suspects.is_empty() {
        tracing::info!("probe capture found no suspects, heap looks clean");
        return Ok(Report::clean(started_at, probe.len()));
    }
    tracing::info!(
        "probe capture found {} suspects, taking full capture",
        probe_suspects.len()
    );
    drop(probe);

    let mut graph = analyzer.capture(CaptureMode::Full).await?;
    let suspects = graph.find_by_description(&options.suspect_pattern);
    if suspects.is_empty() {
        // The probe hit can legitimately vanish between captures
        tracing::info!("suspects from the probe did not survive the full capture");
        return Ok(Report::clean(started_at, graph.len()));
    }

    resolve_domains(&mut graph, introspector);

    // One analysis per distinct suspect domain, dedup via the predicate
    let mut domains: Vec<Domain> = Vec::new();
    for &suspect in &suspects {
        let Some(domain) = seed_domain(&graph, suspect, introspector) else {
            tracing::debug!(
                "no owning domain found for suspect {}",
                graph.address(suspect)
            );
            continue;
        };
        if !domains
            .iter()
            .any(|d| introspector.domain_equals(d, &domain))
        {
            domains.push(domain);
        }
    }

    let mut leaks = Vec::new();
    for domain in &domains {
        let members = domain_members(&graph, domain, introspector);
        let crossings = detect_wrappers(&graph, domain, &members, introspector);
        leaks.extend(classify(
            &graph,
            introspector,
            &crossings,
            options.dump_fan_out,
        ));
    }

    tracing::info!(
        "diagnosis complete: {} suspects, {} domains, {} leaks",
        suspects.len(),
        domains.len(),
        leaks.len()
    );
    Ok(Report {
        started_at,
        node_count: graph.len(),
        suspects: suspects.iter().map(|&id| graph.address(id)).collect(),
        leaks,
    })
}
