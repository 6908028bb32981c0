//! Cross-domain wrapper discovery
//!
//! Given a target domain and its member set, finds every node that bridges
//! the domain to any other domain. This is the sole leak-detection
//! mechanism: it looks exactly one hop out from the member set and reports
//! each foreign endpoint once.

use std::collections::HashSet;

use serde::Serialize;

use crate::graph::{NodeId, ObjectGraph};
use crate::inspect::{Domain, ObjectIntrospector};

/// Which side of the relation crosses the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CrossingDirection {
    /// The foreign node holds a reference into the domain
    Owner,
    /// A domain member holds a reference out to the foreign node
    Edge,
}

/// One boundary-crossing reference
#[derive(Debug, Clone)]
pub struct WrapperRecord {
    /// The domain member on our side of the crossing
    pub src: NodeId,
    /// The foreign endpoint
    pub dst: NodeId,
    /// Crossing label; outgoing references are prefixed with `EDGE:`
    pub label: String,
    pub direction: CrossingDirection,
}

/// Find all wrappers bridging `domain` to any other domain
///
/// A wrapper reachable from several members is reported once, keeping the
/// first discovered record. Nodes without a resolved domain never count as
/// foreign.
pub fn detect_wrappers(
    graph: &ObjectGraph,
    domain: &Domain,
    members: &[NodeId],
    introspector: &dyn ObjectIntrospector,
) -> Vec<WrapperRecord> {
    let mut records = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();

    for &member in members {
        let node = graph.node(member);

        for owner in &node.owners {
            if owner.from == member {
                continue;
            }
            let foreign = graph
                .node(owner.from)
                .domain
                .as_ref()
                .is_some_and(|d| !introspector.domain_equals(d, domain));
            if foreign && seen.insert(owner.from) {
                records.push(WrapperRecord {
                    src: member,
                    dst: owner.from,
                    label: owner.label.clone(),
                    direction: CrossingDirection::Owner,
                });
            }
        }

        for edge in &node.edges {
            if edge.to == member {
                continue;
            }
            let foreign = graph
                .node(edge.to)
                .domain
                .as_ref()
                .is_some_and(|d| !introspector.domain_equals(d, domain));
            if foreign && seen.insert(edge.to) {
                records.push(WrapperRecord {
                    src: member,
                    dst: edge.to,
                    label: format!("EDGE:{}", edge.label),
                    direction: CrossingDirection::Edge,
                });
            }
        }
    }

    tracing::debug!(
        "{} wrappers bridge domain to {} candidate members",
        records.len(),
        members.len()
    );
    records
}
