//! Domain resolution
//!
//! Tags graph nodes with their resolved isolation domain and answers
//! domain-membership queries. Domain identity is only ever decided through
//! the introspector's equality predicate: two distinct tokens may denote
//! the same domain, so token comparison is never used.

use std::collections::{HashSet, VecDeque};

use crate::graph::{NodeId, ObjectGraph};
use crate::inspect::{Domain, ObjectIntrospector};

/// Resolve and cache the domain of every managed node
///
/// Nodes of non-managed kinds are left domain-less, as are managed nodes
/// whose handle or domain cannot be resolved; neither is an error.
pub fn resolve_domains(graph: &mut ObjectGraph, introspector: &dyn ObjectIntrospector) {
    let ids: Vec<NodeId> = graph.node_ids().collect();
    let mut resolved = 0usize;
    for id in ids {
        if !graph.node(id).kind.is_managed() {
            continue;
        }
        let address = graph.address(id);
        let Some(handle) = introspector.resolve_handle(address) else {
            tracing::debug!("no handle for managed object {}", address);
            continue;
        };
        let Some(domain) = introspector.domain_of(&handle) else {
            continue;
        };
        graph.node_mut(id).domain = Some(domain);
        resolved += 1;
    }
    tracing::debug!("resolved domains for {} nodes", resolved);
}

/// Collect the nodes whose resolved domain equals `domain`
pub fn domain_members(
    graph: &ObjectGraph,
    domain: &Domain,
    introspector: &dyn ObjectIntrospector,
) -> Vec<NodeId> {
    graph
        .node_ids()
        .filter(|&id| {
            graph
                .node(id)
                .domain
                .as_ref()
                .is_some_and(|d| introspector.domain_equals(d, domain))
        })
        .collect()
}

/// Find the domain a suspect node belongs to by walking its owners
///
/// Suspect nodes are typically native objects with no domain of their own;
/// the nearest managed owner decides, so the walk is breadth first. It is
/// iterative with an explicit worklist: owner chains in a full-heap capture
/// can be arbitrarily deep, and the owner relation contains cycles by
/// construction, hence the visited set.
pub fn seed_domain(
    graph: &ObjectGraph,
    start: NodeId,
    introspector: &dyn ObjectIntrospector,
) -> Option<Domain> {
    let mut visited: HashSet<NodeId> = HashSet::from([start]);
    let mut queue: VecDeque<NodeId> = VecDeque::from([start]);

    while let Some(id) = queue.pop_front() {
        for owner in &graph.node(id).owners {
            if owner.from == id {
                continue;
            }
            if graph.node(owner.from).kind.is_managed() {
                let address = graph.address(owner.from);
                if let Some(domain) = introspector
                    .resolve_handle(address)
                    .and_then(|handle| introspector.domain_of(&handle))
                {
                    return Some(domain);
                }
            }
            if visited.insert(owner.from) {
                queue.push_back(owner.from);
            }
        }
    }
    None
}
