//! Owning-global resolution
//!
//! Walks successive scope parents from an object to find the global that
//! owns it. Used both as a leak-classification input and as diagnostic
//! context attached to dumped edges.

use std::collections::HashSet;

use crate::graph::{Address, NodeId, NodeKind, ObjectGraph};
use crate::inspect::ObjectIntrospector;

/// Safety cap on the parent walk
///
/// The parent relation is expected to be acyclic and short, but that is a
/// host invariant this crate does not get to assume unchecked.
const MAX_PARENT_HOPS: usize = 256;

/// Outcome of a global-path walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalPath {
    /// The node kind has no scope parent chain to walk
    NotApplicable,
    /// The node itself is the global: its very first parent lookup was null
    AlreadyGlobal,
    /// The terminal parent-chain address, with the visited chain in order
    Found { global: Address, path: Vec<Address> },
    /// No handle, or the bounded walk ended before reaching a null parent
    Unresolved,
}

/// Resolve the owning global of a node
///
/// Only plain objects and functions have a meaningful parent chain; every
/// other kind is `NotApplicable`, which callers must distinguish from a
/// walk that ran but found nothing.
pub fn resolve_global_path(
    graph: &ObjectGraph,
    id: NodeId,
    introspector: &dyn ObjectIntrospector,
) -> GlobalPath {
    let node = graph.node(id);
    if !matches!(node.kind, NodeKind::PlainObject | NodeKind::Function) {
        return GlobalPath::NotApplicable;
    }

    let Some(start) = introspector.resolve_handle(graph.address(id)) else {
        return GlobalPath::Unresolved;
    };

    let mut path = vec![start.address()];
    let mut visited: HashSet<Address> = path.iter().copied().collect();
    let mut current = start;

    loop {
        match introspector.parent_of(&current) {
            None => {
                let terminal = current.address();
                if terminal == start.address() {
                    return GlobalPath::AlreadyGlobal;
                }
                return GlobalPath::Found {
                    global: terminal,
                    path,
                };
            }
            Some(parent) => {
                if !visited.insert(parent.address()) || path.len() >= MAX_PARENT_HOPS {
                    tracing::warn!(
                        "parent walk from {} did not terminate, giving up after {} hops",
                        start.address(),
                        path.len()
                    );
                    return GlobalPath::Unresolved;
                }
                path.push(parent.address());
                current = parent;
            }
        }
    }
}
