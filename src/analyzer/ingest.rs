//! Application of trace events to the object graph

use crate::graph::{NodeKind, ObjectGraph};
use crate::source::TraceEvent;

/// Apply one construction event to the graph
///
/// Every event is recoverable: endpoints named before they are described
/// are created in partial state and filled in when (if ever) their
/// description event arrives. Out-of-order streams therefore produce the
/// same graph as ordered ones.
pub(crate) fn apply_event(graph: &mut ObjectGraph, event: TraceEvent) {
    match event {
        TraceEvent::RefCounted {
            address,
            ref_count,
            description,
        } => {
            let id = graph.ensure_node(address);
            let node = graph.node_mut(id);
            node.ref_counted = true;
            node.ref_count = ref_count;
            node.kind = NodeKind::decode(&description);
            node.description = description;
        }
        TraceEvent::Traced {
            address,
            marked,
            description,
        } => {
            let id = graph.ensure_node(address);
            let node = graph.node_mut(id);
            node.gced = true;
            node.gc_marked = marked;
            node.kind = NodeKind::decode(&description);
            node.description = description;
        }
        TraceEvent::Edge { from, to, label } => {
            graph.add_edge(from, to, &label);
        }
        TraceEvent::Root {
            address,
            known_edges,
        } => {
            graph.mark_root(address, known_edges);
        }
        TraceEvent::Garbage { address } => {
            graph.mark_garbage(address);
        }
    }
}
