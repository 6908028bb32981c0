//! Object graph data model
//!
//! Holds the point-in-time snapshot of the reference graph produced by one
//! cycle-collector pass. Nodes live in a flat arena addressed by index;
//! edges and their mirror owner entries store indices rather than
//! references, so the bidirectional relation never forms an ownership
//! cycle and the mirror invariant can be checked structurally.

mod kind;

pub use kind::NodeKind;

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::inspect::Domain;

/// Opaque object address reported by the cycle collector
///
/// Unique per node within one capture; the analyzer never dereferences it
/// itself, only hands it to the introspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u64);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Index of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// A labeled outgoing reference
#[derive(Debug, Clone)]
pub struct EdgeRef {
    pub label: String,
    pub to: NodeId,
}

/// Mirror entry of an edge, stored on the target node
#[derive(Debug, Clone)]
pub struct OwnerRef {
    pub label: String,
    pub from: NodeId,
}

/// A node in the object graph
///
/// Nodes are created lazily on first reference by any event and may exist
/// in a partial state (address known, everything else default) until their
/// defining description event arrives. This is expected: edges routinely
/// reference endpoints before those endpoints are described.
#[derive(Debug, Clone, Default)]
pub struct ObjectRecord {
    /// Raw description string from the trace source
    pub description: String,
    /// Kind tag decoded from the description at ingestion time
    pub kind: NodeKind,
    /// Reported as a reference-counted object
    pub ref_counted: bool,
    /// Reported as a traced (garbage-collected) object
    pub gced: bool,
    /// Member of the root set
    pub root: bool,
    /// Identified as collectable in this pass
    pub garbage: bool,
    /// Reference count; only meaningful when `ref_counted`
    pub ref_count: u32,
    /// Collector mark bit; only meaningful when `gced`
    pub gc_marked: bool,
    /// Edge count the collector already knew about for a root, display-only
    pub known_edges: u64,
    /// Resolved isolation domain, absent until domain resolution runs
    pub domain: Option<Domain>,
    /// Ordered outgoing references
    pub edges: Vec<EdgeRef>,
    /// Ordered mirror entries of incoming references
    pub owners: Vec<OwnerRef>,
}

/// The captured reference graph of one analysis run
///
/// Built once per run, immutable after the run completes, discarded before
/// the next run starts. There is no persistence across runs.
#[derive(Debug, Default)]
pub struct ObjectGraph {
    nodes: Vec<ObjectRecord>,
    addresses: Vec<Address>,
    index: HashMap<Address, NodeId>,
    roots: Vec<NodeId>,
    garbage: Vec<NodeId>,
}

impl ObjectGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes created so far
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up the node for an address, creating it if absent
    pub fn ensure_node(&mut self, address: Address) -> NodeId {
        if let Some(&id) = self.index.get(&address) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(ObjectRecord::default());
        self.addresses.push(address);
        self.index.insert(address, id);
        id
    }

    /// Get the node for an id
    pub fn node(&self, id: NodeId) -> &ObjectRecord {
        &self.nodes[id.0]
    }

    /// Get a mutable node for an id
    pub fn node_mut(&mut self, id: NodeId) -> &mut ObjectRecord {
        &mut self.nodes[id.0]
    }

    /// Address of a node
    pub fn address(&self, id: NodeId) -> Address {
        self.addresses[id.0]
    }

    /// Look up a node id by address
    pub fn node_id(&self, address: Address) -> Option<NodeId> {
        self.index.get(&address).copied()
    }

    /// Iterate over all node ids in creation order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Root set, in discovery order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Garbage set, in discovery order
    pub fn garbage(&self) -> &[NodeId] {
        &self.garbage
    }

    /// Add an edge and its mirror owner entry atomically
    ///
    /// Both endpoints are created if absent, so a malformed stream naming an
    /// endpoint that is never otherwise described still yields a valid, if
    /// under-populated, node. Re-ingesting the identical edge event is a
    /// no-op; legitimate parallel edges (same endpoints, different label)
    /// are kept.
    pub fn add_edge(&mut self, from: Address, to: Address, label: &str) {
        let from_id = self.ensure_node(from);
        let to_id = self.ensure_node(to);

        let duplicate = self.nodes[from_id.0]
            .edges
            .iter()
            .any(|e| e.to == to_id && e.label == label);
        if duplicate {
            return;
        }

        self.nodes[from_id.0].edges.push(EdgeRef {
            label: label.to_string(),
            to: to_id,
        });
        self.nodes[to_id.0].owners.push(OwnerRef {
            label: label.to_string(),
            from: from_id,
        });
    }

    /// Add an address to the root set
    ///
    /// Membership is set once; repeated root events update the known edge
    /// count but never duplicate the set entry.
    pub fn mark_root(&mut self, address: Address, known_edges: u64) {
        let id = self.ensure_node(address);
        let node = &mut self.nodes[id.0];
        node.known_edges = known_edges;
        if !node.root {
            node.root = true;
            self.roots.push(id);
        }
    }

    /// Add an address to the garbage set; membership is never revoked
    pub fn mark_garbage(&mut self, address: Address) {
        let id = self.ensure_node(address);
        let node = &mut self.nodes[id.0];
        if !node.garbage {
            node.garbage = true;
            self.garbage.push(id);
        }
    }

    /// Find live nodes whose raw description contains `pattern`
    ///
    /// Garbage nodes are skipped: they are already being reclaimed and
    /// cannot be the anchor of a retention problem.
    pub fn find_by_description(&self, pattern: &str) -> Vec<NodeId> {
        self.node_ids()
            .filter(|&id| {
                let node = self.node(id);
                !node.garbage && node.description.contains(pattern)
            })
            .collect()
    }
}
