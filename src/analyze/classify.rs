//! Pattern-based leak classification
//!
//! Matches wrapper records against known leak shapes, in priority order,
//! first match wins per record. Anything unmatched falls back to a
//! recursive diagnostic dump of both endpoints.

use std::collections::HashSet;

use crate::analyze::global_path::{GlobalPath, resolve_global_path};
use crate::analyze::report::{LeakKind, LeakRecord};
use crate::analyze::wrappers::{CrossingDirection, WrapperRecord};
use crate::graph::{NodeId, NodeKind, ObjectGraph};
use crate::inspect::ObjectIntrospector;

/// Properties rendered per node in the generic dump
const PROPERTY_LIMIT: usize = 10;

/// Recursion cap for the proxy/listener/manager redirections
///
/// Those chains do not form cycles in practice; the cap and the visited
/// set below are the safety net for when that expectation fails.
const MAX_DUMP_DEPTH: usize = 32;

/// Classify every wrapper record into a diagnostic leak record
///
/// Owner-direction records that carry no call-scope capture produce no
/// record at all; that is a silent skip, not an error.
pub fn classify(
    graph: &ObjectGraph,
    introspector: &dyn ObjectIntrospector,
    records: &[WrapperRecord],
    dump_fan_out: usize,
) -> Vec<LeakRecord> {
    records
        .iter()
        .filter_map(|record| classify_record(graph, introspector, record, dump_fan_out))
        .collect()
}

fn classify_record(
    graph: &ObjectGraph,
    introspector: &dyn ObjectIntrospector,
    record: &WrapperRecord,
    dump_fan_out: usize,
) -> Option<LeakRecord> {
    if let Some(leak) = listener_leak(graph, record) {
        return Some(leak);
    }
    if record.direction == CrossingDirection::Owner {
        return scope_variable_leak(graph, introspector, record);
    }
    Some(generic_dump(graph, introspector, record, dump_fan_out))
}

/// Pattern: a proxy owned solely by an event listener
///
/// The proxied object is being kept alive by event dispatch machinery in
/// another domain. The report names the proxied (`private`) target and
/// every dispatch target retaining the listener's event manager.
fn listener_leak(graph: &ObjectGraph, record: &WrapperRecord) -> Option<LeakRecord> {
    if record.direction != CrossingDirection::Edge {
        return None;
    }
    let src = graph.node(record.src);
    if src.kind != NodeKind::Proxy || src.owners.len() != 1 {
        return None;
    }
    let listener = src.owners[0].from;
    if graph.node(listener).kind != NodeKind::EventListener {
        return None;
    }

    let mut lines = Vec::new();
    match src.edges.iter().find(|e| e.label == "private") {
        Some(private) => lines.push(format!(
            " * leaked object {} - {}",
            graph.address(private.to),
            graph.node(private.to).description
        )),
        None => lines.push("!!! unable to find private edge of proxy".to_string()),
    }

    for owner in &graph.node(listener).owners {
        if owner.label != "mListeners[i]" {
            continue;
        }
        let manager = owner.from;
        lines.push(format!(
            " * event manager {} - {}",
            graph.address(manager),
            graph.node(manager).description
        ));
        for retainer in &graph.node(manager).owners {
            lines.push(format!(
                " * dispatch target.{} {} - {}",
                retainer.label,
                graph.address(retainer.from),
                graph.node(retainer.from).description
            ));
        }
    }

    Some(LeakRecord {
        link: record.label.clone(),
        src: graph.address(record.src),
        dst: graph.address(record.dst),
        kind: LeakKind::Listener,
        lines,
    })
}

/// Pattern: a foreign owner whose reference lives in a call scope
///
/// The captured variable's label and the function owning the call scope
/// tell the developer which closure to break. Owner records without any
/// call-frame owner yield nothing.
fn scope_variable_leak(
    graph: &ObjectGraph,
    introspector: &dyn ObjectIntrospector,
    record: &WrapperRecord,
) -> Option<LeakRecord> {
    let mut lines = Vec::new();

    for capture in &graph.node(record.dst).owners {
        let frame = capture.from;
        if graph.node(frame).kind != NodeKind::CallFrame {
            continue;
        }
        let function = graph
            .node(frame)
            .owners
            .iter()
            .find(|o| o.label == "fun_callscope")
            .map(|o| o.from);
        match function {
            Some(function) => {
                lines.push(format!(
                    " * captured as `{}` by frame {}; retained by function {} - {}",
                    capture.label,
                    graph.address(frame),
                    graph.address(function),
                    graph.node(function).description
                ));
                if let Some(source) = introspector
                    .resolve_handle(graph.address(function))
                    .and_then(|h| introspector.decompile_function(&h))
                {
                    lines.push(" * function source:".to_string());
                    for line in source.lines() {
                        lines.push(format!("    {}", line));
                    }
                }
            }
            None => lines.push(format!(
                " * captured as `{}` by frame {}; no retaining function found",
                capture.label,
                graph.address(frame)
            )),
        }
    }

    if lines.is_empty() {
        return None;
    }
    Some(LeakRecord {
        link: record.label.clone(),
        src: graph.address(record.src),
        dst: graph.address(record.dst),
        kind: LeakKind::ScopeVariable,
        lines,
    })
}

fn generic_dump(
    graph: &ObjectGraph,
    introspector: &dyn ObjectIntrospector,
    record: &WrapperRecord,
    dump_fan_out: usize,
) -> LeakRecord {
    let mut dumper = Dumper {
        graph,
        introspector,
        fan_out: dump_fan_out,
        lines: Vec::new(),
        visited: HashSet::new(),
        depth: 0,
    };
    dumper.lines.push(" --- LEAK TARGET".to_string());
    dumper.dump("src", record.src);
    dumper.lines.push(" --- LEAK SOURCE".to_string());
    dumper.dump("leak source", record.dst);

    LeakRecord {
        link: record.label.clone(),
        src: graph.address(record.src),
        dst: graph.address(record.dst),
        kind: LeakKind::Generic,
        lines: dumper.lines,
    }
}

/// Recursive diagnostic dump with redirections per node kind
struct Dumper<'a> {
    graph: &'a ObjectGraph,
    introspector: &'a dyn ObjectIntrospector,
    fan_out: usize,
    lines: Vec<String>,
    visited: HashSet<NodeId>,
    depth: usize,
}

impl Dumper<'_> {
    fn dump(&mut self, heading: &str, id: NodeId) {
        let node = self.graph.node(id);
        self.lines.push(format!(
            ">>> {} {} - {}",
            heading,
            self.graph.address(id),
            node.description
        ));
        if !self.visited.insert(id) {
            self.lines.push(" * (already dumped)".to_string());
            return;
        }
        if self.depth >= MAX_DUMP_DEPTH {
            self.lines.push(" * (recursion cap reached)".to_string());
            return;
        }
        self.depth += 1;
        self.dump_body(id);
        self.depth -= 1;
    }

    fn dump_body(&mut self, id: NodeId) {
        let graph = self.graph;
        let node = graph.node(id);
        match node.kind {
            // Proxies are transparent for reporting: show the proxied
            // object, not the proxy shell.
            NodeKind::Proxy => {
                self.dump_refs("proxy", id);
                let target = node
                    .edges
                    .iter()
                    .find(|e| e.label == "private")
                    .map(|e| e.to);
                match target {
                    Some(target) => self.dump("proxy target object", target),
                    None => self
                        .lines
                        .push("!!! unable to find private edge of proxy".to_string()),
                }
            }
            NodeKind::Global | NodeKind::Sandbox => {
                let desc = self
                    .introspector
                    .resolve_handle(graph.address(id))
                    .map(|h| self.introspector.describe_global(&h));
                let rendered = desc
                    .and_then(|d| serde_json::to_string(&d).ok())
                    .unwrap_or_else(|| "-undefined-".to_string());
                self.lines.push(format!(" * global desc: {}", rendered));
            }
            NodeKind::EventListener => {
                self.dump_refs("listener", id);
                let managers: Vec<NodeId> = node
                    .owners
                    .iter()
                    .filter(|o| o.label == "mListeners[i]")
                    .map(|o| o.from)
                    .collect();
                let roots: Vec<NodeId> = node
                    .edges
                    .iter()
                    .filter(|e| e.label == "root")
                    .map(|e| e.to)
                    .collect();
                for manager in managers {
                    self.dump("event manager", manager);
                }
                for root in roots {
                    self.dump("root", root);
                }
            }
            NodeKind::EventManager => {
                self.dump_refs("event manager", id);
                let targets: Vec<NodeId> = node
                    .owners
                    .iter()
                    .filter(|o| o.label == "target")
                    .map(|o| o.from)
                    .collect();
                for target in targets {
                    self.dump("event.target", target);
                }
            }
            _ => {
                if let GlobalPath::Found { global, .. } =
                    resolve_global_path(graph, id, self.introspector)
                {
                    self.lines.push(format!(" * global: {}", global));
                }
                self.dump_refs("", id);
                if node.kind == NodeKind::Function {
                    if let Some(source) = self
                        .introspector
                        .resolve_handle(graph.address(id))
                        .and_then(|h| self.introspector.decompile_function(&h))
                    {
                        self.lines.push(" * function source:".to_string());
                        for line in source.lines() {
                            self.lines.push(format!("    {}", line));
                        }
                    }
                }
                if let Some(handle) = self.introspector.resolve_handle(graph.address(id)) {
                    for (name, value) in self
                        .introspector
                        .enumerate_properties(&handle, PROPERTY_LIMIT)
                    {
                        self.lines.push(format!(" * prop.{} = {}", name, value));
                    }
                }
            }
        }
    }

    /// Render the edge and owner lists of a node, capped at `fan_out`
    /// entries per list, with owning-global context attached to managed
    /// endpoints.
    fn dump_refs(&mut self, prefix: &str, id: NodeId) {
        let graph = self.graph;
        let node = graph.node(id);
        let dot = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}.", prefix)
        };

        for (shown, edge) in node.edges.iter().enumerate() {
            if shown >= self.fan_out {
                self.lines.push(format!(
                    " * ({} more edges omitted)",
                    node.edges.len() - shown
                ));
                break;
            }
            let mut line = format!(
                " * {}edge.{} {}={}",
                dot,
                edge.label,
                graph.address(edge.to),
                graph.node(edge.to).description
            );
            self.attach_global(&mut line, edge.to);
            self.lines.push(line);
        }

        for (shown, owner) in node.owners.iter().enumerate() {
            if shown >= self.fan_out {
                self.lines.push(format!(
                    " * ({} more owners omitted)",
                    node.owners.len() - shown
                ));
                break;
            }
            let mut line = format!(
                " * {}owner.{} {}={}",
                dot,
                owner.label,
                graph.address(owner.from),
                graph.node(owner.from).description
            );
            self.attach_global(&mut line, owner.from);
            self.lines.push(line);
        }
    }

    fn attach_global(&self, line: &mut String, id: NodeId) {
        if !matches!(
            self.graph.node(id).kind,
            NodeKind::PlainObject | NodeKind::Function
        ) {
            return;
        }
        if let GlobalPath::Found { global, .. } =
            resolve_global_path(self.graph, id, self.introspector)
        {
            line.push_str(&format!(" global:{}", global));
        }
    }
}
