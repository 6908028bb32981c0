//! Leak classification, global-path resolution and report rendering

mod common;

use common::FakeIntrospector;

use leakscope::analyze::{
    CrossingDirection, GlobalPath, LeakKind, Report, WrapperRecord, classify, detect_wrappers,
    resolve_domains, resolve_global_path,
};
use leakscope::graph::{Address, NodeId, NodeKind, ObjectGraph};
use leakscope::inspect::{Domain, PropertyValue};

const FAN_OUT: usize = 100;

fn node(graph: &mut ObjectGraph, addr: u64, desc: &str) -> NodeId {
    let id = graph.ensure_node(Address(addr));
    graph.node_mut(id).kind = NodeKind::decode(desc);
    graph.node_mut(id).description = desc.to_string();
    id
}

/// Proxy held solely by an event listener, with the usual native chain:
/// manager -> listener -> proxy -> private target
fn listener_scenario() -> (ObjectGraph, FakeIntrospector) {
    let mut graph = ObjectGraph::new();
    node(&mut graph, 0x10, "JS Object (Proxy)");
    node(&mut graph, 0x20, "JS Object (Object)");
    node(&mut graph, 0x30, "JS Object (Object)");
    node(&mut graph, 0x40, "nsXPCWrappedJS (nsIDOMEventListener)");
    node(&mut graph, 0x50, "nsEventListenerManager");
    node(&mut graph, 0x60, "FragmentOrElement (xhtml) div");
    graph.add_edge(Address(0x10), Address(0x30), "private");
    graph.add_edge(Address(0x10), Address(0x20), "wrapped");
    graph.add_edge(Address(0x40), Address(0x10), "jsobj");
    graph.add_edge(Address(0x50), Address(0x40), "mListeners[i]");
    graph.add_edge(Address(0x60), Address(0x50), "mListenerManager");

    let mut fake = FakeIntrospector::default();
    fake.set_domain(0x10, 1);
    fake.set_domain(0x20, 2);
    (graph, fake)
}

#[test]
fn listener_pattern_wins_over_the_generic_dump() {
    let (mut graph, fake) = listener_scenario();
    resolve_domains(&mut graph, &fake);

    let members = vec![graph.node_id(Address(0x10)).unwrap()];
    let crossings = detect_wrappers(&graph, &Domain(1), &members, &fake);
    assert_eq!(crossings.len(), 1);

    let leaks = classify(&graph, &fake, &crossings, FAN_OUT);
    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].kind, LeakKind::Listener);
    assert_eq!(leaks[0].link, "EDGE:wrapped");
    // The report names the proxied object and the dispatch target
    assert!(
        leaks[0]
            .lines
            .iter()
            .any(|l| l.contains("leaked object 0x30"))
    );
    assert!(
        leaks[0]
            .lines
            .iter()
            .any(|l| l.contains("dispatch target.mListenerManager 0x60"))
    );
}

#[test]
fn listener_pattern_needs_a_sole_listener_owner() {
    let (mut graph, fake) = listener_scenario();
    // A second owner of the proxy disqualifies the pattern
    node(&mut graph, 0x70, "JS Object (Object)");
    graph.add_edge(Address(0x70), Address(0x10), "extra");
    resolve_domains(&mut graph, &fake);

    let members = vec![graph.node_id(Address(0x10)).unwrap()];
    let crossings = detect_wrappers(&graph, &Domain(1), &members, &fake);
    let leaks = classify(&graph, &fake, &crossings, FAN_OUT);

    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].kind, LeakKind::Generic);
}

#[test]
fn missing_private_edge_is_reported_as_an_anomaly() {
    // Same shape as the listener scenario, minus the proxy's private edge
    let mut graph = ObjectGraph::new();
    node(&mut graph, 0x10, "JS Object (Proxy)");
    node(&mut graph, 0x20, "JS Object (Object)");
    node(&mut graph, 0x40, "nsXPCWrappedJS (nsIDOMEventListener)");
    node(&mut graph, 0x50, "nsEventListenerManager");
    graph.add_edge(Address(0x10), Address(0x20), "wrapped");
    graph.add_edge(Address(0x40), Address(0x10), "jsobj");
    graph.add_edge(Address(0x50), Address(0x40), "mListeners[i]");

    let mut fake = FakeIntrospector::default();
    fake.set_domain(0x10, 1);
    fake.set_domain(0x20, 2);
    resolve_domains(&mut graph, &fake);

    let members = vec![graph.node_id(Address(0x10)).unwrap()];
    let crossings = detect_wrappers(&graph, &Domain(1), &members, &fake);
    let leaks = classify(&graph, &fake, &crossings, FAN_OUT);

    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].kind, LeakKind::Listener);
    assert!(
        leaks[0]
            .lines
            .iter()
            .any(|l| l.contains("unable to find private edge"))
    );
}

#[test]
fn scope_variable_pattern_names_the_capturing_function() {
    let mut graph = ObjectGraph::new();
    let member = node(&mut graph, 0x10, "JS Object (Object)");
    let foreign = node(&mut graph, 0x20, "JS Object (Object)");
    node(&mut graph, 0x30, "JS Object (Call)");
    node(&mut graph, 0x40, "JS Object (Function - onTimeout)");
    graph.add_edge(Address(0x20), Address(0x10), "leakedRef");
    graph.add_edge(Address(0x30), Address(0x20), "savedElement");
    graph.add_edge(Address(0x40), Address(0x30), "fun_callscope");

    let mut fake = FakeIntrospector::default();
    fake.handles.insert(0x40);
    fake.sources
        .insert(0x40, "function onTimeout() {\n  use(savedElement);\n}".to_string());

    let record = WrapperRecord {
        src: member,
        dst: foreign,
        label: "leakedRef".to_string(),
        direction: CrossingDirection::Owner,
    };
    let leaks = classify(&graph, &fake, &[record], FAN_OUT);

    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].kind, LeakKind::ScopeVariable);
    assert!(
        leaks[0]
            .lines
            .iter()
            .any(|l| l.contains("captured as `savedElement`"))
            && leaks[0].lines.iter().any(|l| l.contains("0x40"))
    );
    assert!(
        leaks[0]
            .lines
            .iter()
            .any(|l| l.contains("use(savedElement);"))
    );
}

#[test]
fn owner_crossing_without_a_call_frame_is_silently_skipped() {
    let mut graph = ObjectGraph::new();
    let member = node(&mut graph, 0x10, "JS Object (Object)");
    let foreign = node(&mut graph, 0x20, "JS Object (Object)");
    graph.add_edge(Address(0x20), Address(0x10), "plainRef");

    let record = WrapperRecord {
        src: member,
        dst: foreign,
        label: "plainRef".to_string(),
        direction: CrossingDirection::Owner,
    };
    let leaks = classify(&graph, &FakeIntrospector::default(), &[record], FAN_OUT);

    // No record at all, and no fall-through to the generic dump
    assert!(leaks.is_empty());
}

#[test]
fn generic_dump_caps_fan_out() {
    let mut graph = ObjectGraph::new();
    let member = node(&mut graph, 0x10, "JS Object (Object)");
    let foreign = node(&mut graph, 0x20, "JS Object (Object)");
    graph.add_edge(Address(0x10), Address(0x20), "cross");
    for i in 0..6u64 {
        node(&mut graph, 0x100 + i, "JS Object (Object)");
        graph.add_edge(Address(0x10), Address(0x100 + i), &format!("slot{}", i));
    }

    let record = WrapperRecord {
        src: member,
        dst: foreign,
        label: "EDGE:cross".to_string(),
        direction: CrossingDirection::Edge,
    };
    let leaks = classify(&graph, &FakeIntrospector::default(), &[record], 3);

    assert_eq!(leaks[0].kind, LeakKind::Generic);
    // 7 outgoing edges, 3 rendered, 4 omitted
    assert!(
        leaks[0]
            .lines
            .iter()
            .any(|l| l.contains("(4 more edges omitted)"))
    );
    assert_eq!(
        leaks[0]
            .lines
            .iter()
            .filter(|l| l.starts_with(" * edge."))
            .count(),
        3
    );
}

#[test]
fn generic_dump_survives_reference_cycles() {
    let mut graph = ObjectGraph::new();
    let member = node(&mut graph, 0x10, "JS Object (Proxy)");
    let foreign = node(&mut graph, 0x20, "JS Object (Object)");
    node(&mut graph, 0x30, "JS Object (Proxy)");
    graph.add_edge(Address(0x10), Address(0x20), "cross");
    // Two proxies whose private edges point at each other
    graph.add_edge(Address(0x10), Address(0x30), "private");
    graph.add_edge(Address(0x30), Address(0x10), "private");
    // A second owner keeps the listener pattern out of the way
    graph.add_edge(Address(0x20), Address(0x10), "back");

    let record = WrapperRecord {
        src: member,
        dst: foreign,
        label: "EDGE:cross".to_string(),
        direction: CrossingDirection::Edge,
    };
    let leaks = classify(&graph, &FakeIntrospector::default(), &[record], FAN_OUT);

    assert_eq!(leaks.len(), 1);
    assert!(
        leaks[0]
            .lines
            .iter()
            .any(|l| l.contains("(already dumped)"))
    );
}

#[test]
fn global_path_outcomes() {
    let mut graph = ObjectGraph::new();
    let object = node(&mut graph, 0x10, "JS Object (Object)");
    let global = node(&mut graph, 0x20, "JS Object (Object)");
    let orphan = node(&mut graph, 0x30, "JS Object (Object)");
    let proxy = node(&mut graph, 0x40, "JS Object (Proxy)");
    let looped = node(&mut graph, 0x50, "JS Object (Object)");

    let mut fake = FakeIntrospector::with_handles(&[0x10, 0x20, 0x40, 0x50, 0x51]);
    fake.set_parent(0x10, 0x900);
    fake.set_parent(0x900, 0x901);
    // Artificial parent cycle
    fake.set_parent(0x50, 0x51);
    fake.set_parent(0x51, 0x50);

    assert_eq!(
        resolve_global_path(&graph, object, &fake),
        GlobalPath::Found {
            global: Address(0x901),
            path: vec![Address(0x10), Address(0x900), Address(0x901)],
        }
    );
    assert_eq!(
        resolve_global_path(&graph, global, &fake),
        GlobalPath::AlreadyGlobal
    );
    assert_eq!(
        resolve_global_path(&graph, orphan, &fake),
        GlobalPath::Unresolved
    );
    assert_eq!(
        resolve_global_path(&graph, proxy, &fake),
        GlobalPath::NotApplicable
    );
    assert_eq!(
        resolve_global_path(&graph, looped, &fake),
        GlobalPath::Unresolved
    );
}

#[test]
fn rendered_report_matches_the_expected_shape() {
    let mut graph = ObjectGraph::new();
    node(&mut graph, 0x10, "JS Object (Object)");
    node(&mut graph, 0x20, "JS Object (Object)");
    graph.add_edge(Address(0x10), Address(0x20), "cache");

    let mut fake = FakeIntrospector::default();
    fake.set_domain(0x10, 1);
    fake.set_domain(0x20, 2);
    fake.set_parent(0x10, 0x900);
    fake.properties.insert(
        0x10,
        vec![
            ("status".to_string(), PropertyValue::Str("open".to_string())),
            ("onload".to_string(), PropertyValue::Function),
        ],
    );
    resolve_domains(&mut graph, &fake);

    let members = vec![graph.node_id(Address(0x10)).unwrap()];
    let crossings = detect_wrappers(&graph, &Domain(1), &members, &fake);
    let leaks = classify(&graph, &fake, &crossings, FAN_OUT);

    let report = Report {
        started_at: chrono::Utc::now(),
        node_count: graph.len(),
        suspects: vec![Address(0x10)],
        leaks,
    };
    insta::assert_snapshot!(report.render(), @r"
    # objects in capture: 2
    # suspects: 0x10

    ############################################################################
    link edge name: EDGE:cache
     --- LEAK TARGET
    >>> src 0x10 - JS Object (Object)
     * global: 0x900
     * edge.cache 0x20=JS Object (Object)
     * prop.status = open
     * prop.onload = -function-
     --- LEAK SOURCE
    >>> leak source 0x20 - JS Object (Object)
     * owner.cache 0x10=JS Object (Object) global:0x900
    ");
}

#[test]
fn leak_records_serialize_for_downstream_consumers() {
    let record = leakscope::analyze::LeakRecord {
        link: "EDGE:cache".to_string(),
        src: Address(0x10),
        dst: Address(0x20),
        kind: LeakKind::Generic,
        lines: vec![" --- LEAK TARGET".to_string()],
    };
    let json = serde_json::to_string(&record).unwrap();
    assert!(json.contains("\"src\":\"0x10\""));
    assert!(json.contains("\"kind\":\"Generic\""));
}
