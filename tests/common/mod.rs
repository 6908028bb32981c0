//! Shared test fixtures: a scripted trace source and a table-driven
//! introspector fake.

use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::anyhow;
use async_trait::async_trait;

use leakscope::graph::Address;
use leakscope::inspect::{Domain, GlobalDescription, Handle, ObjectIntrospector, PropertyValue};
use leakscope::source::{TraceError, TraceEvent, TraceSource};

/// Replays a fixed event script and records how it was driven
pub struct ScriptedTraceSource {
    events: VecDeque<TraceEvent>,
    script: Vec<TraceEvent>,
    /// Fail `next_event` after this many events have been emitted
    fail_after: Option<usize>,
    emitted: usize,
    pub collect_passes: usize,
    pub captures: Vec<bool>,
}

impl ScriptedTraceSource {
    pub fn new(events: Vec<TraceEvent>) -> Self {
        Self {
            events: events.clone().into(),
            script: events,
            fail_after: None,
            emitted: 0,
            collect_passes: 0,
            captures: Vec::new(),
        }
    }

    pub fn failing_after(events: Vec<TraceEvent>, fail_after: usize) -> Self {
        let mut source = Self::new(events);
        source.fail_after = Some(fail_after);
        source
    }
}

#[async_trait]
impl TraceSource for ScriptedTraceSource {
    async fn collect_pass(&mut self) -> Result<(), TraceError> {
        self.collect_passes += 1;
        Ok(())
    }

    async fn begin_capture(&mut self, all_traces: bool) -> Result<(), TraceError> {
        self.captures.push(all_traces);
        // Every capture replays the script from the top
        self.events = self.script.clone().into();
        self.emitted = 0;
        Ok(())
    }

    fn next_event(&mut self) -> Result<Option<TraceEvent>, TraceError> {
        if let Some(limit) = self.fail_after {
            if self.emitted >= limit {
                return Err(TraceError::Read(anyhow!("scripted failure")));
            }
        }
        self.emitted += 1;
        Ok(self.events.pop_front())
    }
}

/// Table-driven introspector; addresses not in a table simply miss
#[derive(Default)]
pub struct FakeIntrospector {
    pub handles: HashSet<u64>,
    pub domains: HashMap<u64, u64>,
    pub parents: HashMap<u64, u64>,
    pub properties: HashMap<u64, Vec<(String, PropertyValue)>>,
    pub sources: HashMap<u64, String>,
    pub globals: HashMap<u64, GlobalDescription>,
}

impl FakeIntrospector {
    pub fn with_handles(addresses: &[u64]) -> Self {
        Self {
            handles: addresses.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn set_domain(&mut self, address: u64, domain: u64) {
        self.handles.insert(address);
        self.domains.insert(address, domain);
    }

    pub fn set_parent(&mut self, address: u64, parent: u64) {
        self.handles.insert(address);
        self.parents.insert(address, parent);
    }
}

impl ObjectIntrospector for FakeIntrospector {
    fn resolve_handle(&self, address: Address) -> Option<Handle> {
        self.handles.contains(&address.0).then(|| Handle::new(address))
    }

    fn domain_of(&self, handle: &Handle) -> Option<Domain> {
        self.domains.get(&handle.address().0).copied().map(Domain)
    }

    fn domain_equals(&self, a: &Domain, b: &Domain) -> bool {
        a.0 == b.0
    }

    fn class_name_of(&self, _handle: &Handle) -> Option<String> {
        None
    }

    fn parent_of(&self, handle: &Handle) -> Option<Handle> {
        self.parents
            .get(&handle.address().0)
            .map(|&p| Handle::new(Address(p)))
    }

    fn enumerate_properties(&self, handle: &Handle, limit: usize) -> Vec<(String, PropertyValue)> {
        self.properties
            .get(&handle.address().0)
            .map(|props| props.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    fn get_property(&self, handle: &Handle, name: &str) -> PropertyValue {
        self.properties
            .get(&handle.address().0)
            .and_then(|props| props.iter().find(|(n, _)| n == name))
            .map(|(_, v)| v.clone())
            .unwrap_or(PropertyValue::Undefined)
    }

    fn decompile_function(&self, handle: &Handle) -> Option<String> {
        self.sources.get(&handle.address().0).cloned()
    }

    fn describe_global(&self, handle: &Handle) -> GlobalDescription {
        self.globals
            .get(&handle.address().0)
            .cloned()
            .unwrap_or(GlobalDescription::Other {
                class_name: "Unknown".to_string(),
                attrs: Vec::new(),
            })
    }
}

/// Shorthand event constructors
pub fn ref_counted(address: u64, ref_count: u32, description: &str) -> TraceEvent {
    TraceEvent::RefCounted {
        address: Address(address),
        ref_count,
        description: description.to_string(),
    }
}

pub fn traced(address: u64, marked: bool, description: &str) -> TraceEvent {
    TraceEvent::Traced {
        address: Address(address),
        marked,
        description: description.to_string(),
    }
}

pub fn edge(from: u64, to: u64, label: &str) -> TraceEvent {
    TraceEvent::Edge {
        from: Address(from),
        to: Address(to),
        label: label.to_string(),
    }
}
