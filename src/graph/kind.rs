//! Node kind definitions
//!
//! The cycle collector reports every object with a raw display name such as
//! `"JS Object (Function - doLoad)"` or `"nsEventListenerManager"`. This
//! module decodes those names into a closed enum exactly once, at ingestion
//! time, so that downstream analysis matches on a tag instead of performing
//! substring dispatch over display strings.

use serde::Serialize;

/// Closed set of object kinds recognized by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    /// Plain script object (`JS Object (Object)` and subclasses)
    PlainObject,
    /// Function object, optionally named in the raw description
    Function,
    /// Cross-compartment proxy; transparent for reporting purposes
    Proxy,
    /// Call scope capturing the variables of an activation (`JS Object (Call)`)
    CallFrame,
    /// Reflected native event listener (`nsXPCWrappedJS (nsIDOMEventListener)`)
    EventListener,
    /// Native event listener manager (`nsEventListenerManager`)
    EventManager,
    /// Global object: window, chrome window or script-loader global
    Global,
    /// Sandboxed global created by the module loader
    Sandbox,
    /// Anything the decoder does not recognize (native objects, fragments, ...)
    Other,
}

impl NodeKind {
    /// Decode a raw cycle-collector description into a kind tag
    ///
    /// The match order mirrors the display-name conventions of the trace
    /// source: script objects are prefixed with `JS Object (`, native
    /// objects carry their class name directly.
    pub fn decode(description: &str) -> Self {
        if description == "JS Object (Proxy)" {
            return NodeKind::Proxy;
        }
        if description == "JS Object (Call)" {
            return NodeKind::CallFrame;
        }
        if description.starts_with("JS Object (Object") {
            return NodeKind::PlainObject;
        }
        if description.starts_with("JS Object (Function") {
            return NodeKind::Function;
        }
        if description.starts_with("JS Object (Window")
            || description.starts_with("JS Object (ChromeWindow")
            || description.eq_ignore_ascii_case("BackstagePass")
        {
            return NodeKind::Global;
        }
        if description == "Sandbox" {
            return NodeKind::Sandbox;
        }
        if description == "nsXPCWrappedJS (nsIDOMEventListener)" {
            return NodeKind::EventListener;
        }
        if description == "nsEventListenerManager" {
            return NodeKind::EventManager;
        }
        NodeKind::Other
    }

    /// Whether this kind denotes a managed-language object
    ///
    /// Managed objects have a live handle resolvable through the
    /// introspector and belong to an isolation domain. Native bookkeeping
    /// objects (event managers) and unrecognized objects do not.
    pub fn is_managed(&self) -> bool {
        !matches!(self, NodeKind::EventManager | NodeKind::Other)
    }

    /// Get the display name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::PlainObject => "PlainObject",
            NodeKind::Function => "Function",
            NodeKind::Proxy => "Proxy",
            NodeKind::CallFrame => "CallFrame",
            NodeKind::EventListener => "EventListener",
            NodeKind::EventManager => "EventManager",
            NodeKind::Global => "Global",
            NodeKind::Sandbox => "Sandbox",
            NodeKind::Other => "Other",
        }
    }
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Other
    }
}
