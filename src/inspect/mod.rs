//! Object introspection seam
//!
//! The analyzer never touches the observed heap itself. Everything that
//! needs a live object - resolving an address to a handle, reading a
//! property, decompiling a function - goes through the [`ObjectIntrospector`]
//! trait, implemented by the host embedding. Tests substitute a scripted
//! fake or a mock.

use std::fmt;

use serde::Serialize;

use crate::graph::Address;

/// Opaque reference to a live object, obtained from its address
///
/// Handles compare by address: the trace source guarantees one address per
/// object within a capture. Domain identity is a different matter, see
/// [`Domain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    address: Address,
}

impl Handle {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

/// Opaque isolation-domain token
///
/// Two distinct token values may denote the same domain, so equality is
/// only decidable through [`ObjectIntrospector::domain_equals`]. The
/// analyzer never compares tokens directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Domain(pub u64);

/// Value of a property read through the introspector
///
/// Misses are recorded as sentinel values in the report rather than raised
/// as errors; `Display` renders the sentinels the report format uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PropertyValue {
    Str(String),
    Function,
    Undefined,
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Str(s) => f.write_str(s),
            PropertyValue::Function => f.write_str("-function-"),
            PropertyValue::Undefined => f.write_str("-undefined-"),
        }
    }
}

/// Structured description of a global object
///
/// The shape depends on what kind of global the handle denotes. Producing
/// it is the introspector's duty, including the re-evaluation fallback for
/// window globals whose direct `location` read yields the literal string
/// `"true"` instead of the real value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "global", rename_all = "snake_case")]
pub enum GlobalDescription {
    /// Plain script-loader global, identified by the URI it was loaded from
    ScriptLoader { uri: String },
    /// Sandboxed module global with resolvable module metadata
    SandboxModule { uri: String, id: String },
    /// Sandboxed global without module metadata; falls back to attributes
    SandboxAttrs { attrs: Vec<(String, String)> },
    /// Window-like global identified by its location string
    Window { location: String },
    /// Any other global: class name plus a bounded attribute enumeration
    Other {
        class_name: String,
        attrs: Vec<(String, String)>,
    },
}

/// Native object introspection capabilities
///
/// All operations are fallible in the "miss" sense only: a missing handle or
/// unreadable property is reported through `Option` / sentinel values and
/// never aborts an analysis.
#[cfg_attr(test, mockall::automock)]
pub trait ObjectIntrospector {
    /// Resolve an address from the capture into a live handle
    fn resolve_handle(&self, address: Address) -> Option<Handle>;

    /// Isolation domain of a live object
    fn domain_of(&self, handle: &Handle) -> Option<Domain>;

    /// Whether two domain tokens denote the same domain
    fn domain_equals(&self, a: &Domain, b: &Domain) -> bool;

    /// Class name of a live object
    fn class_name_of(&self, handle: &Handle) -> Option<String>;

    /// Scope parent of an object; `None` means the object is a global
    fn parent_of(&self, handle: &Handle) -> Option<Handle>;

    /// Enumerate up to `limit` own properties, in enumeration order
    fn enumerate_properties(&self, handle: &Handle, limit: usize) -> Vec<(String, PropertyValue)>;

    /// Read a single property
    fn get_property(&self, handle: &Handle, name: &str) -> PropertyValue;

    /// Decompiled source of a function object, if the handle is a function
    fn decompile_function(&self, handle: &Handle) -> Option<String>;

    /// Structured description of a global object
    fn describe_global(&self, handle: &Handle) -> GlobalDescription;
}
