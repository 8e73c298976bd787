//! Koji callback events as received from the hub.
//!
//! The hub fires a callback for every lifecycle hook, once before the change
//! (`pre*`) and once after it (`post*`). [`CallbackType`] models that closed
//! set; anything the table does not know is kept verbatim in
//! [`CallbackType::Other`] so it can still be forwarded.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// CallbackType
// ---------------------------------------------------------------------------

/// Whether a callback fires before or after the hub applies the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pre,
    Post,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

/// Lifecycle hooks the hub exposes to plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    PackageListChange,
    TaskStateChange,
    BuildStateChange,
    Import,
    RpmSign,
    Tag,
    Untag,
    RepoInit,
    RepoDone,
}

impl Hook {
    /// Every known hook, in the order the hub registers them.
    pub const ALL: [Hook; 9] = [
        Hook::PackageListChange,
        Hook::TaskStateChange,
        Hook::BuildStateChange,
        Hook::Import,
        Hook::RpmSign,
        Hook::Tag,
        Hook::Untag,
        Hook::RepoInit,
        Hook::RepoDone,
    ];

    /// Hook name as it appears after the phase prefix, e.g. `RPMSign`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PackageListChange => "PackageListChange",
            Self::TaskStateChange => "TaskStateChange",
            Self::BuildStateChange => "BuildStateChange",
            Self::Import => "Import",
            Self::RpmSign => "RPMSign",
            Self::Tag => "Tag",
            Self::Untag => "Untag",
            Self::RepoInit => "RepoInit",
            Self::RepoDone => "RepoDone",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|hook| hook.as_str() == name)
    }
}

/// The kind of a callback event, e.g. `postTag`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallbackType {
    /// A hook from the known table.
    Hook(Phase, Hook),
    /// Any other callback name, forwarded without extra routing segments.
    Other(String),
}

impl CallbackType {
    pub fn pre(hook: Hook) -> Self {
        Self::Hook(Phase::Pre, hook)
    }

    pub fn post(hook: Hook) -> Self {
        Self::Hook(Phase::Post, hook)
    }

    /// The hook this callback belongs to, if it is a known one.
    pub fn hook(&self) -> Option<Hook> {
        match self {
            Self::Hook(_, hook) => Some(*hook),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for CallbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hook(phase, hook) => write!(f, "{}{}", phase.as_str(), hook.as_str()),
            Self::Other(name) => f.write_str(name),
        }
    }
}

impl FromStr for CallbackType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let known = [Phase::Pre, Phase::Post].into_iter().find_map(|phase| {
            s.strip_prefix(phase.as_str())
                .and_then(Hook::from_name)
                .map(|hook| Self::Hook(phase, hook))
        });
        Ok(known.unwrap_or_else(|| Self::Other(s.to_string())))
    }
}

impl From<&str> for CallbackType {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<String> for CallbackType {
    fn from(s: String) -> Self {
        CallbackType::from(s.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// One callback invocation: its kind, named attributes and positional extras.
///
/// Built with [`Event::new`] and the `with_*` methods, or in one go from the
/// callback's arguments with [`Event::from_callback`].
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: CallbackType,
    /// Named keyword data passed by the hub (`tag`, `build`, `user`, ...).
    pub attributes: Map<String, Value>,
    /// Positional extras, forwarded as `args` in the payload when present.
    pub args: Vec<Value>,
}

impl Event {
    /// Create an event with no attributes or positional extras.
    pub fn new(kind: impl Into<CallbackType>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Map::new(),
            args: Vec::new(),
        }
    }

    /// Build an event from the callback's `(kind, *args, **kwargs)` shape.
    pub fn from_callback(
        kind: impl Into<CallbackType>,
        args: Vec<Value>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            kind: kind.into(),
            attributes,
            args,
        }
    }

    /// Set one named attribute, replacing any previous value.
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Merge the entries of a JSON object into the attributes.
    ///
    /// Non-object values are ignored.
    pub fn with_attributes(mut self, attributes: Value) -> Self {
        if let Value::Object(map) = attributes {
            self.attributes.extend(map);
        }
        self
    }

    /// Append a positional extra.
    pub fn with_arg(mut self, arg: Value) -> Self {
        self.args.push(arg);
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
