//! Routing-key derivation for callback events.
//!
//! A key starts with the configured prefix and the callback name, followed
//! by the identifying fields of the event's hook:
//!
//! | hook                | extra segments                                            |
//! |---------------------|-----------------------------------------------------------|
//! | `PackageListChange` | tag.name, package.name                                    |
//! | `TaskStateChange`   | attribute, old, new                                       |
//! | `BuildStateChange`  | info.name, info.version, info.release, attribute, old, new |
//! | `Import`            | type                                                      |
//! | `Tag` / `Untag`     | tag.name, build.name, build.version, build.release, user.name |
//! | `RepoInit`          | tag.name                                                  |
//! | `RepoDone`          | repo.tag_name                                             |
//! | anything else       | none                                                      |
//!
//! The joined key is cut to [`MAX_KEY_LENGTH`] characters and only then are
//! non-ASCII characters replaced by `&#NNNN;` references, so an escaped key
//! can be longer than the limit. Consumers already bind against keys built
//! this way.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::EncodeError;
use crate::event::{Event, Hook};

/// Maximum number of characters kept before escaping.
pub const MAX_KEY_LENGTH: usize = 255;

/// Separator between routing-key segments.
pub const SEPARATOR: char = '.';

/// An ASCII-only routing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey(String);

impl RoutingKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoutingKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the routing key for `event` under the given queue `prefix`.
pub fn derive_routing_key(prefix: &str, event: &Event) -> Result<RoutingKey, EncodeError> {
    let mut segments = vec![prefix.to_string(), event.kind.to_string()];
    if let Some(hook) = event.kind.hook() {
        let fields = Fields {
            event,
            attributes: &event.attributes,
        };
        segments.extend(hook_segments(hook, &fields)?);
    }

    let joined = segments.join(&SEPARATOR.to_string());
    let truncated: String = joined.chars().take(MAX_KEY_LENGTH).collect();
    Ok(RoutingKey(escape_non_ascii(&truncated)))
}

/// Replace every non-ASCII character with a decimal character reference.
pub fn escape_non_ascii(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            out.push_str(&format!("&#{};", u32::from(c)));
        }
    }
    out
}

/// Render a JSON value the way the hub prints it into a key segment.
///
/// Strings are used verbatim, `null` and booleans follow the hub's
/// `None`/`True`/`False` spelling, everything else is compact JSON.
pub fn segment_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// ---- private helpers ----

/// Dotted-path lookups into an event's attributes.
struct Fields<'a> {
    event: &'a Event,
    attributes: &'a Map<String, Value>,
}

impl Fields<'_> {
    fn text(&self, path: &[&str]) -> Result<String, EncodeError> {
        self.lookup(path).map(segment_text)
    }

    fn lookup(&self, path: &[&str]) -> Result<&Value, EncodeError> {
        let missing = || EncodeError::MissingField {
            kind: self.event.kind.to_string(),
            field: path.join("."),
        };

        let (first, rest) = path.split_first().ok_or_else(missing)?;
        let mut value = self.attributes.get(*first).ok_or_else(missing)?;
        for key in rest {
            value = value
                .as_object()
                .and_then(|obj| obj.get(*key))
                .ok_or_else(missing)?;
        }
        Ok(value)
    }
}

fn hook_segments(hook: Hook, fields: &Fields<'_>) -> Result<Vec<String>, EncodeError> {
    let segments = match hook {
        Hook::PackageListChange => vec![
            fields.text(&["tag", "name"])?,
            fields.text(&["package", "name"])?,
        ],
        Hook::TaskStateChange => vec![
            fields.text(&["attribute"])?,
            fields.text(&["old"])?,
            fields.text(&["new"])?,
        ],
        Hook::BuildStateChange => vec![
            fields.text(&["info", "name"])?,
            fields.text(&["info", "version"])?,
            fields.text(&["info", "release"])?,
            fields.text(&["attribute"])?,
            fields.text(&["old"])?,
            fields.text(&["new"])?,
        ],
        Hook::Import => vec![fields.text(&["type"])?],
        Hook::Tag | Hook::Untag => vec![
            fields.text(&["tag", "name"])?,
            fields.text(&["build", "name"])?,
            fields.text(&["build", "version"])?,
            fields.text(&["build", "release"])?,
            fields.text(&["user", "name"])?,
        ],
        Hook::RepoInit => vec![fields.text(&["tag", "name"])?],
        Hook::RepoDone => vec![fields.text(&["repo", "tag_name"])?],
        Hook::RpmSign => Vec::new(),
    };
    Ok(segments)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
