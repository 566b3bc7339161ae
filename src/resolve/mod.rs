//! Resource reference resolution - rehydrating embedded host elements.
//!
//! A parsed configuration tree may contain placeholder objects of the form
//! `{"__ref__": "<document id>"}` standing in for live elements the host
//! already owns elsewhere on the page. Resolution rewrites each placeholder
//! into a [`Portal`]: the element is claimed out of the host pool (detached
//! from its old parent, re-attached under the widget's container) and the
//! tree position holds a handle to it from then on.
//!
//! The pass is pure with respect to its input: it builds a fresh [`Prop`]
//! tree and never mutates the parsed `Value`, so a host that retains the
//! parsed configuration never observes resolution side effects.

use serde_json::{Map, Value};
use tracing::warn;

use crate::host::{self, NodeId};

// =============================================================================
// Constants
// =============================================================================

/// Reserved discriminant key marking a mapping node as a resource reference.
pub const REF_KEY: &str = "__ref__";

/// Recursion limit for one resolve pass.
///
/// Parsed trees are finite, but a pathologically nested configuration could
/// still exhaust the stack; past this depth the remaining subtree is passed
/// through unresolved with one diagnostic, the same recoverable outcome as
/// an unknown identifier.
pub const MAX_RESOLVE_DEPTH: usize = 128;

// =============================================================================
// Resolved Property Tree
// =============================================================================

/// A rehydrated resource: the claimed element and the container that now
/// physically owns it. The logical tree position and the physical parent
/// differ on purpose - this is the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Portal {
    /// The claimed host element.
    pub resource: NodeId,
    /// The container the element was re-attached under.
    pub container: NodeId,
}

/// A property tree after resolution.
///
/// Structurally a JSON tree, except that resolved references have become
/// [`Portal`] nodes. Object entries keep the insertion order of the
/// serialized configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Prop {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<Prop>),
    Object(Vec<(String, Prop)>),
    Portal(Portal),
}

impl Prop {
    /// The empty configuration: an object with no entries.
    pub fn empty_object() -> Self {
        Prop::Object(Vec::new())
    }

    /// Entry lookup on object nodes; `None` on every other variant.
    pub fn get(&self, key: &str) -> Option<&Prop> {
        match self {
            Prop::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Whether this node is a resolved portal.
    pub fn is_portal(&self) -> bool {
        matches!(self, Prop::Portal(_))
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolve every resource reference in `tree`, claiming the referenced
/// elements into `container`.
///
/// - Scalars pass through unchanged.
/// - Lists resolve element-wise; order and length are invariant.
/// - Objects are tested against the reference predicate first; only
///   non-reference objects are recursed into.
/// - A reference whose identifier matches a host element detaches that
///   element (a no-op if already detached), appends it under `container`,
///   and becomes a [`Portal`]. The element ends up with exactly one parent.
/// - A reference whose identifier matches nothing passes through unchanged
///   after one diagnostic; the rest of the tree still resolves.
///
/// Precondition: each identifier is claimed by at most one resolve call.
/// Claiming the same identifier twice moves the element again; the resolver
/// does not defend against it.
pub fn resolve(tree: &Value, container: NodeId) -> Prop {
    resolve_at(tree, container, 0)
}

fn resolve_at(tree: &Value, container: NodeId, depth: usize) -> Prop {
    if depth >= MAX_RESOLVE_DEPTH {
        warn!(
            max_depth = MAX_RESOLVE_DEPTH,
            "configuration nesting exceeds resolve depth; subtree left unresolved"
        );
        return literal(tree);
    }

    match tree {
        Value::Null => Prop::Null,
        Value::Bool(b) => Prop::Bool(*b),
        Value::Number(n) => Prop::Number(n.clone()),
        Value::String(s) => Prop::String(s.clone()),
        Value::Array(items) => Prop::List(
            items
                .iter()
                .map(|item| resolve_at(item, container, depth + 1))
                .collect(),
        ),
        Value::Object(entries) => match reference_id(entries) {
            Some(id) => resolve_reference(entries, id, container),
            None => Prop::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), resolve_at(value, container, depth + 1)))
                    .collect(),
            ),
        },
    }
}

/// The reference predicate: an object is a reference iff it carries the
/// discriminant key. Returns the identifier when it is a string; an object
/// that carries the key with a non-string value is still a reference (and
/// therefore not recursed into), just an unresolvable one.
fn reference_id(entries: &Map<String, Value>) -> Option<Option<&str>> {
    entries.get(REF_KEY).map(Value::as_str)
}

fn resolve_reference(entries: &Map<String, Value>, id: Option<&str>, container: NodeId) -> Prop {
    let Some(id) = id else {
        warn!("resource reference carries a non-string identifier; left unresolved");
        return literal_object(entries);
    };

    match host::get_element_by_id(id) {
        Some(resource) => {
            // Claim: detach from wherever the host left it and hand it to
            // the widget's container. append_child detaches first, so the
            // single-parent invariant holds.
            host::append_child(container, resource);
            Prop::Portal(Portal { resource, container })
        }
        None => {
            warn!(identifier = id, "resource reference matches no host element");
            literal_object(entries)
        }
    }
}

// =============================================================================
// Literal Conversion
// =============================================================================

/// Structural conversion with no reference handling, used to pass a subtree
/// through untouched.
///
/// Iterative on an explicit work stack: the resolver's depth guard does not
/// apply here (the whole point is to carry over-deep subtrees through
/// unchanged), so conversion depth must be bounded by the heap, not the
/// call stack.
fn literal(tree: &Value) -> Prop {
    enum Task<'a> {
        Convert(&'a Value),
        BuildList(usize),
        BuildObject(Vec<&'a String>),
    }

    let mut tasks = vec![Task::Convert(tree)];
    let mut done: Vec<Prop> = Vec::new();

    while let Some(task) = tasks.pop() {
        match task {
            Task::Convert(value) => match value {
                Value::Null => done.push(Prop::Null),
                Value::Bool(b) => done.push(Prop::Bool(*b)),
                Value::Number(n) => done.push(Prop::Number(n.clone())),
                Value::String(s) => done.push(Prop::String(s.clone())),
                Value::Array(items) => {
                    tasks.push(Task::BuildList(items.len()));
                    // Reversed so children convert (and land on `done`)
                    // left to right
                    for item in items.iter().rev() {
                        tasks.push(Task::Convert(item));
                    }
                }
                Value::Object(entries) => {
                    tasks.push(Task::BuildObject(entries.keys().collect()));
                    for (_, value) in entries.iter().rev() {
                        tasks.push(Task::Convert(value));
                    }
                }
            },
            Task::BuildList(len) => {
                let items = done.split_off(done.len() - len);
                done.push(Prop::List(items));
            }
            Task::BuildObject(keys) => {
                let values = done.split_off(done.len() - keys.len());
                done.push(Prop::Object(
                    keys.into_iter().cloned().zip(values).collect(),
                ));
            }
        }
    }

    // Each Convert leaves exactly one finished Prop once the stack drains
    done.pop().unwrap_or(Prop::Null)
}

fn literal_object(entries: &Map<String, Value>) -> Prop {
    Prop::Object(
        entries
            .iter()
            .map(|(key, value)| (key.clone(), literal(value)))
            .collect(),
    )
}
