//! Host document model - the externally owned element pool.
//!
//! Widgets mount onto elements the host platform owns. This module models
//! that platform as a single-threaded element arena:
//! - Elements are indices (`NodeId`) into a thread-local arena
//! - Each element has a tag, an optional document id, string attributes,
//!   and a parent/children relationship
//! - A node has at most one parent; attaching detaches from the old parent
//!
//! The resolver claims elements out of this pool by document id, and the
//! mount controller reads and strips the serialized configuration attribute.

use std::cell::RefCell;
use std::collections::HashMap;

// =============================================================================
// Node Id
// =============================================================================

/// Handle to one element in the host arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

// =============================================================================
// Arena State
// =============================================================================

struct NodeData {
    tag: String,
    dom_id: Option<String>,
    attributes: HashMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

thread_local! {
    /// All elements ever created, indexed by NodeId.
    static NODES: RefCell<Vec<NodeData>> = RefCell::new(Vec::new());

    /// Document id -> element lookup.
    static ID_LOOKUP: RefCell<HashMap<String, NodeId>> = RefCell::new(HashMap::new());
}

// =============================================================================
// Element Creation
// =============================================================================

/// Create a detached element with the given tag.
pub fn create_element(tag: &str) -> NodeId {
    NODES.with(|nodes| {
        let mut nodes = nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(NodeData {
            tag: tag.to_string(),
            dom_id: None,
            attributes: HashMap::new(),
            parent: None,
            children: Vec::new(),
        });
        id
    })
}

/// Assign a document id to an element and register it for lookup.
///
/// Re-assigning replaces the previous registration; ids are expected to be
/// unique document-wide, as on the host platform.
pub fn set_dom_id(node: NodeId, id: &str) {
    let previous = NODES.with(|nodes| {
        let mut nodes = nodes.borrow_mut();
        nodes[node.0].dom_id.replace(id.to_string())
    });
    ID_LOOKUP.with(|lookup| {
        let mut lookup = lookup.borrow_mut();
        if let Some(old) = previous {
            lookup.remove(&old);
        }
        lookup.insert(id.to_string(), node);
    });
}

/// Look up an element by document id.
pub fn get_element_by_id(id: &str) -> Option<NodeId> {
    ID_LOOKUP.with(|lookup| lookup.borrow().get(id).copied())
}

/// Document id of an element, if assigned.
pub fn dom_id(node: NodeId) -> Option<String> {
    NODES.with(|nodes| nodes.borrow()[node.0].dom_id.clone())
}

/// Tag name of an element.
pub fn tag_of(node: NodeId) -> String {
    NODES.with(|nodes| nodes.borrow()[node.0].tag.clone())
}

/// All elements currently in the arena, in creation order.
pub fn all_elements() -> Vec<NodeId> {
    NODES.with(|nodes| (0..nodes.borrow().len()).map(NodeId).collect())
}

// =============================================================================
// Attributes
// =============================================================================

/// Set an attribute value.
pub fn set_attribute(node: NodeId, name: &str, value: &str) {
    NODES.with(|nodes| {
        nodes.borrow_mut()[node.0]
            .attributes
            .insert(name.to_string(), value.to_string());
    });
}

/// Get an attribute value.
pub fn get_attribute(node: NodeId, name: &str) -> Option<String> {
    NODES.with(|nodes| nodes.borrow()[node.0].attributes.get(name).cloned())
}

/// Remove an attribute. Removing an absent attribute is a no-op.
pub fn remove_attribute(node: NodeId, name: &str) {
    NODES.with(|nodes| {
        nodes.borrow_mut()[node.0].attributes.remove(name);
    });
}

/// Check whether the element's `class` attribute contains `class_name`
/// as a whitespace-separated token.
pub fn has_class(node: NodeId, class_name: &str) -> bool {
    match get_attribute(node, "class") {
        Some(classes) => classes.split_whitespace().any(|c| c == class_name),
        None => false,
    }
}

// =============================================================================
// Tree Structure
// =============================================================================

/// Parent of an element, if attached.
pub fn parent_of(node: NodeId) -> Option<NodeId> {
    NODES.with(|nodes| nodes.borrow()[node.0].parent)
}

/// Children of an element, in attachment order.
pub fn children_of(node: NodeId) -> Vec<NodeId> {
    NODES.with(|nodes| nodes.borrow()[node.0].children.clone())
}

/// Detach an element from its parent. Detaching an already-detached
/// element is a no-op.
pub fn detach(node: NodeId) {
    NODES.with(|nodes| {
        let mut nodes = nodes.borrow_mut();
        let Some(parent) = nodes[node.0].parent.take() else {
            return;
        };
        nodes[parent.0].children.retain(|c| *c != node);
    });
}

/// Append `child` as the last child of `parent`, detaching it from any
/// previous parent first. A node always has at most one parent.
///
/// Appending a node to itself is ignored.
pub fn append_child(parent: NodeId, child: NodeId) {
    if parent == child {
        return;
    }
    detach(child);
    NODES.with(|nodes| {
        let mut nodes = nodes.borrow_mut();
        nodes[child.0].parent = Some(parent);
        nodes[parent.0].children.push(child);
    });
}

// =============================================================================
// Reset (for testing)
// =============================================================================

/// Reset the whole arena (for testing).
pub fn reset_host() {
    NODES.with(|nodes| nodes.borrow_mut().clear());
    ID_LOOKUP.with(|lookup| lookup.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_lookup() {
        reset_host();

        let el = create_element("div");
        assert_eq!(get_element_by_id("a"), None);

        set_dom_id(el, "a");
        assert_eq!(get_element_by_id("a"), Some(el));
        assert_eq!(dom_id(el), Some("a".to_string()));
        assert_eq!(tag_of(el), "div");
    }

    #[test]
    fn test_attributes() {
        reset_host();

        let el = create_element("div");
        assert_eq!(get_attribute(el, "data-props"), None);

        set_attribute(el, "data-props", "{}");
        assert_eq!(get_attribute(el, "data-props"), Some("{}".to_string()));

        remove_attribute(el, "data-props");
        assert_eq!(get_attribute(el, "data-props"), None);

        // Removing again is a no-op
        remove_attribute(el, "data-props");
        assert_eq!(get_attribute(el, "data-props"), None);
    }

    #[test]
    fn test_class_tokens() {
        reset_host();

        let el = create_element("div");
        set_attribute(el, "class", "custom-input shaded");

        assert!(has_class(el, "custom-input"));
        assert!(has_class(el, "shaded"));
        assert!(!has_class(el, "custom"));
    }

    #[test]
    fn test_single_parent_invariant() {
        reset_host();

        let a = create_element("div");
        let b = create_element("div");
        let child = create_element("span");

        append_child(a, child);
        assert_eq!(parent_of(child), Some(a));
        assert_eq!(children_of(a), vec![child]);

        // Re-appending under a different parent moves the node
        append_child(b, child);
        assert_eq!(parent_of(child), Some(b));
        assert!(children_of(a).is_empty());
        assert_eq!(children_of(b), vec![child]);
    }

    #[test]
    fn test_detach_idempotent() {
        reset_host();

        let parent = create_element("div");
        let child = create_element("span");
        append_child(parent, child);

        detach(child);
        assert_eq!(parent_of(child), None);
        assert!(children_of(parent).is_empty());

        // Second detach is a no-op
        detach(child);
        assert_eq!(parent_of(child), None);
    }

    #[test]
    fn test_self_append_ignored() {
        reset_host();

        let el = create_element("div");
        append_child(el, el);
        assert_eq!(parent_of(el), None);
        assert!(children_of(el).is_empty());
    }
}
