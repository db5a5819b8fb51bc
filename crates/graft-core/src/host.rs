//! Host-tree surface consumed by the reconciler.
//!
//! The reconciler never owns host nodes; it patches them through the
//! [`HostTree`] trait and holds only transient [`HostNodeId`] references
//! during a diff pass. [`MemoryHost`] is the in-memory implementation used
//! by tests and by embedders without a native tree.

use indexmap::IndexMap;

use crate::vnode::{EventHandler, PropValue, StyleValue};

/// Identity of one node in the host tree.
pub type HostNodeId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostNodeKind {
    Text,
    Element,
}

/// Primitive operations the host adapter provides.
///
/// Structural mutators must tolerate detached or missing nodes: diff passes
/// legitimately produce intermediate states where a node has no parent, and
/// the contract there is a guarded no-op, never a fault.
pub trait HostTree {
    fn create_element(&mut self, tag: &str) -> HostNodeId;
    fn create_text(&mut self, text: &str) -> HostNodeId;

    /// `None` when the id does not name a live node.
    fn kind(&self, id: HostNodeId) -> Option<HostNodeKind>;
    fn tag_name(&self, id: HostNodeId) -> Option<String>;
    fn text_content(&self, id: HostNodeId) -> Option<String>;
    fn set_text_content(&mut self, id: HostNodeId, text: &str);

    fn parent(&self, id: HostNodeId) -> Option<HostNodeId>;
    fn child_nodes(&self, id: HostNodeId) -> Vec<HostNodeId>;
    fn next_sibling(&self, id: HostNodeId) -> Option<HostNodeId>;

    /// Moves `child` under `parent`, detaching it from any current parent.
    fn append_child(&mut self, parent: HostNodeId, child: HostNodeId);
    /// Moves `child` directly before `reference` under `parent`.
    fn insert_before(&mut self, parent: HostNodeId, child: HostNodeId, reference: HostNodeId);
    /// Swaps `old_child` out of `parent` for `new_child`, in place.
    fn replace_child(&mut self, parent: HostNodeId, new_child: HostNodeId, old_child: HostNodeId);
    fn remove_child(&mut self, parent: HostNodeId, child: HostNodeId);

    fn attribute_names(&self, id: HostNodeId) -> Vec<String>;
    fn attribute(&self, id: HostNodeId, name: &str) -> Option<String>;
    fn set_attribute(&mut self, id: HostNodeId, name: &str, value: &str);
    fn remove_attribute(&mut self, id: HostNodeId, name: &str);

    /// Whether the node exposes `name` as a writable direct property.
    fn has_property(&self, id: HostNodeId, name: &str) -> bool;
    fn set_property(&mut self, id: HostNodeId, name: &str, value: &str);

    /// Replaces the inline style wholesale.
    fn set_style_text(&mut self, id: HostNodeId, css: &str);
    /// Merges one property into the inline style.
    fn set_style_property(&mut self, id: HostNodeId, name: &str, value: &str);

    /// Binds (or, with `None`, clears) an event handler.
    fn bind_event(&mut self, id: HostNodeId, event: &str, handler: Option<EventHandler>);
}

/// Applies one prop onto a host node.
///
/// The reserved `children` name is skipped; `className` maps to `class`;
/// event-pattern names are lower-cased and bound as handlers (an absent or
/// falsy value clears the binding); `style` merges per-key for entry maps
/// and replaces wholesale for text; remaining names set a writable host
/// property when one exists (falsy values become the empty string) and set
/// or remove the markup attribute depending on truthiness.
pub fn apply_attribute<H: HostTree + ?Sized>(
    host: &mut H,
    id: HostNodeId,
    name: &str,
    value: Option<&PropValue>,
) {
    if name == "children" {
        return;
    }
    let name = if name == "className" { "class" } else { name };

    if is_event_name(name) {
        let event = name.to_ascii_lowercase();
        let handler = value
            .filter(|value| value.is_truthy())
            .and_then(PropValue::as_handler)
            .cloned();
        host.bind_event(id, &event, handler);
        return;
    }

    if name == "style" {
        match value {
            Some(PropValue::Style(StyleValue::Entries(entries))) => {
                for (property, entry) in entries {
                    host.set_style_property(id, property, &entry.css_text());
                }
            }
            Some(PropValue::Style(StyleValue::Text(css))) => host.set_style_text(id, css),
            Some(PropValue::Text(css)) => host.set_style_text(id, css),
            Some(other) => {
                host.set_style_text(id, other.attribute_text().unwrap_or_default().as_str());
            }
            None => host.set_style_text(id, ""),
        }
        return;
    }

    let text = value.and_then(PropValue::attribute_text);
    let truthy = value.is_some_and(PropValue::is_truthy);
    if host.has_property(id, name) {
        let property_value = if truthy {
            text.clone().unwrap_or_default()
        } else {
            String::new()
        };
        host.set_property(id, name, &property_value);
    }
    match text {
        Some(text) if truthy => host.set_attribute(id, name, &text),
        _ => host.remove_attribute(id, name),
    }
}

fn is_event_name(name: &str) -> bool {
    name.len() > 2
        && name.starts_with("on")
        && name[2..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct MemoryNode {
    kind: HostNodeKind,
    tag: String,
    text: String,
    parent: Option<HostNodeId>,
    children: Vec<HostNodeId>,
    attributes: IndexMap<String, String>,
    properties: IndexMap<String, String>,
    style: IndexMap<String, String>,
    style_text: String,
    events: IndexMap<String, EventHandler>,
}

impl MemoryNode {
    fn element(tag: &str) -> Self {
        Self {
            kind: HostNodeKind::Element,
            tag: tag.to_owned(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            style: IndexMap::new(),
            style_text: String::new(),
            events: IndexMap::new(),
        }
    }

    fn text(text: &str) -> Self {
        Self {
            kind: HostNodeKind::Text,
            tag: String::new(),
            text: text.to_owned(),
            parent: None,
            children: Vec::new(),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            style: IndexMap::new(),
            style_text: String::new(),
            events: IndexMap::new(),
        }
    }
}

/// Slab-backed host tree. Ids are never reused, so a stale id reads as a
/// missing node rather than aliasing a newer one.
#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<Option<MemoryNode>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Permanently drops a node and its subtree from the slab.
    pub fn remove(&mut self, id: HostNodeId) {
        if let Some(parent) = self.parent(id) {
            self.remove_child(parent, id);
        }
        self.drop_subtree(id);
    }

    fn drop_subtree(&mut self, id: HostNodeId) {
        let children = match self.nodes.get(id).and_then(Option::as_ref) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children {
            self.drop_subtree(child);
        }
        if let Some(slot) = self.nodes.get_mut(id) {
            slot.take();
        }
    }

    /// Marks `name` as a writable direct property of the node.
    pub fn define_property(&mut self, id: HostNodeId, name: &str) {
        if let Some(node) = self.node_mut(id) {
            node.properties.entry(name.to_owned()).or_default();
        }
    }

    pub fn property(&self, id: HostNodeId, name: &str) -> Option<String> {
        self.node(id)?.properties.get(name).cloned()
    }

    /// Rendered inline style, entries first, raw text when no entry was set.
    pub fn style_text(&self, id: HostNodeId) -> String {
        let Some(node) = self.node(id) else {
            return String::new();
        };
        if node.style.is_empty() {
            return node.style_text.clone();
        }
        node.style
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn style_property(&self, id: HostNodeId, name: &str) -> Option<String> {
        self.node(id)?.style.get(name).cloned()
    }

    pub fn has_event(&self, id: HostNodeId, event: &str) -> bool {
        self.node(id)
            .map(|node| node.events.contains_key(event))
            .unwrap_or(false)
    }

    /// Invokes the handler bound for `event`, returning whether one ran.
    pub fn dispatch(&self, id: HostNodeId, event: &str) -> bool {
        let handler = self
            .node(id)
            .and_then(|node| node.events.get(event).cloned());
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    /// Indented rendering of a subtree, for diagnostics.
    pub fn dump_tree(&self, root: HostNodeId) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, root, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: HostNodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.node(id) {
            Some(node) => {
                match node.kind {
                    HostNodeKind::Text => {
                        output.push_str(&format!("{indent}[{id}] {:?}\n", node.text));
                    }
                    HostNodeKind::Element => {
                        output.push_str(&format!("{indent}[{id}] <{}>\n", node.tag));
                    }
                }
                for child in node.children.clone() {
                    self.dump_node(output, child, depth + 1);
                }
            }
            None => output.push_str(&format!("{indent}[{id}] (missing)\n")),
        }
    }

    fn node(&self, id: HostNodeId) -> Option<&MemoryNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: HostNodeId) -> Option<&mut MemoryNode> {
        self.nodes.get_mut(id).and_then(Option::as_mut)
    }

    fn push(&mut self, node: MemoryNode) -> HostNodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(node));
        id
    }

    fn detach(&mut self, child: HostNodeId) {
        let Some(parent) = self.node(child).and_then(|node| node.parent) else {
            return;
        };
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|c| *c != child);
        }
        if let Some(child_node) = self.node_mut(child) {
            child_node.parent = None;
        }
    }
}

impl HostTree for MemoryHost {
    fn create_element(&mut self, tag: &str) -> HostNodeId {
        self.push(MemoryNode::element(tag))
    }

    fn create_text(&mut self, text: &str) -> HostNodeId {
        self.push(MemoryNode::text(text))
    }

    fn kind(&self, id: HostNodeId) -> Option<HostNodeKind> {
        self.node(id).map(|node| node.kind)
    }

    fn tag_name(&self, id: HostNodeId) -> Option<String> {
        let node = self.node(id)?;
        match node.kind {
            HostNodeKind::Element => Some(node.tag.clone()),
            HostNodeKind::Text => None,
        }
    }

    fn text_content(&self, id: HostNodeId) -> Option<String> {
        self.node(id).map(|node| node.text.clone())
    }

    fn set_text_content(&mut self, id: HostNodeId, text: &str) {
        if let Some(node) = self.node_mut(id) {
            node.text = text.to_owned();
        }
    }

    fn parent(&self, id: HostNodeId) -> Option<HostNodeId> {
        self.node(id)?.parent
    }

    fn child_nodes(&self, id: HostNodeId) -> Vec<HostNodeId> {
        self.node(id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn next_sibling(&self, id: HostNodeId) -> Option<HostNodeId> {
        let parent = self.parent(id)?;
        let siblings = &self.node(parent)?.children;
        let index = siblings.iter().position(|c| *c == id)?;
        siblings.get(index + 1).copied()
    }

    fn append_child(&mut self, parent: HostNodeId, child: HostNodeId) {
        if self.node(parent).is_none() || self.node(child).is_none() {
            log::warn!("append_child on missing node ({parent} <- {child})");
            return;
        }
        self.detach(child);
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.push(child);
        }
        if let Some(child_node) = self.node_mut(child) {
            child_node.parent = Some(parent);
        }
    }

    fn insert_before(&mut self, parent: HostNodeId, child: HostNodeId, reference: HostNodeId) {
        if self.node(parent).is_none() || self.node(child).is_none() {
            log::warn!("insert_before on missing node ({parent} <- {child})");
            return;
        }
        self.detach(child);
        let index = self
            .node(parent)
            .and_then(|node| node.children.iter().position(|c| *c == reference));
        match index {
            Some(index) => {
                if let Some(parent_node) = self.node_mut(parent) {
                    parent_node.children.insert(index, child);
                }
            }
            None => {
                log::warn!("insert_before with detached reference {reference}; appending");
                if let Some(parent_node) = self.node_mut(parent) {
                    parent_node.children.push(child);
                }
            }
        }
        if let Some(child_node) = self.node_mut(child) {
            child_node.parent = Some(parent);
        }
    }

    fn replace_child(&mut self, parent: HostNodeId, new_child: HostNodeId, old_child: HostNodeId) {
        let index = self
            .node(parent)
            .and_then(|node| node.children.iter().position(|c| *c == old_child));
        let Some(index) = index else {
            log::warn!("replace_child with detached child {old_child}");
            return;
        };
        if self.node(new_child).is_none() {
            log::warn!("replace_child with missing replacement {new_child}");
            return;
        }
        self.detach(new_child);
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children[index] = new_child;
        }
        if let Some(node) = self.node_mut(new_child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(old_child) {
            node.parent = None;
        }
    }

    fn remove_child(&mut self, parent: HostNodeId, child: HostNodeId) {
        let attached = self
            .node(parent)
            .map(|node| node.children.contains(&child))
            .unwrap_or(false);
        if !attached {
            log::warn!("remove_child with detached child {child}");
            return;
        }
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|c| *c != child);
        }
        if let Some(child_node) = self.node_mut(child) {
            child_node.parent = None;
        }
    }

    fn attribute_names(&self, id: HostNodeId) -> Vec<String> {
        self.node(id)
            .map(|node| node.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn attribute(&self, id: HostNodeId, name: &str) -> Option<String> {
        self.node(id)?.attributes.get(name).cloned()
    }

    fn set_attribute(&mut self, id: HostNodeId, name: &str, value: &str) {
        if let Some(node) = self.node_mut(id) {
            node.attributes.insert(name.to_owned(), value.to_owned());
        }
    }

    fn remove_attribute(&mut self, id: HostNodeId, name: &str) {
        if let Some(node) = self.node_mut(id) {
            node.attributes.shift_remove(name);
        }
    }

    fn has_property(&self, id: HostNodeId, name: &str) -> bool {
        self.node(id)
            .map(|node| node.properties.contains_key(name))
            .unwrap_or(false)
    }

    fn set_property(&mut self, id: HostNodeId, name: &str, value: &str) {
        if let Some(node) = self.node_mut(id) {
            node.properties.insert(name.to_owned(), value.to_owned());
        }
    }

    fn set_style_text(&mut self, id: HostNodeId, css: &str) {
        if let Some(node) = self.node_mut(id) {
            node.style.clear();
            node.style_text = css.to_owned();
        }
    }

    fn set_style_property(&mut self, id: HostNodeId, name: &str, value: &str) {
        if let Some(node) = self.node_mut(id) {
            node.style.insert(name.to_owned(), value.to_owned());
        }
    }

    fn bind_event(&mut self, id: HostNodeId, event: &str, handler: Option<EventHandler>) {
        if let Some(node) = self.node_mut(id) {
            match handler {
                Some(handler) => {
                    node.events.insert(event.to_owned(), handler);
                }
                None => {
                    node.events.shift_remove(event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::vnode::StyleEntry;

    #[test]
    fn append_moves_a_child_between_parents() {
        let mut host = MemoryHost::new();
        let first = host.create_element("div");
        let second = host.create_element("div");
        let child = host.create_text("x");

        host.append_child(first, child);
        assert_eq!(host.child_nodes(first), vec![child]);

        host.append_child(second, child);
        assert_eq!(host.child_nodes(first), Vec::<HostNodeId>::new());
        assert_eq!(host.child_nodes(second), vec![child]);
        assert_eq!(host.parent(child), Some(second));
    }

    #[test]
    fn replace_child_swaps_in_place() {
        let mut host = MemoryHost::new();
        let parent = host.create_element("ul");
        let a = host.create_element("li");
        let b = host.create_element("li");
        let c = host.create_element("li");
        host.append_child(parent, a);
        host.append_child(parent, b);

        host.replace_child(parent, c, a);
        assert_eq!(host.child_nodes(parent), vec![c, b]);
        assert_eq!(host.parent(a), None);
    }

    #[test]
    fn structural_ops_on_detached_nodes_are_no_ops() {
        let mut host = MemoryHost::new();
        let parent = host.create_element("div");
        let stray = host.create_element("span");

        host.remove_child(parent, stray);
        host.replace_child(parent, stray, stray);
        assert_eq!(host.child_nodes(parent), Vec::<HostNodeId>::new());
    }

    #[test]
    fn class_name_maps_to_class() {
        let mut host = MemoryHost::new();
        let node = host.create_element("div");
        apply_attribute(&mut host, node, "className", Some(&PropValue::from("a")));
        assert_eq!(host.attribute(node, "class").as_deref(), Some("a"));
        assert_eq!(host.attribute(node, "className"), None);
    }

    #[test]
    fn children_prop_is_skipped() {
        let mut host = MemoryHost::new();
        let node = host.create_element("div");
        apply_attribute(&mut host, node, "children", Some(&PropValue::from("x")));
        assert!(host.attribute_names(node).is_empty());
    }

    #[test]
    fn event_names_bind_lower_cased_and_falsy_clears() {
        let mut host = MemoryHost::new();
        let node = host.create_element("button");
        let fired = Rc::new(Cell::new(0));
        let handler = {
            let fired = fired.clone();
            PropValue::handler(move || fired.set(fired.get() + 1))
        };

        apply_attribute(&mut host, node, "onClick", Some(&handler));
        assert!(host.has_event(node, "onclick"));
        assert!(host.dispatch(node, "onclick"));
        assert_eq!(fired.get(), 1);

        apply_attribute(&mut host, node, "onClick", None);
        assert!(!host.has_event(node, "onclick"));
    }

    #[test]
    fn style_entries_merge_with_pixel_suffix() {
        let mut host = MemoryHost::new();
        let node = host.create_element("div");
        let style = StyleValue::entries([
            ("width", StyleEntry::from(100)),
            ("color", StyleEntry::from("red")),
        ]);
        apply_attribute(&mut host, node, "style", Some(&PropValue::Style(style)));
        assert_eq!(host.style_property(node, "width").as_deref(), Some("100px"));
        assert_eq!(host.style_property(node, "color").as_deref(), Some("red"));
    }

    #[test]
    fn style_text_replaces_wholesale() {
        let mut host = MemoryHost::new();
        let node = host.create_element("div");
        host.set_style_property(node, "width", "1px");
        apply_attribute(
            &mut host,
            node,
            "style",
            Some(&PropValue::Style(StyleValue::text("color: red"))),
        );
        assert_eq!(host.style_text(node), "color: red");
        assert_eq!(host.style_property(node, "width"), None);
    }

    #[test]
    fn writable_properties_are_set_alongside_attributes() {
        let mut host = MemoryHost::new();
        let node = host.create_element("input");
        host.define_property(node, "value");

        apply_attribute(&mut host, node, "value", Some(&PropValue::from("abc")));
        assert_eq!(host.property(node, "value").as_deref(), Some("abc"));
        assert_eq!(host.attribute(node, "value").as_deref(), Some("abc"));

        apply_attribute(&mut host, node, "value", Some(&PropValue::from("")));
        assert_eq!(host.property(node, "value").as_deref(), Some(""));
        assert_eq!(host.attribute(node, "value"), None);
    }
}
