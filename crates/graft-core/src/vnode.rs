//! Immutable descriptions of desired UI output.
//!
//! A [`VNode`] is produced fresh on every render and never mutated; the
//! reconciler compares it against the live host tree and patches the
//! differences. The shape is decided once at construction as a closed
//! union, so diff sites match on the variant instead of re-inspecting
//! loosely typed values.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::component::ComponentSpec;
use crate::host::HostNodeId;

/// Stable identifier used to match list children across renders.
pub type Key = String;

/// Event callback bound onto a host node.
pub type EventHandler = Rc<dyn Fn()>;

/// Callback receiving the host node an element rendered to.
pub type RefCallback = Rc<dyn Fn(HostNodeId)>;

/// One position in the desired tree.
#[derive(Clone)]
pub enum VNode {
    /// Rendered as host text content.
    Text(String),
    /// Rendered as a host element of a given tag.
    Element(VElement),
    /// Expanded by a component instance into a subtree.
    Component(VComponent),
}

impl VNode {
    /// The normal form of "render nothing": an empty text leaf.
    pub fn empty() -> Self {
        VNode::Text(String::new())
    }

    /// Builds a text leaf from anything displayable.
    pub fn text(value: impl fmt::Display) -> Self {
        VNode::Text(value.to_string())
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            VNode::Text(_) => None,
            VNode::Element(element) => element.key.as_deref(),
            VNode::Component(component) => component.key.as_deref(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, VNode::Text(_))
    }
}

impl From<&str> for VNode {
    fn from(value: &str) -> Self {
        VNode::Text(value.to_owned())
    }
}

impl From<String> for VNode {
    fn from(value: String) -> Self {
        VNode::Text(value)
    }
}

impl From<i64> for VNode {
    fn from(value: i64) -> Self {
        VNode::Text(value.to_string())
    }
}

impl From<f64> for VNode {
    fn from(value: f64) -> Self {
        VNode::Text(number_text(value))
    }
}

impl From<VElement> for VNode {
    fn from(value: VElement) -> Self {
        VNode::Element(value)
    }
}

impl From<VComponent> for VNode {
    fn from(value: VComponent) -> Self {
        VNode::Component(value)
    }
}

/// Absent content normalizes to the empty text leaf.
impl From<Option<VNode>> for VNode {
    fn from(value: Option<VNode>) -> Self {
        value.unwrap_or_else(VNode::empty)
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNode::Text(text) => f.debug_tuple("Text").field(text).finish(),
            VNode::Element(element) => element.fmt(f),
            VNode::Component(component) => component.fmt(f),
        }
    }
}

/// Element description: a host tag plus its props and children.
#[derive(Clone)]
pub struct VElement {
    pub tag: String,
    pub key: Option<Key>,
    pub props: Props,
    pub node_ref: Option<RefCallback>,
}

impl VElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            key: None,
            props: Props::new(),
            node_ref: None,
        }
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.set(name, value);
        self
    }

    /// Binds an event handler; `event` is the suffix after `on`
    /// (`on("click", ..)` produces the `onclick` binding).
    pub fn on(mut self, event: &str, handler: impl Fn() + 'static) -> Self {
        self.props
            .set(format!("on{event}"), PropValue::handler(handler));
        self
    }

    pub fn style(self, style: StyleValue) -> Self {
        self.attr("style", PropValue::Style(style))
    }

    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.props.push_child(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        for child in children {
            self.props.push_child(child);
        }
        self
    }

    pub fn node_ref(mut self, callback: impl Fn(HostNodeId) + 'static) -> Self {
        self.node_ref = Some(Rc::new(callback));
        self
    }
}

impl fmt::Debug for VElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VElement")
            .field("tag", &self.tag)
            .field("key", &self.key)
            .field("props", &self.props)
            .field("children", &self.props.children())
            .finish()
    }
}

/// Component reference: a descriptor plus the props passed through.
#[derive(Clone)]
pub struct VComponent {
    pub spec: ComponentSpec,
    pub key: Option<Key>,
    pub props: Props,
}

impl VComponent {
    pub fn new(spec: &ComponentSpec) -> Self {
        Self {
            spec: spec.clone(),
            key: None,
            props: Props::new(),
        }
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.set(name, value);
        self
    }

    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.props.push_child(child.into());
        self
    }
}

impl fmt::Debug for VComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VComponent")
            .field("spec", &self.spec)
            .field("key", &self.key)
            .finish()
    }
}

/// Ordered name/value mapping rendered onto a host node, plus the nested
/// child nodes. `children` is not an entry in the value map; the name stays
/// reserved at the attribute-application layer regardless.
#[derive(Clone, Default)]
pub struct Props {
    values: IndexMap<String, PropValue>,
    children: Vec<VNode>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub fn push_child(&mut self, child: VNode) {
        self.children.push(child);
    }

    pub fn set_children(&mut self, children: Vec<VNode>) {
        self.children = children;
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.iter())
            .finish()
    }
}

/// Closed union of values a prop can carry.
#[derive(Clone)]
pub enum PropValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Style(StyleValue),
    Handler(EventHandler),
}

impl PropValue {
    pub fn handler(callback: impl Fn() + 'static) -> Self {
        PropValue::Handler(Rc::new(callback))
    }

    /// Truthiness as the attribute-application contract defines it: empty
    /// text, zero or NaN numbers and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            PropValue::Text(text) => !text.is_empty(),
            PropValue::Number(number) => *number != 0.0 && !number.is_nan(),
            PropValue::Bool(value) => *value,
            PropValue::Style(_) | PropValue::Handler(_) => true,
        }
    }

    /// Rendering used for markup attributes. `None` for kinds that never
    /// appear as attributes (styles, handlers).
    pub fn attribute_text(&self) -> Option<String> {
        match self {
            PropValue::Text(text) => Some(text.clone()),
            PropValue::Number(number) => Some(number_text(*number)),
            PropValue::Bool(value) => Some(value.to_string()),
            PropValue::Style(_) | PropValue::Handler(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            PropValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Text(a), PropValue::Text(b)) => a == b,
            (PropValue::Number(a), PropValue::Number(b)) => a == b,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Style(a), PropValue::Style(b)) => a == b,
            // Handlers have no structural equality; identity stands in.
            (PropValue::Handler(a), PropValue::Handler(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            PropValue::Number(number) => f.debug_tuple("Number").field(number).finish(),
            PropValue::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            PropValue::Style(style) => f.debug_tuple("Style").field(style).finish(),
            PropValue::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Number(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Number(value as f64)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Number(f64::from(value))
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<StyleValue> for PropValue {
    fn from(value: StyleValue) -> Self {
        PropValue::Style(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

/// Inline style: replace the whole style text, or merge per-property
/// entries into it.
#[derive(Clone, PartialEq, Debug)]
pub enum StyleValue {
    Text(String),
    Entries(IndexMap<String, StyleEntry>),
}

impl StyleValue {
    pub fn text(css: impl Into<String>) -> Self {
        StyleValue::Text(css.into())
    }

    pub fn entries(
        entries: impl IntoIterator<Item = (&'static str, StyleEntry)>,
    ) -> Self {
        StyleValue::Entries(
            entries
                .into_iter()
                .map(|(name, entry)| (name.to_owned(), entry))
                .collect(),
        )
    }
}

/// One style property value; bare numbers render as pixel lengths.
#[derive(Clone, PartialEq, Debug)]
pub enum StyleEntry {
    Number(f64),
    Text(String),
}

impl StyleEntry {
    pub fn css_text(&self) -> String {
        match self {
            StyleEntry::Number(number) => format!("{}px", number_text(*number)),
            StyleEntry::Text(text) => text.clone(),
        }
    }
}

impl From<f64> for StyleEntry {
    fn from(value: f64) -> Self {
        StyleEntry::Number(value)
    }
}

impl From<i32> for StyleEntry {
    fn from(value: i32) -> Self {
        StyleEntry::Number(f64::from(value))
    }
}

impl From<&str> for StyleEntry {
    fn from(value: &str) -> Self {
        StyleEntry::Text(value.to_owned())
    }
}

/// Decimal text for a number, without a trailing `.0` for integral values.
pub(crate) fn number_text(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_content_normalizes_to_empty_text() {
        let node = VNode::from(None);
        match node {
            VNode::Text(text) => assert_eq!(text, ""),
            other => panic!("expected text leaf, got {other:?}"),
        }
    }

    #[test]
    fn numeric_leaves_render_as_decimal_text() {
        assert!(matches!(VNode::from(42i64), VNode::Text(t) if t == "42"));
        assert!(matches!(VNode::from(2.5f64), VNode::Text(t) if t == "2.5"));
        assert!(matches!(VNode::from(3.0f64), VNode::Text(t) if t == "3"));
    }

    #[test]
    fn prop_truthiness_follows_attribute_contract() {
        assert!(!PropValue::from("").is_truthy());
        assert!(PropValue::from("x").is_truthy());
        assert!(!PropValue::from(0).is_truthy());
        assert!(!PropValue::Number(f64::NAN).is_truthy());
        assert!(PropValue::from(1).is_truthy());
        assert!(!PropValue::from(false).is_truthy());
        assert!(PropValue::handler(|| {}).is_truthy());
    }

    #[test]
    fn handlers_compare_by_identity() {
        let handler: EventHandler = Rc::new(|| {});
        let a = PropValue::Handler(handler.clone());
        let b = PropValue::Handler(handler);
        let c = PropValue::handler(|| {});
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn style_numbers_render_as_pixels() {
        assert_eq!(StyleEntry::from(100).css_text(), "100px");
        assert_eq!(StyleEntry::from("bold").css_text(), "bold");
    }

    #[test]
    fn element_builder_collects_props_and_children() {
        let element = VElement::new("ul")
            .key("list")
            .attr("class", "items")
            .child(VElement::new("li").child("one"))
            .child(VElement::new("li").child("two"));
        assert_eq!(element.tag, "ul");
        assert_eq!(element.key.as_deref(), Some("list"));
        assert_eq!(
            element.props.get("class"),
            Some(&PropValue::from("items"))
        );
        assert_eq!(element.props.children().len(), 2);
    }
}
