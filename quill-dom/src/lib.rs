use std::collections::BTreeMap;
use std::fmt;

pub mod diff;
pub mod value;

pub use value::{Callable, MAX_ARRAY_INDEX, MAX_LOOP_COUNT, Map, PathKey, Value, parse_path};

/// Opaque handle of a node living in a host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a generated node. Loop and condition wrappers never show up here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VKind {
    Root,
    Slot,
    Block,
    Component,
    Text,
    Native,
}

/// Identity of a nested component template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentRef(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: String,
    pub value: Value,
}

/// One `bind:`/`catch:` declaration. The handler is a name, never a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventBinding {
    pub name: String,
    pub capture: bool,
    pub catch: bool,
    pub handler: String,
}

/// Bindings grouped by event name, in declaration order.
pub type Events = BTreeMap<String, Vec<EventBinding>>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Props {
    pub attrs: Vec<Attr>,
}

impl Props {
    pub fn new() -> Self {
        Self { attrs: Vec::new() }
    }

    /// Sets `k`, replacing an earlier value of the same name in place.
    pub fn set(mut self, k: impl Into<String>, v: impl Into<Value>) -> Self {
        let name = k.into();
        let value = v.into();
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attrs.push(Attr { name, value }),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.iter().find(|a| a.name == name).map(|a| &a.value)
    }
}

impl From<()> for Props {
    fn from(_: ()) -> Self {
        Props::default()
    }
}

impl From<Vec<(&str, &str)>> for Props {
    fn from(v: Vec<(&str, &str)>) -> Self {
        v.into_iter().fold(Props::new(), |p, (k, v)| p.set(k, v))
    }
}

impl From<Vec<(&str, Value)>> for Props {
    fn from(v: Vec<(&str, Value)>) -> Self {
        v.into_iter().fold(Props::new(), |p, (k, v)| p.set(k, v))
    }
}

impl From<Vec<Attr>> for Props {
    fn from(attrs: Vec<Attr>) -> Self {
        Props { attrs }
    }
}

/// A generated virtual node. Recreated on every render.
#[derive(Debug, Clone)]
pub struct VNode {
    pub kind: VKind,
    pub tag: String,
    pub component: Option<ComponentRef>,
    pub content: String,
    /// Empty when the node is unkeyed.
    pub key: String,
    pub attrs: Vec<Attr>,
    pub events: Events,
    pub children: Vec<VNode>,
    /// Live host node, attached after the first render. Not part of identity.
    pub host: Option<NodeHandle>,
}

impl PartialEq for VNode {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.tag == other.tag
            && self.component == other.component
            && self.content == other.content
            && self.key == other.key
            && self.attrs == other.attrs
            && self.events == other.events
            && self.children == other.children
    }
}

impl VNode {
    pub fn new(kind: VKind, tag: impl Into<String>) -> Self {
        VNode {
            kind,
            tag: tag.into(),
            component: None,
            content: String::new(),
            key: String::new(),
            attrs: Vec::new(),
            events: Events::new(),
            children: Vec::new(),
            host: None,
        }
    }

    pub fn root(children: Vec<VNode>) -> Self {
        VNode {
            children,
            ..VNode::new(VKind::Root, "")
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == VKind::Text
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.kind = VKind::Component;
        self.component = Some(ComponentRef(component.into()));
        self
    }

    pub fn on(mut self, binding: EventBinding) -> Self {
        self.events.entry(binding.name.clone()).or_default().push(binding);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    /// Concatenated text of this subtree.
    pub fn text_content(&self) -> String {
        if self.is_text() {
            return self.content.clone();
        }
        self.children.iter().map(VNode::text_content).collect()
    }

    /// Clears host handles in this subtree.
    pub fn detach(&mut self) {
        self.host = None;
        for c in &mut self.children {
            c.detach();
        }
    }
}

pub fn h(tag: impl Into<String>, props: impl Into<Props>, children: Vec<VNode>) -> VNode {
    VNode {
        attrs: props.into().attrs,
        children,
        ..VNode::new(VKind::Native, tag)
    }
}

pub fn text(t: impl Into<String>) -> VNode {
    VNode {
        content: t.into(),
        ..VNode::new(VKind::Text, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_tree() {
        let node = h(
            "div",
            vec![("class", "app")],
            vec![text("hello"), h("span", (), vec![text("world")])],
        );
        assert_eq!(node.tag, "div");
        assert_eq!(node.attr("class"), Some(&Value::from("app")));
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.text_content(), "helloworld");
    }

    #[test]
    fn host_handle_is_not_identity() {
        let mut a = h("div", (), vec![text("x")]);
        let b = a.clone();
        a.host = Some(NodeHandle(7));
        a.children[0].host = Some(NodeHandle(8));
        assert_eq!(a, b);
        a.detach();
        assert!(a.children[0].host.is_none());
    }

    #[test]
    fn props_set_replaces_in_place() {
        let p = Props::new().set("a", 1).set("b", 2).set("a", 3);
        assert_eq!(p.attrs.len(), 2);
        assert_eq!(p.attrs[0].name, "a");
        assert_eq!(p.get("a"), Some(&Value::from(3)));
    }
}
