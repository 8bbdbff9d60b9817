use std::collections::HashMap;

use quill_dom::{EventBinding, NodeHandle, Value};
use thiserror::Error;

use crate::{Detached, Host};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("unknown host node {0}")]
    UnknownNode(NodeHandle),

    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: NodeHandle, child: NodeHandle },

    #[error("inserting {child} into {parent} would create a cycle")]
    CycleDetected { parent: NodeHandle, child: NodeHandle },

    #[error(transparent)]
    Detached(#[from] Detached),
}

/// One call made against the host, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create(NodeHandle),
    Append { parent: NodeHandle, child: NodeHandle },
    InsertBefore { parent: NodeHandle, child: NodeHandle },
    Remove { parent: NodeHandle, child: NodeHandle },
    Replace { parent: NodeHandle, new: NodeHandle, old: NodeHandle },
    SetAttribute(NodeHandle, String),
    RemoveAttribute(NodeHandle, String),
    Listen(NodeHandle, String),
    Unlisten(NodeHandle, String),
}

#[derive(Debug, Clone)]
enum Content {
    Element(String),
    Text(String),
}

#[derive(Debug, Clone)]
struct HostNode {
    content: Content,
    attrs: Vec<(String, Value)>,
    listeners: Vec<EventBinding>,
    children: Vec<NodeHandle>,
    parent: Option<NodeHandle>,
}

/// Element tree kept in memory. Used by tests and the CLI in place of a real UI.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    nodes: HashMap<NodeHandle, HostNode>,
    next: u64,
    root: NodeHandle,
    log: Vec<Mutation>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// A host holding one empty `body` element, see [`root`](Self::root).
    pub fn new() -> Self {
        let root = NodeHandle(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, HostNode::new(Content::Element("body".to_string())));
        MemoryHost {
            nodes,
            next: 1,
            root,
            log: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeHandle {
        self.root
    }

    /// Drains the mutation log.
    pub fn take_log(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.log)
    }

    pub fn contains(&self, node: NodeHandle) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn children(&self, node: NodeHandle) -> &[NodeHandle] {
        self.nodes.get(&node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn tag(&self, node: NodeHandle) -> Option<&str> {
        match &self.nodes.get(&node)?.content {
            Content::Element(tag) => Some(tag),
            Content::Text(_) => None,
        }
    }

    pub fn attribute(&self, node: NodeHandle, name: &str) -> Option<&Value> {
        let n = self.nodes.get(&node)?;
        n.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn listeners(&self, node: NodeHandle) -> &[EventBinding] {
        self.nodes.get(&node).map(|n| n.listeners.as_slice()).unwrap_or(&[])
    }

    /// First node in document order under `from` whose attribute `name` prints as `value`.
    pub fn find_by_attr(&self, from: NodeHandle, name: &str, value: &str) -> Option<NodeHandle> {
        if self.attribute(from, name).is_some_and(|v| v.to_text() == value) {
            return Some(from);
        }
        self.children(from)
            .iter()
            .find_map(|&c| self.find_by_attr(c, name, value))
    }

    /// Serialises `node` and its subtree.
    pub fn to_html(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serialises the children of `node`.
    pub fn inner_html(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        for &c in self.children(node) {
            self.write_html(c, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeHandle, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.content {
            Content::Text(t) => out.push_str(&escape(t)),
            Content::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &n.attrs {
                    match value {
                        Value::Bool(true) => {
                            out.push(' ');
                            out.push_str(name);
                        }
                        Value::Bool(false) | Value::Undefined | Value::Null => {}
                        v => out.push_str(&format!(" {name}=\"{}\"", escape(&v.to_text()))),
                    }
                }
                out.push('>');
                for &c in &n.children {
                    self.write_html(c, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }

    fn node_mut(&mut self, node: NodeHandle) -> Result<&mut HostNode, HostError> {
        self.nodes.get_mut(&node).ok_or(HostError::UnknownNode(node))
    }

    fn create(&mut self, content: Content) -> NodeHandle {
        let handle = NodeHandle(self.next);
        self.next += 1;
        self.nodes.insert(handle, HostNode::new(content));
        self.log.push(Mutation::Create(handle));
        handle
    }

    fn is_ancestor(&self, candidate: NodeHandle, of: NodeHandle) -> bool {
        let mut cur = Some(of);
        while let Some(n) = cur {
            if n == candidate {
                return true;
            }
            cur = self.parent(n);
        }
        false
    }

    fn unlink(&mut self, child: NodeHandle) -> Result<(), HostError> {
        if let Some(old_parent) = self.node_mut(child)?.parent.take() {
            self.node_mut(old_parent)?.children.retain(|&c| c != child);
        }
        Ok(())
    }

    /// Drops `node` and everything below it.
    fn discard(&mut self, node: NodeHandle) {
        if let Some(n) = self.nodes.remove(&node) {
            for c in n.children {
                self.discard(c);
            }
        }
    }

    fn attach(&mut self, parent: NodeHandle, child: NodeHandle, reference: Option<NodeHandle>) -> Result<(), HostError> {
        self.node_mut(parent)?;
        self.node_mut(child)?;
        if self.is_ancestor(child, parent) {
            return Err(HostError::CycleDetected { parent, child });
        }
        if let Some(r) = reference {
            if self.parent(r) != Some(parent) || r == child {
                return Err(HostError::NotAChild { parent, child: r });
            }
        }
        self.unlink(child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let at = reference
            .and_then(|r| siblings.iter().position(|&c| c == r))
            .unwrap_or(siblings.len());
        siblings.insert(at, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }
}

impl HostNode {
    fn new(content: Content) -> Self {
        HostNode {
            content,
            attrs: Vec::new(),
            listeners: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

impl Host for MemoryHost {
    type Error = HostError;

    fn create_element(&mut self, tag: &str) -> Result<NodeHandle, HostError> {
        Ok(self.create(Content::Element(tag.to_string())))
    }

    fn create_text(&mut self, content: &str) -> Result<NodeHandle, HostError> {
        Ok(self.create(Content::Text(content.to_string())))
    }

    fn append_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), HostError> {
        self.attach(parent, child, None)?;
        self.log.push(Mutation::Append { parent, child });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: NodeHandle,
        child: NodeHandle,
        reference: Option<NodeHandle>,
    ) -> Result<(), HostError> {
        self.attach(parent, child, reference)?;
        self.log.push(Mutation::InsertBefore { parent, child });
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), HostError> {
        if self.parent(child) != Some(parent) {
            return Err(HostError::NotAChild { parent, child });
        }
        self.unlink(child)?;
        self.discard(child);
        self.log.push(Mutation::Remove { parent, child });
        Ok(())
    }

    fn replace_child(&mut self, parent: NodeHandle, new: NodeHandle, old: NodeHandle) -> Result<(), HostError> {
        if self.parent(old) != Some(parent) {
            return Err(HostError::NotAChild { parent, child: old });
        }
        self.attach(parent, new, Some(old))?;
        self.unlink(old)?;
        self.discard(old);
        self.log.push(Mutation::Replace { parent, new, old });
        Ok(())
    }

    fn set_attribute(&mut self, node: NodeHandle, name: &str, value: &Value) -> Result<(), HostError> {
        let n = self.node_mut(node)?;
        match n.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.clone(),
            None => n.attrs.push((name.to_string(), value.clone())),
        }
        self.log.push(Mutation::SetAttribute(node, name.to_string()));
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeHandle, name: &str) -> Result<(), HostError> {
        self.node_mut(node)?.attrs.retain(|(k, _)| k != name);
        self.log.push(Mutation::RemoveAttribute(node, name.to_string()));
        Ok(())
    }

    fn add_listener(&mut self, node: NodeHandle, binding: &EventBinding) -> Result<(), HostError> {
        self.node_mut(node)?.listeners.push(binding.clone());
        self.log.push(Mutation::Listen(node, binding.name.clone()));
        Ok(())
    }

    fn remove_listener(&mut self, node: NodeHandle, binding: &EventBinding) -> Result<(), HostError> {
        let listeners = &mut self.node_mut(node)?.listeners;
        if let Some(at) = listeners.iter().position(|l| l == binding) {
            listeners.remove(at);
        }
        self.log.push(Mutation::Unlisten(node, binding.name.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_moves_existing_children() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let a = host.create_text("a").unwrap();
        let b = host.create_text("b").unwrap();
        host.append_child(root, a).unwrap();
        host.append_child(root, b).unwrap();
        host.insert_before(root, b, Some(a)).unwrap();
        assert_eq!(host.inner_html(root), "ba");
        host.insert_before(root, b, None).unwrap();
        assert_eq!(host.children(root), [a, b]);
    }

    #[test]
    fn errors_name_the_nodes() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let div = host.create_element("div").unwrap();
        host.append_child(root, div).unwrap();
        let stray = host.create_text("x").unwrap();
        assert_eq!(
            host.remove_child(root, stray),
            Err(HostError::NotAChild { parent: root, child: stray })
        );
        assert_eq!(
            host.append_child(div, root),
            Err(HostError::CycleDetected { parent: div, child: root })
        );
        assert_eq!(
            host.append_child(root, NodeHandle(99)),
            Err(HostError::UnknownNode(NodeHandle(99)))
        );
    }

    #[test]
    fn html_output() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let input = host.create_element("input").unwrap();
        host.set_attribute(input, "value", &Value::from("a<b")).unwrap();
        host.set_attribute(input, "checked", &Value::Bool(true)).unwrap();
        host.set_attribute(input, "hidden", &Value::Bool(false)).unwrap();
        host.append_child(root, input).unwrap();
        assert_eq!(host.to_html(root), r#"<body><input value="a&lt;b" checked></input></body>"#);
    }
}
