//! Bridge between virtual trees and a live element tree.
//!
//! The [`Host`] trait is the only way this crate touches the element tree. [`render`] and
//! [`mount`] build host nodes for a fresh tree; [`apply`] replays diff patches.

use quill_dom::{EventBinding, NodeHandle, VKind, VNode, Value};

pub mod events;
pub mod memory;
mod patch;

pub use events::{Event, EventRegistry, dispatch};
pub use memory::{HostError, MemoryHost, Mutation};
pub use patch::apply;

/// A virtual node was used as if it had been rendered, but carries no host handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("virtual node is not attached to a host node")]
pub struct Detached;

/// Element-tree primitives consumed by the renderer.
///
/// Errors are passed through untouched; nothing here retries or rolls back.
pub trait Host {
    type Error: std::error::Error + From<Detached>;

    fn create_element(&mut self, tag: &str) -> Result<NodeHandle, Self::Error>;
    fn create_text(&mut self, content: &str) -> Result<NodeHandle, Self::Error>;
    fn append_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), Self::Error>;
    /// Inserts `child` before `reference`, or appends when there is none. Moves `child`
    /// if it is already in the tree.
    fn insert_before(
        &mut self,
        parent: NodeHandle,
        child: NodeHandle,
        reference: Option<NodeHandle>,
    ) -> Result<(), Self::Error>;
    fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), Self::Error>;
    fn replace_child(&mut self, parent: NodeHandle, new: NodeHandle, old: NodeHandle) -> Result<(), Self::Error>;
    fn set_attribute(&mut self, node: NodeHandle, name: &str, value: &Value) -> Result<(), Self::Error>;
    fn remove_attribute(&mut self, node: NodeHandle, name: &str) -> Result<(), Self::Error>;
    fn add_listener(&mut self, node: NodeHandle, binding: &EventBinding) -> Result<(), Self::Error>;
    fn remove_listener(&mut self, node: NodeHandle, binding: &EventBinding) -> Result<(), Self::Error>;
}

/// Creates host nodes for `vnode` and its subtree and records their handles.
///
/// The returned node is not attached anywhere.
pub fn render<H: Host>(host: &mut H, vnode: &mut VNode) -> Result<NodeHandle, H::Error> {
    let handle = match vnode.kind {
        VKind::Text => host.create_text(&vnode.content)?,
        VKind::Root => host.create_element("root")?,
        VKind::Slot => host.create_element("slot")?,
        VKind::Block => host.create_element("block")?,
        VKind::Component | VKind::Native => host.create_element(&vnode.tag)?,
    };
    vnode.host = Some(handle);
    if vnode.is_text() {
        return Ok(handle);
    }
    for attr in &vnode.attrs {
        host.set_attribute(handle, &attr.name, &attr.value)?;
    }
    for binding in vnode.events.values().flatten() {
        host.add_listener(handle, binding)?;
    }
    for child in &mut vnode.children {
        let c = render(host, child)?;
        host.append_child(handle, c)?;
    }
    Ok(handle)
}

/// Renders `vnode` into `container`.
///
/// A [`VKind::Root`] tree has no node of its own: the container stands in for it.
pub fn mount<H: Host>(host: &mut H, container: NodeHandle, vnode: &mut VNode) -> Result<(), H::Error> {
    tracing::debug!(%container, kind = ?vnode.kind, "mount");
    if vnode.kind != VKind::Root {
        let handle = render(host, vnode)?;
        return host.append_child(container, handle);
    }
    vnode.host = Some(container);
    for child in &mut vnode.children {
        let c = render(host, child)?;
        host.append_child(container, c)?;
    }
    Ok(())
}
