use quill_dom::diff::{AttrChange, Insertion, Patch, Source};
use quill_dom::{Attr, Events, NodeHandle, VNode};

use crate::{Detached, Host, render};

/// Applies `patches` (as produced by [`quill_dom::diff::diff`] for `node`) to the host tree.
///
/// `node` is updated alongside, so afterwards it mirrors the new tree and keeps every host
/// handle that was reused. `parent` is the host parent of `node`; it is only needed for
/// [`Patch::Remove`] and [`Patch::Replace`].
pub fn apply<H: Host>(host: &mut H, parent: NodeHandle, node: &mut VNode, patches: &[Patch]) -> Result<(), H::Error> {
    for patch in patches {
        match patch {
            Patch::Remove => {
                let handle = node.host.ok_or(Detached)?;
                tracing::trace!(%parent, node = %handle, "remove");
                host.remove_child(parent, handle)?;
                node.detach();
            }
            Patch::Replace(new) => {
                let old = node.host.ok_or(Detached)?;
                let mut fresh = new.clone();
                let handle = render(host, &mut fresh)?;
                tracing::trace!(%parent, old = %old, new = %handle, "replace");
                host.replace_child(parent, handle, old)?;
                *node = fresh;
            }
            Patch::SetAttrs(changes) => set_attrs(host, node, changes)?,
            Patch::Rebind(events) => rebind(host, node, events)?,
            Patch::UpdateChild(index, child_patches) => {
                let handle = node.host.ok_or(Detached)?;
                if let Some(child) = node.children.get_mut(*index) {
                    apply(host, handle, child, child_patches)?;
                }
            }
            Patch::Reorder { removes, inserts } => reorder(host, node, removes, inserts)?,
        }
    }
    Ok(())
}

fn set_attrs<H: Host>(host: &mut H, node: &mut VNode, changes: &[AttrChange]) -> Result<(), H::Error> {
    let handle = node.host.ok_or(Detached)?;
    for change in changes {
        tracing::trace!(node = %handle, attr = %change.name, "set attribute");
        match &change.value {
            Some(value) => {
                host.set_attribute(handle, &change.name, value)?;
                match node.attrs.iter_mut().find(|a| a.name == change.name) {
                    Some(attr) => attr.value = value.clone(),
                    None => node.attrs.push(Attr {
                        name: change.name.clone(),
                        value: value.clone(),
                    }),
                }
            }
            None => {
                host.remove_attribute(handle, &change.name)?;
                node.attrs.retain(|a| a.name != change.name);
            }
        }
    }
    Ok(())
}

fn rebind<H: Host>(host: &mut H, node: &mut VNode, events: &Events) -> Result<(), H::Error> {
    let handle = node.host.ok_or(Detached)?;
    tracing::trace!(node = %handle, "rebind listeners");
    for binding in node.events.values().flatten() {
        host.remove_listener(handle, binding)?;
    }
    for binding in events.values().flatten() {
        host.add_listener(handle, binding)?;
    }
    node.events = events.clone();
    Ok(())
}

/// Removes first (highest index first), then inserts left to right, each before the node
/// that currently sits at its index.
fn reorder<H: Host>(host: &mut H, node: &mut VNode, removes: &[usize], inserts: &[Insertion]) -> Result<(), H::Error> {
    let parent = node.host.ok_or(Detached)?;
    let mut live: Vec<(Option<usize>, VNode)> = std::mem::take(&mut node.children)
        .into_iter()
        .enumerate()
        .map(|(i, child)| (Some(i), child))
        .collect();

    for &index in removes {
        if index >= live.len() {
            continue;
        }
        let (_, mut child) = live.remove(index);
        let handle = child.host.ok_or(Detached)?;
        tracing::trace!(%parent, node = %handle, index, "remove child");
        host.remove_child(parent, handle)?;
        child.detach();
    }

    for insertion in inserts {
        let entry = match &insertion.source {
            Source::Moved(old) => match live.iter().position(|(src, _)| *src == Some(*old)) {
                Some(at) => live.remove(at),
                None => continue,
            },
            Source::Fresh(vnode) => {
                let mut fresh = vnode.clone();
                render(host, &mut fresh)?;
                (None, fresh)
            }
        };
        let at = insertion.index.min(live.len());
        let reference = live.get(at).and_then(|(_, n)| n.host);
        let handle = entry.1.host.ok_or(Detached)?;
        tracing::trace!(%parent, node = %handle, index = at, "insert child");
        host.insert_before(parent, handle, reference)?;
        live.insert(at, entry);
    }

    node.children = live.into_iter().map(|(_, child)| child).collect();
    Ok(())
}
