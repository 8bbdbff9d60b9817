use std::collections::{HashMap, VecDeque};

use crate::{Attr, VNode, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Detach the node from its parent.
    Remove,
    /// Render the node fresh and swap it in.
    Replace(VNode),
    SetAttrs(Vec<AttrChange>),
    /// Drop every listener of the node and install the given ones.
    Rebind(crate::Events),
    /// Patches for the child at this index of the *old* child list.
    UpdateChild(usize, Vec<Patch>),
    /// Removes (descending old indices) first, then inserts left to right.
    Reorder {
        removes: Vec<usize>,
        inserts: Vec<Insertion>,
    },
}

/// A changed attribute; `None` means the attribute is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrChange {
    pub name: String,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    pub index: usize,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Move the live node that sat at this old index.
    Moved(usize),
    /// Render a new node.
    Fresh(VNode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert {
    /// `None` when the item has no counterpart in the old list.
    pub old_index: Option<usize>,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Moves {
    pub removes: Vec<usize>,
    pub inserts: Vec<Insert>,
}

impl Moves {
    pub fn is_empty(&self) -> bool {
        self.removes.is_empty() && self.inserts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDiff {
    /// For every old position, the index of its counterpart in the new list.
    pub children: Vec<Option<usize>>,
    pub moves: Moves,
}

/// Diffs `new` against `old`; an absent `new` removes the node.
pub fn diff_tree(old: &VNode, new: Option<&VNode>) -> Vec<Patch> {
    match new {
        Some(new) => diff(old, new),
        None => vec![Patch::Remove],
    }
}

pub fn diff(old: &VNode, new: &VNode) -> Vec<Patch> {
    if old.is_text() || new.is_text() {
        return if old.is_text() && new.is_text() && old.content == new.content {
            vec![]
        } else {
            vec![Patch::Replace(new.clone())]
        };
    }
    if !compatible(old, new) {
        return vec![Patch::Replace(new.clone())];
    }
    let mut patches = Vec::new();
    if let Some(changes) = diff_attrs(&old.attrs, &new.attrs) {
        patches.push(Patch::SetAttrs(changes));
    }
    if old.events != new.events {
        patches.push(Patch::Rebind(new.events.clone()));
    }
    patches.extend(diff_children(&old.children, &new.children));
    patches
}

fn compatible(old: &VNode, new: &VNode) -> bool {
    old.kind == new.kind && old.tag == new.tag && old.component == new.component && old.key == new.key
}

/// Returns only what changed, or `None` when nothing did.
pub fn diff_attrs(old: &[Attr], new: &[Attr]) -> Option<Vec<AttrChange>> {
    let before: HashMap<&str, &Value> = old.iter().map(|a| (a.name.as_str(), &a.value)).collect();
    let after: HashMap<&str, &Value> = new.iter().map(|a| (a.name.as_str(), &a.value)).collect();
    let mut changes = Vec::new();
    for attr in new {
        // A repeated name counts once, with its final value.
        if after.get(attr.name.as_str()) != Some(&&attr.value) {
            continue;
        }
        if changes.iter().any(|c: &AttrChange| c.name == attr.name) {
            continue;
        }
        if before.get(attr.name.as_str()) != Some(&&attr.value) {
            changes.push(AttrChange {
                name: attr.name.clone(),
                value: Some(attr.value.clone()),
            });
        }
    }
    for attr in old {
        if !after.contains_key(attr.name.as_str()) && !changes.iter().any(|c| c.name == attr.name) {
            changes.push(AttrChange {
                name: attr.name.clone(),
                value: None,
            });
        }
    }
    if changes.is_empty() { None } else { Some(changes) }
}

fn diff_children(old: &[VNode], new: &[VNode]) -> Vec<Patch> {
    let ListDiff { children, moves } = diff_list(old, new);
    let mut patches = Vec::new();
    for (i, slot) in children.iter().enumerate() {
        if let Some(n) = slot {
            let child = diff(&old[i], &new[*n]);
            if !child.is_empty() {
                patches.push(Patch::UpdateChild(i, child));
            }
        }
    }
    if !moves.is_empty() {
        let inserts = moves
            .inserts
            .into_iter()
            .map(|ins| Insertion {
                index: ins.index,
                source: match ins.old_index {
                    Some(o) => Source::Moved(o),
                    None => Source::Fresh(new[ins.index].clone()),
                },
            })
            .collect();
        patches.push(Patch::Reorder {
            removes: moves.removes,
            inserts,
        });
    }
    patches
}

/// Unique keys mapped to their position, plus the unkeyed positions in order.
/// A repeated key makes that later occurrence unkeyed.
fn partition(list: &[VNode]) -> (HashMap<&str, usize>, VecDeque<usize>) {
    let mut keyed = HashMap::new();
    let mut free = VecDeque::new();
    for (i, node) in list.iter().enumerate() {
        if node.key.is_empty() {
            free.push_back(i);
        } else if keyed.contains_key(node.key.as_str()) {
            tracing::trace!(key = %node.key, index = i, "duplicate key treated as unkeyed");
            free.push_back(i);
        } else {
            keyed.insert(node.key.as_str(), i);
        }
    }
    (keyed, free)
}

/// Aligns two sibling lists by key, unkeyed items pairing up in order.
///
/// Applying the result to the old list (removes highest first, then each insert placed
/// before whatever currently sits at its index) yields the new order.
pub fn diff_list(old: &[VNode], new: &[VNode]) -> ListDiff {
    let (old_keyed, _) = partition(old);
    let (new_keyed, mut new_free) = partition(new);

    let mut children = vec![None; old.len()];
    let mut new_to_old = vec![None; new.len()];
    let mut removes = Vec::new();

    for (i, node) in old.iter().enumerate() {
        let keyed_here = !node.key.is_empty() && old_keyed.get(node.key.as_str()) == Some(&i);
        let counterpart = if keyed_here {
            new_keyed.get(node.key.as_str()).copied()
        } else {
            new_free.pop_front()
        };
        match counterpart {
            Some(n) => {
                children[i] = Some(n);
                new_to_old[n] = Some(i);
            }
            None => removes.push(i),
        }
    }
    removes.reverse();

    let aligned: Vec<usize> = (0..old.len()).filter(|i| children[*i].is_some()).collect();
    let mut consumed = vec![false; old.len()];
    let mut next = 0;
    let mut inserts = Vec::new();
    for (index, source) in new_to_old.iter().enumerate() {
        while next < aligned.len() && consumed[aligned[next]] {
            next += 1;
        }
        match source {
            Some(o) if aligned.get(next) == Some(o) => {
                consumed[*o] = true;
                next += 1;
            }
            Some(o) => {
                consumed[*o] = true;
                inserts.push(Insert {
                    old_index: Some(*o),
                    index,
                });
            }
            None => inserts.push(Insert {
                old_index: None,
                index,
            }),
        }
    }

    ListDiff {
        children,
        moves: Moves { removes, inserts },
    }
}

/// Replays `moves` on a plain list. `fresh` supplies items for inserts without an old index.
pub fn apply_moves<T: Clone>(old: &[T], moves: &Moves, mut fresh: impl FnMut(usize) -> T) -> Vec<T> {
    let mut live: Vec<(Option<usize>, T)> = old.iter().cloned().enumerate().map(|(i, t)| (Some(i), t)).collect();
    for &r in &moves.removes {
        if r < live.len() {
            live.remove(r);
        }
    }
    for ins in &moves.inserts {
        let item = match ins.old_index {
            Some(o) => match live.iter().position(|(src, _)| *src == Some(o)) {
                Some(at) => live.remove(at),
                None => continue,
            },
            None => (None, fresh(ins.index)),
        };
        let at = ins.index.min(live.len());
        live.insert(at, item);
    }
    live.into_iter().map(|(_, t)| t).collect()
}
