use std::sync::Arc;

use quill_dom::diff::diff;
use quill_dom::{Map, NodeHandle, VNode, Value, parse_path};
use quill_markup::{Template, generate};
use quill_renderer::{Event, EventRegistry, Host, HostError, MemoryHost, apply, dispatch, mount};

use crate::tick::TickQueue;

/// A mounted template instance.
///
/// Owns its data and the tree of the last render; every data change renders again, diffs
/// against that tree and patches the host.
pub struct Component<H: Host = MemoryHost> {
    template: Arc<Template>,
    data: Map,
    host: H,
    container: NodeHandle,
    tree: VNode,
    tick: TickQueue<Component<H>>,
}

impl<H: Host> Component<H> {
    /// Renders `template` with `data` into `container`.
    pub fn mount(template: Arc<Template>, data: Map, mut host: H, container: NodeHandle) -> Result<Self, H::Error> {
        let mut tree = generate(&template, &data);
        mount(&mut host, container, &mut tree)?;
        tracing::debug!(template = template.name(), %container, "component mounted");
        Ok(Component {
            template,
            data,
            host,
            container,
            tree,
            tick: TickQueue::default(),
        })
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn data(&self) -> &Map {
        &self.data
    }

    /// The tree of the last render, with host handles attached.
    pub fn tree(&self) -> &VNode {
        &self.tree
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn container(&self) -> NodeHandle {
        self.container
    }

    /// Merges `patch` into the data and brings the host up to date.
    ///
    /// Keys may be paths such as `list[1].name`; only that path is replaced.
    pub fn set_data(&mut self, patch: Map) -> Result<(), H::Error> {
        let mut data = Value::Object(std::mem::take(&mut self.data));
        for (key, value) in patch {
            match parse_path(&key) {
                Some(path) => data.set_path(&path, value),
                None => {
                    if let Value::Object(map) = &mut data {
                        map.insert(key, value);
                    }
                }
            }
        }
        self.data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.update()
    }

    /// Like [`set_data`](Self::set_data); `then` runs at the next [`tick`](Self::tick).
    pub fn set_data_then(&mut self, patch: Map, then: impl FnOnce(&Self) + 'static) -> Result<(), H::Error> {
        self.set_data(patch)?;
        self.tick.defer(then);
        Ok(())
    }

    /// Runs callbacks deferred before this call and returns how many ran.
    pub fn tick(&mut self) -> usize {
        let due = self.tick.take();
        let count = due.len();
        for f in due {
            f(self);
        }
        count
    }

    /// Pending deferred callbacks.
    pub fn pending(&self) -> usize {
        self.tick.len()
    }

    fn update(&mut self) -> Result<(), H::Error> {
        let next = generate(&self.template, &self.data);
        let patches = diff(&self.tree, &next);
        tracing::debug!(template = self.template.name(), patches = patches.len(), "update");
        apply(&mut self.host, self.container, &mut self.tree, &patches)
    }
}

impl Component<MemoryHost> {
    /// Mounts into the root of a fresh [`MemoryHost`].
    pub fn new(template: Arc<Template>, data: Map) -> Result<Self, HostError> {
        let host = MemoryHost::new();
        let root = host.root();
        Self::mount(template, data, host, root)
    }

    /// HTML of everything rendered into the container.
    pub fn to_html(&self) -> String {
        self.host.inner_html(self.container)
    }

    /// First rendered node whose attribute `name` prints as `value`.
    pub fn find_by_attr(&self, name: &str, value: &str) -> Option<NodeHandle> {
        self.host.find_by_attr(self.container, name, value)
    }

    /// Fires `event` at `target` and returns how many handlers ran.
    pub fn trigger(&self, event: &str, target: NodeHandle, registry: &mut EventRegistry) -> usize {
        dispatch(&self.host, &Event::new(event, target), registry)
    }
}
