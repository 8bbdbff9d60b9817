use std::collections::HashMap;

use quill_dom::{NodeHandle, Value};

use crate::memory::MemoryHost;

/// An event delivered to a host node.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub target: NodeHandle,
    pub detail: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, target: NodeHandle) -> Self {
        Event {
            name: name.into(),
            target,
            detail: Value::Undefined,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Handlers by the name used in `bind:`/`catch:` attributes.
#[derive(Default)]
pub struct EventRegistry {
    handlers: HashMap<String, Box<dyn FnMut(&Event)>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F: FnMut(&Event) + 'static>(&mut self, name: impl Into<String>, f: F) {
        self.handlers.insert(name.into(), Box::new(f));
    }

    pub fn remove(&mut self, name: &str) {
        self.handlers.remove(name);
    }

    pub fn has(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    fn call(&mut self, handler: &str, event: &Event) -> bool {
        match self.handlers.get_mut(handler) {
            Some(f) => {
                f(event);
                true
            }
            None => {
                tracing::trace!(handler, event = %event.name, "no handler registered");
                false
            }
        }
    }
}

/// Delivers `event` along the path from the host root to its target.
///
/// Capture listeners run first, outermost first; then the bubbling listeners run from the
/// target outwards. A `catch` listener stops the event after it ran. Returns how many
/// handlers were invoked.
pub fn dispatch(host: &MemoryHost, event: &Event, registry: &mut EventRegistry) -> usize {
    let mut path = Vec::new();
    let mut cur = Some(event.target);
    while let Some(node) = cur {
        path.push(node);
        cur = host.parent(node);
    }
    path.reverse();

    let mut invoked = 0;
    let phases = [(true, path.clone()), (false, path.into_iter().rev().collect::<Vec<_>>())];
    for (capture, nodes) in phases {
        for node in nodes {
            let mut stop = false;
            for binding in host.listeners(node) {
                if binding.capture != capture || binding.name != event.name {
                    continue;
                }
                if registry.call(&binding.handler, event) {
                    invoked += 1;
                }
                stop |= binding.catch;
            }
            if stop {
                return invoked;
            }
        }
    }
    invoked
}
