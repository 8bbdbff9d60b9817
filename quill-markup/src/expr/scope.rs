use std::borrow::Cow;
use std::sync::Arc;

use quill_dom::{Map, Value};

use crate::script::FunctionDef;

/// Name resolution for compiled expressions.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<Cow<'_, Value>>;

    /// Turns a function literal into a callable value. Only script modules support this.
    fn function(&self, def: &Arc<FunctionDef>) -> Value {
        tracing::trace!(function = ?def, "function literal outside a script module");
        Value::Undefined
    }
}

impl Scope for Map {
    fn lookup(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.get(name).map(Cow::Borrowed)
    }
}

/// Scope of one render: loop bindings, then component data, then script-module exports.
pub struct RenderScope<'a> {
    bindings: Vec<(String, Value)>,
    data: &'a Map,
    modules: &'a Map,
}

impl<'a> RenderScope<'a> {
    pub fn new(data: &'a Map, modules: &'a Map) -> Self {
        RenderScope {
            bindings: Vec::new(),
            data,
            modules,
        }
    }

    /// Shadows `name` until the matching [`pop`](Self::pop).
    pub fn push(&mut self, name: &str, value: Value) {
        self.bindings.push((name.to_string(), value));
    }

    pub fn pop(&mut self) {
        self.bindings.pop();
    }

    pub fn depth(&self) -> usize {
        self.bindings.len()
    }
}

impl Scope for RenderScope<'_> {
    fn lookup(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.bindings
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| self.data.get(name))
            .or_else(|| self.modules.get(name))
            .map(Cow::Borrowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innermost_binding_wins() {
        let data = Map::from([("item".to_string(), Value::from("data"))]);
        let modules = Map::from([("m1".to_string(), Value::from("module"))]);
        let mut scope = RenderScope::new(&data, &modules);
        assert_eq!(scope.lookup("item").as_deref(), Some(&Value::from("data")));

        scope.push("item", Value::from("outer"));
        scope.push("item", Value::from("inner"));
        assert_eq!(scope.lookup("item").as_deref(), Some(&Value::from("inner")));
        scope.pop();
        assert_eq!(scope.lookup("item").as_deref(), Some(&Value::from("outer")));
        scope.pop();
        assert_eq!(scope.depth(), 0);
        assert_eq!(scope.lookup("m1").as_deref(), Some(&Value::from("module")));
        assert!(scope.lookup("missing").is_none());
    }
}
