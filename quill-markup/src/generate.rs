use std::collections::HashSet;

use quill_dom::{Attr, Map, VKind, VNode, Value, parse_path, text};

use crate::ast::{KeySpec, NodeId, NodeKind, Template};
use crate::expr::{RenderScope, Scope};

/// Renders `template` against `data` into a fresh tree rooted at a [`VKind::Root`] node.
///
/// Never mutates the template; two calls with equal data yield equal trees.
pub fn generate(template: &Template, data: &Map) -> VNode {
    let mut generator = Generator {
        template,
        scope: RenderScope::new(data, &template.modules),
    };
    let mut children = Vec::new();
    generator.children(Template::ROOT, &mut children);
    VNode::root(children)
}

struct Generator<'a> {
    template: &'a Template,
    scope: RenderScope<'a>,
}

impl Generator<'_> {
    /// Generates the children of `id` into `out`, then clears repeated keys.
    fn children(&mut self, id: NodeId, out: &mut Vec<VNode>) {
        let template = self.template;
        for &child in &template.node(id).children {
            self.node(child, "", out);
        }
        let mut seen = HashSet::new();
        for node in out.iter_mut() {
            if !node.key.is_empty() && !seen.insert(node.key.clone()) {
                tracing::debug!(key = %node.key, tag = %node.tag, "duplicate key dropped");
                node.key.clear();
            }
        }
    }

    /// Generates `id` into `out`. Wrappers and blocks may add zero or many nodes.
    fn node(&mut self, id: NodeId, key: &str, out: &mut Vec<VNode>) {
        let template = self.template;
        let node = template.node(id);
        match node.kind {
            NodeKind::TemplateDef | NodeKind::Import | NodeKind::Include | NodeKind::ScriptModule => {}
            NodeKind::Text => {
                let content = node
                    .content
                    .as_ref()
                    .map(|p| p.evaluate(&self.scope).to_text())
                    .unwrap_or_default();
                out.push(text(content));
            }
            NodeKind::If => {
                if template.condition_holds(id, &self.scope) {
                    for &child in &node.children {
                        self.node(child, key, out);
                    }
                }
            }
            NodeKind::For => {
                let source = node
                    .statement
                    .for_expr
                    .as_ref()
                    .map(|p| p.evaluate(&self.scope))
                    .unwrap_or_default();
                for &item_node in &node.children {
                    for (item, index) in source.iter_items() {
                        self.item(item_node, item, index, out);
                    }
                }
            }
            NodeKind::ForItem | NodeKind::Root => {
                for &child in &node.children {
                    self.node(child, key, out);
                }
            }
            NodeKind::Block => {
                for &child in &node.children {
                    self.node(child, "", out);
                }
            }
            NodeKind::Slot | NodeKind::Component | NodeKind::Native => {
                let kind = match node.kind {
                    NodeKind::Slot => VKind::Slot,
                    NodeKind::Component => VKind::Component,
                    _ => VKind::Native,
                };
                let mut vnode = VNode::new(kind, node.tag.as_str()).with_key(key);
                vnode.component = node.component.clone();
                vnode.attrs = node
                    .attrs
                    .iter()
                    .map(|(name, program)| Attr {
                        name: name.clone(),
                        value: program.evaluate(&self.scope),
                    })
                    .collect();
                vnode.events = node.events.clone();
                self.children(id, &mut vnode.children);
                out.push(vnode);
            }
        }
    }

    /// One loop iteration: binds item and index, computes the key, renders the body.
    fn item(&mut self, id: NodeId, item: Value, index: Value, out: &mut Vec<VNode>) {
        let template = self.template;
        let node = template.node(id);
        if node.kind != NodeKind::ForItem {
            return self.node(id, "", out);
        }
        let st = &node.statement;
        self.scope.push(&st.for_item, item);
        self.scope.push(&st.for_index, index);
        let key = item_key(st.for_key.as_ref(), &st.for_item, &self.scope);
        for &child in &node.children {
            self.node(child, &key, out);
        }
        self.scope.pop();
        self.scope.pop();
    }
}

fn item_key(spec: Option<&KeySpec>, item_name: &str, scope: &dyn Scope) -> String {
    let item = || scope.lookup(item_name).map(|v| v.into_owned()).unwrap_or_default();
    let value = match spec {
        None => return String::new(),
        Some(KeySpec::This) => item(),
        Some(KeySpec::Field(field)) => match parse_path(field) {
            Some(path) => item().get_path(&path),
            None => Value::Undefined,
        },
        Some(KeySpec::Expr(program)) => program.evaluate(scope),
    };
    if value.is_nullish() { String::new() } else { value.to_text() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Registry;

    fn render(markup: &str, data: serde_json::Value) -> VNode {
        let template = Registry::default().compile(markup).unwrap();
        let Value::Object(data) = Value::from(data) else {
            panic!("data must be an object")
        };
        generate(&template, &data)
    }

    #[test]
    fn index_binding_shadows_data_only_inside_the_loop() {
        let tree = render(
            r#"<span wx:for="{{list}}">{{index}}</span><span>{{index}}</span>"#,
            serde_json::json!({ "list": ["a", "b"], "index": "outer" }),
        );
        let texts: Vec<String> = tree.children.iter().map(VNode::text_content).collect();
        assert_eq!(texts, ["0", "1", "outer"]);
    }

    #[test]
    fn field_keys_and_missing_keys() {
        let tree = render(
            r#"<i wx:for="{{list}}" wx:key="id"></i>"#,
            serde_json::json!({ "list": [{ "id": 1 }, {}, { "id": "x" }] }),
        );
        let keys: Vec<&str> = tree.children.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, ["1", "", "x"]);
    }
}
