use std::collections::BTreeMap;

use quill_dom::{ComponentRef, EventBinding, Map, Value};

use crate::ast::{AstNode, KeySpec, NodeId, NodeKind, Template};
use crate::config::MarkupConfig;
use crate::error::{MarkupError, Result};
use crate::expr::{Program, compile_text};
use crate::scanner::{self, EndKind, Handler, RawAttr};
use crate::script::{self, ModuleEnv};

/// Tag name to registered component name, for tags that differ from their component.
pub type Using = BTreeMap<String, String>;

/// Builds the template `name` from `markup`.
///
/// `known` answers whether a component name has been registered.
pub(crate) fn build(
    name: &str,
    markup: &str,
    config: &MarkupConfig,
    using: &Using,
    known: &dyn Fn(&str) -> bool,
) -> Result<Template> {
    let mut builder = Builder {
        config,
        using,
        known,
        nodes: vec![AstNode::new(NodeKind::Root, "")],
        stack: Vec::new(),
        modules: Map::new(),
        envs: Vec::new(),
    };
    scanner::scan(markup, &config.script_tag, &mut builder)?;
    Ok(Template {
        name: name.to_string(),
        nodes: builder.nodes,
        modules: builder.modules,
        envs: builder.envs,
    })
}

struct Open {
    element: NodeId,
    /// Accumulated body of a script module.
    script: String,
}

struct Builder<'a> {
    config: &'a MarkupConfig,
    using: &'a Using,
    known: &'a dyn Fn(&str) -> bool,
    nodes: Vec<AstNode>,
    stack: Vec<Open>,
    modules: Map,
    envs: Vec<ModuleEnv>,
}

/// Statement attributes before they are spread over the wrapper nodes.
#[derive(Default)]
struct Statements {
    if_expr: Option<Program>,
    elif_expr: Option<Program>,
    else_flag: bool,
    for_expr: Option<Program>,
    for_item: Option<String>,
    for_index: Option<String>,
    for_key: Option<KeySpec>,
}

impl Builder<'_> {
    fn classify(&self, tag: &str) -> Result<(NodeKind, Option<ComponentRef>)> {
        let kind = match tag {
            "slot" => NodeKind::Slot,
            "template" => NodeKind::TemplateDef,
            "block" => NodeKind::Block,
            "import" => NodeKind::Import,
            "include" => NodeKind::Include,
            t if t == self.config.script_tag => NodeKind::ScriptModule,
            t if self.config.is_native(t) => NodeKind::Native,
            t => {
                let target = self.using.get(t).map(String::as_str).unwrap_or(t);
                if !(self.known)(target) {
                    return Err(MarkupError::ComponentNotFound { tag: t.to_string() });
                }
                return Ok((NodeKind::Component, Some(ComponentRef(target.to_string()))));
            }
        };
        Ok((kind, None))
    }

    fn parent(&self) -> NodeId {
        self.stack.last().map_or(Template::ROOT, |open| open.element)
    }

    fn push(&mut self, mut node: AstNode, parent: NodeId) -> NodeId {
        let id = self.nodes.len();
        node.parent = Some(parent);
        node.index = self.nodes[parent].children.len();
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    fn attributes(&self, element: &mut AstNode, attrs: Vec<RawAttr>) -> Result<Statements> {
        let mut st = Statements::default();
        for RawAttr { name, value } in attrs {
            if element.kind == NodeKind::ScriptModule && name == "module" {
                element.module = value;
                continue;
            }
            if let Some(statement) = self.config.statement_name(&name) {
                let program = |v: &Option<String>| match v {
                    Some(v) => compile_text(v),
                    None => Ok(Program::constant(Value::Bool(true))),
                };
                match statement {
                    "if" => st.if_expr = Some(program(&value)?),
                    "elif" => st.elif_expr = Some(program(&value)?),
                    "else" => st.else_flag = true,
                    "for" | "for-items" => st.for_expr = Some(program(&value)?),
                    "for-item" => st.for_item = value.map(|v| v.trim().to_string()),
                    "for-index" => st.for_index = value.map(|v| v.trim().to_string()),
                    "key" | "for-key" => st.for_key = value.as_deref().map(key_spec).transpose()?.flatten(),
                    other => {
                        tracing::trace!(attr = %name, statement = other, "unknown statement kept as attribute");
                        element.attrs.push((name.clone(), attribute_program(value.as_deref())?));
                    }
                }
                continue;
            }
            if let Some(binding) = event_binding(&name, value.as_deref()) {
                element.events.entry(binding.name.clone()).or_default().push(binding);
                continue;
            }
            element.attrs.push((name, attribute_program(value.as_deref())?));
        }
        Ok(st)
    }

    /// Creates the wrapper nodes for `st` under `parent` and returns the node that
    /// should contain the element itself.
    ///
    /// A loop wraps an `if` so the condition sees the item. An `elif` or `else` wraps
    /// the loop instead, staying a sibling of the chain member it continues.
    fn wrap(&mut self, st: Statements, parent: NodeId) -> NodeId {
        let mut parent = parent;
        let mut cond = (st.if_expr.is_some() || st.elif_expr.is_some() || st.else_flag).then(|| {
            let mut cond = AstNode::new(NodeKind::If, "");
            cond.statement.if_expr = st.if_expr;
            cond.statement.elif_expr = st.elif_expr;
            cond.statement.else_flag = st.else_flag;
            cond
        });
        if let Some(chained) = cond.take_if(|c| c.statement.if_expr.is_none()) {
            parent = self.push_condition(chained, parent);
        }
        if let Some(for_expr) = st.for_expr {
            let mut for_node = AstNode::new(NodeKind::For, "");
            for_node.statement.for_expr = Some(for_expr);
            parent = self.push(for_node, parent);

            let mut item = AstNode::new(NodeKind::ForItem, "");
            item.statement.for_item = st.for_item.unwrap_or_else(|| "item".to_string());
            item.statement.for_index = st.for_index.unwrap_or_else(|| "index".to_string());
            item.statement.for_key = st.for_key;
            parent = self.push(item, parent);
        }
        if let Some(cond) = cond {
            parent = self.push_condition(cond, parent);
        }
        parent
    }

    fn push_condition(&mut self, cond: AstNode, parent: NodeId) -> NodeId {
        let chained = cond.statement.if_expr.is_none();
        let id = self.push(cond, parent);
        if chained {
            self.nodes[id].chain_prev = self.chain_head(id);
        }
        id
    }

    /// Previous sibling of `id` when it is an `if` or `elif` member. A looped member
    /// is found inside its `For > ForItem` wrappers.
    fn chain_head(&self, id: NodeId) -> Option<NodeId> {
        let node = &self.nodes[id];
        let siblings = &self.nodes[node.parent?].children;
        let mut prev = *siblings.get(node.index.checked_sub(1)?)?;
        if self.nodes[prev].kind == NodeKind::For {
            let item = *self.nodes[prev].children.first()?;
            prev = *self.nodes[item].children.first()?;
        }
        let p = &self.nodes[prev];
        (p.kind == NodeKind::If && (p.statement.if_expr.is_some() || p.statement.elif_expr.is_some()))
            .then_some(prev)
    }

    fn finish_module(&mut self, open: Open) -> Result<()> {
        let Some(name) = self.nodes[open.element].module.clone() else {
            tracing::debug!("script module without a name ignored");
            return Ok(());
        };
        let (env, exports) = script::evaluate_module(&name, &open.script)?;
        self.modules.insert(name, exports);
        self.envs.push(env);
        Ok(())
    }

    fn normalize(&self, text: &str) -> String {
        if self.config.collapse_whitespace {
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            text.trim().to_string()
        }
    }
}

impl Handler for Builder<'_> {
    fn start(&mut self, tag: &str, attrs: Vec<RawAttr>, self_closing: bool) -> Result<()> {
        let (kind, component) = self.classify(tag)?;
        let mut element = AstNode::new(kind, tag);
        element.component = component;
        let st = self.attributes(&mut element, attrs)?;

        let parent = self.parent();
        let holder = self.wrap(st, parent);
        let id = self.push(element, holder);
        if !self_closing {
            self.stack.push(Open {
                element: id,
                script: String::new(),
            });
        }
        Ok(())
    }

    fn end(&mut self, tag: &str, kind: EndKind) -> Result<()> {
        if kind == EndKind::EndOfInput {
            return Err(MarkupError::Unbalanced { tag: tag.to_string() });
        }
        let Some(open) = self.stack.pop() else {
            return Ok(());
        };
        if self.nodes[open.element].kind == NodeKind::ScriptModule {
            self.finish_module(open)?;
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if let Some(open) = self.stack.last_mut() {
            if self.nodes[open.element].kind == NodeKind::ScriptModule {
                open.script.push_str(text);
                return Ok(());
            }
        }
        let content = self.normalize(text);
        if content.is_empty() {
            return Ok(());
        }
        let mut node = AstNode::new(NodeKind::Text, "");
        node.content = Some(compile_text(&content)?);
        let parent = self.parent();
        self.push(node, parent);
        Ok(())
    }
}

fn attribute_program(value: Option<&str>) -> Result<Program> {
    match value {
        Some(v) => compile_text(v),
        None => Ok(Program::constant(Value::Bool(true))),
    }
}

fn key_spec(value: &str) -> Result<Option<KeySpec>> {
    let value = value.trim();
    Ok(match value {
        "" => None,
        "*this" => Some(KeySpec::This),
        v if v.contains("{{") => Some(KeySpec::Expr(compile_text(v)?)),
        v => Some(KeySpec::Field(v.to_string())),
    })
}

/// Parses `capture-bind:tap`, `catch:tap`, `bindtap` and friends.
fn event_binding(name: &str, handler: Option<&str>) -> Option<EventBinding> {
    let (capture, rest) = match name.strip_prefix("capture-") {
        Some(rest) => (true, rest),
        None => (false, name),
    };
    let (catch, rest) = if let Some(rest) = rest.strip_prefix("bind") {
        (false, rest)
    } else {
        (true, rest.strip_prefix("catch")?)
    };
    let event = rest.strip_prefix(':').unwrap_or(rest);
    if event.is_empty() {
        return None;
    }
    Some(EventBinding {
        name: event.to_string(),
        capture,
        catch,
        handler: handler.unwrap_or_default().trim().to_string(),
    })
}
