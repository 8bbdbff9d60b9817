use std::sync::Arc;

use quill_dom::{ComponentRef, Events, Map};

use crate::expr::{Program, Scope};
use crate::script::ModuleEnv;

/// Index of a node in [`Template::nodes`].
pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Slot,
    TemplateDef,
    Block,
    Import,
    Include,
    ScriptModule,
    Component,
    Text,
    If,
    For,
    ForItem,
    Native,
}

/// How a loop item is keyed.
#[derive(Debug)]
pub enum KeySpec {
    /// `wx:key="id"` reads `item.id`.
    Field(String),
    /// `wx:key="*this"` uses the item itself.
    This,
    /// `wx:key="{{ ... }}"` is evaluated with the item in scope.
    Expr(Program),
}

/// Statement attributes pulled off an element.
#[derive(Debug, Default)]
pub struct Statement {
    pub if_expr: Option<Program>,
    pub elif_expr: Option<Program>,
    pub else_flag: bool,
    pub for_expr: Option<Program>,
    pub for_item: String,
    pub for_index: String,
    pub for_key: Option<KeySpec>,
}

impl Statement {
    pub fn is_conditional(&self) -> bool {
        self.if_expr.is_some() || self.elif_expr.is_some() || self.else_flag
    }
}

#[derive(Debug)]
pub struct AstNode {
    pub kind: NodeKind,
    pub tag: String,
    pub component: Option<ComponentRef>,
    /// Text content, only for [`NodeKind::Text`].
    pub content: Option<Program>,
    pub attrs: Vec<(String, Program)>,
    pub events: Events,
    pub statement: Statement,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub index: usize,
    /// Previous member of an if/elif/else chain.
    pub chain_prev: Option<NodeId>,
    /// Declared name of a script module.
    pub module: Option<String>,
}

impl AstNode {
    pub(crate) fn new(kind: NodeKind, tag: impl Into<String>) -> Self {
        AstNode {
            kind,
            tag: tag.into(),
            component: None,
            content: None,
            attrs: Vec::new(),
            events: Events::new(),
            statement: Statement::default(),
            children: Vec::new(),
            parent: None,
            index: 0,
            chain_prev: None,
            module: None,
        }
    }
}

/// A compiled template. Immutable once built and safe to share between threads.
#[derive(Debug)]
pub struct Template {
    pub(crate) name: String,
    pub(crate) nodes: Vec<AstNode>,
    pub(crate) modules: Map,
    /// Keeps script-module functions alive.
    #[allow(dead_code)]
    pub(crate) envs: Vec<ModuleEnv>,
}

impl Template {
    pub const ROOT: NodeId = 0;

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id]
    }

    pub fn root(&self) -> &AstNode {
        &self.nodes[Self::ROOT]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root().children.is_empty()
    }

    /// Exports of every script module, by module name.
    pub fn modules(&self) -> &Map {
        &self.modules
    }

    /// Whether a conditional node renders in `scope`.
    ///
    /// Chain members are evaluated head first and evaluation stops at the first
    /// condition that holds, so later `elif` expressions are never touched needlessly.
    pub fn condition_holds(&self, id: NodeId, scope: &dyn Scope) -> bool {
        let node = &self.nodes[id];
        let st = &node.statement;
        if let Some(cond) = &st.if_expr {
            return cond.evaluate(scope).is_truthy();
        }
        let taken = node.chain_prev.is_some_and(|prev| self.chain_taken(prev, scope));
        if let Some(cond) = &st.elif_expr {
            return !taken && cond.evaluate(scope).is_truthy();
        }
        if st.else_flag {
            return !taken;
        }
        true
    }

    /// True when `id` or any member before it in its chain was selected.
    fn chain_taken(&self, id: NodeId, scope: &dyn Scope) -> bool {
        let node = &self.nodes[id];
        let st = &node.statement;
        if let Some(cond) = &st.if_expr {
            return cond.evaluate(scope).is_truthy();
        }
        match &st.elif_expr {
            Some(cond) => {
                node.chain_prev.is_some_and(|prev| self.chain_taken(prev, scope))
                    || cond.evaluate(scope).is_truthy()
            }
            None => false,
        }
    }

    /// Renders a compact outline of the tree, one node per line. Used by the CLI.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.outline_into(Self::ROOT, 0, &mut out);
        out
    }

    fn outline_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = &self.nodes[id];
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("{:?}", node.kind));
        if !node.tag.is_empty() {
            out.push_str(&format!(" <{}>", node.tag));
        }
        if let Some(ComponentRef(c)) = &node.component {
            out.push_str(&format!(" component={c}"));
        }
        if let Some(content) = &node.content {
            out.push_str(&format!(" {:?}", content.source()));
        }
        let st = &node.statement;
        for (label, prog) in [("if", &st.if_expr), ("elif", &st.elif_expr), ("for", &st.for_expr)] {
            if let Some(p) = prog {
                out.push_str(&format!(" {label}={:?}", p.source()));
            }
        }
        if st.else_flag {
            out.push_str(" else");
        }
        if node.kind == NodeKind::ForItem {
            out.push_str(&format!(" item={} index={}", st.for_item, st.for_index));
            match &st.for_key {
                Some(KeySpec::Field(f)) => out.push_str(&format!(" key={f}")),
                Some(KeySpec::This) => out.push_str(" key=*this"),
                Some(KeySpec::Expr(p)) => out.push_str(&format!(" key={:?}", p.source())),
                None => {}
            }
        }
        for (name, prog) in &node.attrs {
            out.push_str(&format!(" {name}={:?}", prog.source()));
        }
        for binding in node.events.values().flatten() {
            out.push_str(&format!(
                " {}{}:{}={}",
                if binding.capture { "capture-" } else { "" },
                if binding.catch { "catch" } else { "bind" },
                binding.name,
                binding.handler
            ));
        }
        if let Some(m) = &node.module {
            out.push_str(&format!(" module={m}"));
        }
        out.push('\n');
        for &child in &node.children {
            self.outline_into(child, depth + 1, out);
        }
    }
}

/// Templates are shared by every component instance built from them.
pub type SharedTemplate = Arc<Template>;
