//! Script modules: the statement subset run once per template to produce exports.
//!
//! Module-level code writes into a shared environment. Function bodies read that
//! environment but write only to their own frame, so nothing a render calls can change
//! a template after it was built.

use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use pest::Parser;
use pest::iterators::Pair;
use quill_dom::{Callable, Map, PathKey, Value};

use crate::error::{MarkupError, Result};
use crate::expr::{BinOp, Expr, ExprParser, Rule, Scope, binary, build_expr, lower};

/// Top-level bindings of one script module.
pub type ModuleEnv = Arc<RwLock<Map>>;

const MAX_CALL_DEPTH: usize = 64;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    body: Vec<Stmt>,
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

enum Stmt {
    Declare(Vec<(String, Option<Expr>)>),
    Assign { target: Target, op: AssignOp, value: Expr },
    Function(Arc<FunctionDef>),
    Return(Option<Expr>),
    If { cond: Expr, then: Box<Stmt>, otherwise: Option<Box<Stmt>> },
    Block(Vec<Stmt>),
    Expr(Expr),
    Empty,
}

#[derive(Clone, Copy)]
enum AssignOp {
    Set,
    Add,
    Sub,
}

struct Target {
    root: String,
    steps: Vec<TargetStep>,
}

enum TargetStep {
    Name(String),
    Dynamic(Expr),
}

enum Flow {
    Normal,
    Return(Value),
}

/// Builds a function from a `function_expr` or `function_decl` pair.
pub(crate) fn function_def(pair: Pair<'_, Rule>) -> Arc<FunctionDef> {
    let mut name = None;
    let mut params = Vec::new();
    let mut body = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::name => name = Some(p.as_str().to_string()),
            Rule::params => params = p.into_inner().map(|n| n.as_str().to_string()).collect(),
            Rule::block => body = p.into_inner().map(build_stmt).collect(),
            _ => {}
        }
    }
    Arc::new(FunctionDef { name, params, body })
}

fn build_stmt(pair: Pair<'_, Rule>) -> Stmt {
    match pair.as_rule() {
        Rule::block => Stmt::Block(pair.into_inner().map(build_stmt).collect()),
        Rule::var_decl => Stmt::Declare(
            pair.into_inner()
                .filter(|p| p.as_rule() == Rule::declarator)
                .map(|d| {
                    let mut inner = d.into_inner();
                    let name = inner.next().map(|n| n.as_str().to_string()).unwrap_or_default();
                    (name, inner.next().map(|e| lower(build_expr(e))))
                })
                .collect(),
        ),
        Rule::function_decl => Stmt::Function(function_def(pair)),
        Rule::return_stmt => Stmt::Return(
            pair.into_inner()
                .find(|p| p.as_rule() == Rule::expr)
                .map(|e| lower(build_expr(e))),
        ),
        Rule::if_stmt => {
            let mut cond = None;
            let mut then = None;
            let mut otherwise = None;
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::expr => cond = Some(lower(build_expr(p))),
                    Rule::then => then = p.into_inner().next().map(|s| Box::new(build_stmt(s))),
                    Rule::otherwise => otherwise = p.into_inner().next().map(|s| Box::new(build_stmt(s))),
                    _ => {}
                }
            }
            match (cond, then) {
                (Some(cond), Some(then)) => Stmt::If { cond, then, otherwise },
                _ => Stmt::Empty,
            }
        }
        Rule::assign_stmt => {
            let mut target = None;
            let mut op = AssignOp::Set;
            let mut value = None;
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::target => target = Some(build_target(p)),
                    Rule::assign_op => {
                        op = match p.as_str() {
                            "+=" => AssignOp::Add,
                            "-=" => AssignOp::Sub,
                            _ => AssignOp::Set,
                        }
                    }
                    Rule::expr => value = Some(lower(build_expr(p))),
                    _ => {}
                }
            }
            match (target, value) {
                (Some(target), Some(value)) => Stmt::Assign { target, op, value },
                _ => Stmt::Empty,
            }
        }
        Rule::expr_stmt => match pair.into_inner().next() {
            Some(e) => Stmt::Expr(lower(build_expr(e))),
            None => Stmt::Empty,
        },
        _ => Stmt::Empty,
    }
}

fn build_target(pair: Pair<'_, Rule>) -> Target {
    let mut inner = pair.into_inner();
    let root = inner.next().map(|p| p.as_str().to_string()).unwrap_or_default();
    let steps = inner
        .filter_map(|step| match step.as_rule() {
            Rule::member => step.into_inner().next().map(|n| TargetStep::Name(n.as_str().to_string())),
            Rule::index => step
                .into_inner()
                .next()
                .map(|e| TargetStep::Dynamic(lower(build_expr(e)))),
            _ => None,
        })
        .collect();
    Target { root, steps }
}

/// Runs a module body once and returns its environment together with `module.exports`.
///
/// The environment must outlive every function found in the exports.
pub fn evaluate_module(name: &str, source: &str) -> Result<(ModuleEnv, Value)> {
    let mut pairs = ExprParser::parse(Rule::module, source).map_err(|e| MarkupError::Script {
        module: name.to_string(),
        message: e.variant.message().into_owned(),
    })?;
    let body: Vec<Stmt> = pairs
        .next()
        .map(|module| {
            module
                .into_inner()
                .filter(|p| p.as_rule() != Rule::EOI)
                .map(build_stmt)
                .collect()
        })
        .unwrap_or_default();

    let module = Value::object([("exports", Value::Object(Map::new()))]);
    let env: ModuleEnv = Arc::new(RwLock::new(Map::from([("module".to_string(), module)])));
    let mut frame = Frame {
        locals: Map::new(),
        env: Arc::downgrade(&env),
        module_level: true,
    };
    frame.exec(&body);

    let exports = frame.lookup("exports").map(Cow::into_owned).unwrap_or_default();
    tracing::debug!(module = name, exports = %exports.to_json(), "evaluated script module");
    Ok((env, exports))
}

struct Frame {
    locals: Map,
    env: Weak<RwLock<Map>>,
    module_level: bool,
}

impl Scope for Frame {
    fn lookup(&self, name: &str) -> Option<Cow<'_, Value>> {
        if let Some(v) = self.locals.get(name) {
            return Some(Cow::Borrowed(v));
        }
        let env = self.env.upgrade()?;
        let globals = env.read().ok()?;
        match globals.get(name) {
            Some(v) => Some(Cow::Owned(v.clone())),
            None if name == "exports" => globals
                .get("module")
                .map(|m| Cow::Owned(m.get_path(&[PathKey::Name("exports".into())]))),
            None => None,
        }
    }

    fn function(&self, def: &Arc<FunctionDef>) -> Value {
        Value::Function(Arc::new(ScriptFunction {
            def: def.clone(),
            env: self.env.clone(),
            captured: self.locals.clone(),
        }))
    }
}

impl Frame {
    fn exec(&mut self, body: &[Stmt]) -> Flow {
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    let f = self.function(def);
                    self.write(name, f);
                }
            }
        }
        for stmt in body {
            if let Flow::Return(v) = self.exec_one(stmt) {
                return Flow::Return(v);
            }
        }
        Flow::Normal
    }

    fn exec_one(&mut self, stmt: &Stmt) -> Flow {
        match stmt {
            Stmt::Declare(decls) => {
                for (name, init) in decls {
                    let value = init.as_ref().map(|e| e(&*self)).unwrap_or_default();
                    self.write(name, value);
                }
            }
            Stmt::Assign { target, op, value } => self.assign(target, *op, value),
            Stmt::Function(_) | Stmt::Empty => {}
            Stmt::Return(e) => return Flow::Return(e.as_ref().map(|e| e(&*self)).unwrap_or_default()),
            Stmt::If { cond, then, otherwise } => {
                if cond(&*self).is_truthy() {
                    return self.exec_one(then);
                } else if let Some(otherwise) = otherwise {
                    return self.exec_one(otherwise);
                }
            }
            Stmt::Block(body) => return self.exec(body),
            Stmt::Expr(e) => {
                e(&*self);
            }
        }
        Flow::Normal
    }

    fn assign(&mut self, target: &Target, op: AssignOp, value: &Expr) {
        let mut value = value(&*self);
        let mut keys: Vec<PathKey> = target
            .steps
            .iter()
            .map(|step| match step {
                TargetStep::Name(n) => PathKey::Name(n.clone()),
                TargetStep::Dynamic(e) => PathKey::from_value(&e(&*self)),
            })
            .collect();

        let mut root = target.root.clone();
        if root == "exports" && !self.declares("exports") {
            root = "module".to_string();
            keys.insert(0, PathKey::Name("exports".into()));
        }

        let mut base = self.lookup(&root).map(Cow::into_owned).unwrap_or_default();
        if let AssignOp::Add | AssignOp::Sub = op {
            let current = base.get_path(&keys);
            let bin = if let AssignOp::Add = op { BinOp::Add } else { BinOp::Sub };
            value = binary(bin, &current, &value);
        }
        base.set_path(&keys, value);
        self.write(&root, base);
    }

    /// A binding declared under exactly this name, ignoring the `exports` alias.
    fn declares(&self, name: &str) -> bool {
        self.locals.contains_key(name)
            || self
                .env
                .upgrade()
                .is_some_and(|env| env.read().is_ok_and(|globals| globals.contains_key(name)))
    }

    fn write(&mut self, name: &str, value: Value) {
        if !self.module_level {
            self.locals.insert(name.to_string(), value);
            return;
        }
        if let Some(env) = self.env.upgrade() {
            if let Ok(mut globals) = env.write() {
                globals.insert(name.to_string(), value);
            }
        }
    }
}

/// A function value created by a script module.
pub struct ScriptFunction {
    def: Arc<FunctionDef>,
    env: Weak<RwLock<Map>>,
    captured: Map,
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptFunction").field("def", &self.def).finish_non_exhaustive()
    }
}

impl Callable for ScriptFunction {
    fn call(&self, args: Vec<Value>) -> Value {
        let depth = CALL_DEPTH.with(|d| {
            d.set(d.get() + 1);
            d.get()
        });
        let result = if depth > MAX_CALL_DEPTH {
            tracing::warn!(function = ?self.def.name, "script call depth exceeded");
            Value::Undefined
        } else {
            let mut frame = Frame {
                locals: self.captured.clone(),
                env: self.env.clone(),
                module_level: false,
            };
            let mut args = args.into_iter();
            for param in &self.def.params {
                frame.locals.insert(param.clone(), args.next().unwrap_or_default());
            }
            match frame.exec(&self.def.body) {
                Flow::Return(v) => v,
                Flow::Normal => Value::Undefined,
            }
        };
        CALL_DEPTH.with(|d| d.set(d.get() - 1));
        result
    }
}
