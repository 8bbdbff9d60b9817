use std::sync::Arc;

use pest::iterators::Pair;
use quill_dom::{Map, PathKey, Value};

use super::{Expr, PRATT, Rule, Scope};
use crate::script::{FunctionDef, function_def};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Logic {
    And,
    Or,
}

/// Parsed but not yet lowered expression.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    Literal(Value),
    Ident(String),
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
    Function(Arc<FunctionDef>),
    Member(Box<Node>, String),
    Index(Box<Node>, Box<Node>),
    Call(Box<Node>, Vec<Node>),
    Unary(UnaryOp, Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Logical(Logic, Box<Node>, Box<Node>),
    Ternary(Box<Node>, Box<Node>, Box<Node>),
}

/// Builds the tree of an `expr` pair.
pub(crate) fn build_expr(pair: Pair<'_, Rule>) -> Node {
    let mut inner = pair.into_inner();
    let Some(head) = inner.next() else {
        return Node::Literal(Value::Undefined);
    };
    let cond = build_binary(head);
    match (inner.next(), inner.next()) {
        (Some(then), Some(otherwise)) => Node::Ternary(
            Box::new(cond),
            Box::new(build_expr(then)),
            Box::new(build_expr(otherwise)),
        ),
        _ => cond,
    }
}

fn build_binary(pair: Pair<'_, Rule>) -> Node {
    PRATT
        .map_primary(build_primary)
        .map_prefix(|op, rhs| {
            let op = match op.as_rule() {
                Rule::not => UnaryOp::Not,
                Rule::neg => UnaryOp::Neg,
                _ => UnaryOp::Pos,
            };
            Node::Unary(op, Box::new(rhs))
        })
        .map_postfix(|lhs, op| match op.as_rule() {
            Rule::member => {
                let name = op.into_inner().next().map(|p| p.as_str().to_string()).unwrap_or_default();
                Node::Member(Box::new(lhs), name)
            }
            Rule::index => match op.into_inner().next() {
                Some(idx) => Node::Index(Box::new(lhs), Box::new(build_expr(idx))),
                None => Node::Literal(Value::Undefined),
            },
            _ => Node::Call(Box::new(lhs), op.into_inner().map(build_expr).collect()),
        })
        .map_infix(|lhs, op, rhs| {
            let (lhs, rhs) = (Box::new(lhs), Box::new(rhs));
            let bin = match op.as_rule() {
                Rule::or => return Node::Logical(Logic::Or, lhs, rhs),
                Rule::and => return Node::Logical(Logic::And, lhs, rhs),
                Rule::strict_eq => BinOp::StrictEq,
                Rule::strict_ne => BinOp::StrictNe,
                Rule::eq => BinOp::Eq,
                Rule::ne => BinOp::Ne,
                Rule::le => BinOp::Le,
                Rule::ge => BinOp::Ge,
                Rule::lt => BinOp::Lt,
                Rule::gt => BinOp::Gt,
                Rule::add => BinOp::Add,
                Rule::sub => BinOp::Sub,
                Rule::mul => BinOp::Mul,
                Rule::div => BinOp::Div,
                _ => BinOp::Rem,
            };
            Node::Binary(bin, lhs, rhs)
        })
        .parse(pair.into_inner())
}

fn build_primary(pair: Pair<'_, Rule>) -> Node {
    match pair.as_rule() {
        Rule::expr => build_expr(pair),
        Rule::number => Node::Literal(Value::Number(pair.as_str().parse().unwrap_or(f64::NAN))),
        Rule::string => Node::Literal(Value::String(string_literal(pair))),
        Rule::boolean => Node::Literal(Value::Bool(pair.as_str() == "true")),
        Rule::null => Node::Literal(Value::Null),
        Rule::undefined => Node::Literal(Value::Undefined),
        Rule::ident => Node::Ident(pair.as_str().to_string()),
        Rule::array => Node::Array(pair.into_inner().map(build_expr).collect()),
        Rule::object => Node::Object(pair.into_inner().map(build_property).collect()),
        Rule::function_expr => Node::Function(function_def(pair)),
        _ => Node::Literal(Value::Undefined),
    }
}

fn build_property(pair: Pair<'_, Rule>) -> (String, Node) {
    let mut inner = pair.into_inner();
    let key = match inner.next() {
        Some(k) if k.as_rule() == Rule::string => string_literal(k),
        Some(k) if k.as_rule() == Rule::number => Value::Number(k.as_str().parse().unwrap_or(f64::NAN)).to_text(),
        Some(k) => k.as_str().to_string(),
        None => String::new(),
    };
    let value = match inner.next() {
        Some(v) => build_expr(v),
        None => Node::Ident(key.clone()),
    };
    (key, value)
}

/// Unescapes the body of a quoted literal.
pub(crate) fn string_literal(pair: Pair<'_, Rule>) -> String {
    let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => out.push_str(&hex),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

enum Step {
    Name(String),
    Dynamic(Expr),
}

/// Lowers a node into a closure.
pub(crate) fn lower(node: Node) -> Expr {
    match node {
        Node::Literal(v) => Arc::new(move |_: &dyn Scope| v.clone()),
        Node::Ident(name) => Arc::new(move |s: &dyn Scope| s.lookup(&name).map(|v| v.into_owned()).unwrap_or_default()),
        node @ (Node::Member(..) | Node::Index(..)) => lower_path(node),
        Node::Array(items) => {
            let items: Vec<Expr> = items.into_iter().map(lower).collect();
            Arc::new(move |s: &dyn Scope| Value::Array(items.iter().map(|e| e(s)).collect()))
        }
        Node::Object(props) => {
            let props: Vec<(String, Expr)> = props.into_iter().map(|(k, v)| (k, lower(v))).collect();
            Arc::new(move |s: &dyn Scope| {
                Value::Object(props.iter().map(|(k, e)| (k.clone(), e(s))).collect::<Map>())
            })
        }
        Node::Function(def) => Arc::new(move |s: &dyn Scope| s.function(&def)),
        Node::Call(callee, args) => {
            let callee = lower(*callee);
            let args: Vec<Expr> = args.into_iter().map(lower).collect();
            Arc::new(move |s: &dyn Scope| match callee(s) {
                Value::Function(f) => f.call(args.iter().map(|a| a(s)).collect()),
                other => {
                    tracing::trace!(callee = other.type_name(), "call on a value that is not a function");
                    Value::Undefined
                }
            })
        }
        Node::Unary(op, operand) => {
            let operand = lower(*operand);
            Arc::new(move |s: &dyn Scope| {
                let v = operand(s);
                match op {
                    UnaryOp::Not => Value::Bool(!v.is_truthy()),
                    _ if v.is_undefined() => Value::Undefined,
                    UnaryOp::Neg => Value::Number(-v.to_number()),
                    UnaryOp::Pos => Value::Number(v.to_number()),
                }
            })
        }
        Node::Binary(op, lhs, rhs) => {
            let (lhs, rhs) = (lower(*lhs), lower(*rhs));
            Arc::new(move |s: &dyn Scope| binary(op, &lhs(s), &rhs(s)))
        }
        Node::Logical(logic, lhs, rhs) => {
            let (lhs, rhs) = (lower(*lhs), lower(*rhs));
            Arc::new(move |s: &dyn Scope| {
                let left = lhs(s);
                match (logic, left.is_truthy()) {
                    (Logic::And, true) | (Logic::Or, false) => rhs(s),
                    _ => left,
                }
            })
        }
        Node::Ternary(cond, then, otherwise) => {
            let (cond, then, otherwise) = (lower(*cond), lower(*then), lower(*otherwise));
            Arc::new(move |s: &dyn Scope| if cond(s).is_truthy() { then(s) } else { otherwise(s) })
        }
    }
}

/// `a.b[c].d` resolves `a` once and walks the rest by reference.
fn lower_path(node: Node) -> Expr {
    let mut steps = Vec::new();
    let mut cur = node;
    let root = loop {
        match cur {
            Node::Member(inner, name) => {
                steps.push(Step::Name(name));
                cur = *inner;
            }
            Node::Index(inner, idx) => {
                steps.push(Step::Dynamic(lower(*idx)));
                cur = *inner;
            }
            other => break other,
        }
    };
    steps.reverse();

    let keys = move |s: &dyn Scope| -> Vec<PathKey> {
        steps
            .iter()
            .map(|step| match step {
                Step::Name(n) => PathKey::Name(n.clone()),
                Step::Dynamic(e) => PathKey::from_value(&e(s)),
            })
            .collect()
    };

    match root {
        Node::Ident(name) => Arc::new(move |s: &dyn Scope| match s.lookup(&name) {
            Some(base) => base.get_path(&keys(s)),
            None => Value::Undefined,
        }),
        other => {
            let base = lower(other);
            Arc::new(move |s: &dyn Scope| base(s).get_path(&keys(s)))
        }
    }
}

/// Applies a binary operator. Arithmetic on `undefined` stays `undefined`.
pub fn binary(op: BinOp, a: &Value, b: &Value) -> Value {
    let arithmetic = matches!(op, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem);
    if arithmetic && (a.is_undefined() || b.is_undefined()) {
        return Value::Undefined;
    }
    match op {
        BinOp::Add => match (a, b) {
            (Value::Number(x), Value::Number(y)) => Value::Number(x + y),
            (Value::String(_) | Value::Array(_) | Value::Object(_), _)
            | (_, Value::String(_) | Value::Array(_) | Value::Object(_)) => {
                Value::String(format!("{}{}", a.to_text(), b.to_text()))
            }
            _ => Value::Number(a.to_number() + b.to_number()),
        },
        BinOp::Sub => Value::Number(a.to_number() - b.to_number()),
        BinOp::Mul => Value::Number(a.to_number() * b.to_number()),
        BinOp::Div => Value::Number(a.to_number() / b.to_number()),
        BinOp::Rem => Value::Number(a.to_number() % b.to_number()),
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => Value::Bool(compare(op, a, b)),
        BinOp::Eq => Value::Bool(a.loose_equals(b)),
        BinOp::Ne => Value::Bool(!a.loose_equals(b)),
        BinOp::StrictEq => Value::Bool(a.strict_equals(b)),
        BinOp::StrictNe => Value::Bool(!a.strict_equals(b)),
    }
}

fn compare(op: BinOp, a: &Value, b: &Value) -> bool {
    use std::cmp::Ordering;
    let ord = match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => a.to_number().partial_cmp(&b.to_number()),
    };
    match (op, ord) {
        (_, None) => false,
        (BinOp::Lt, Some(o)) => o == Ordering::Less,
        (BinOp::Gt, Some(o)) => o == Ordering::Greater,
        (BinOp::Le, Some(o)) => o != Ordering::Greater,
        (_, Some(o)) => o != Ordering::Less,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_concatenates_strings() {
        assert_eq!(binary(BinOp::Add, &Value::from(1), &Value::from(2)), Value::from(3));
        assert_eq!(binary(BinOp::Add, &Value::from("a"), &Value::from(1)), Value::from("a1"));
        assert_eq!(binary(BinOp::Add, &Value::Null, &Value::from(1)), Value::from(1));
        assert_eq!(binary(BinOp::Add, &Value::Undefined, &Value::from("x")), Value::Undefined);
    }

    #[test]
    fn comparisons() {
        assert_eq!(binary(BinOp::Lt, &Value::from("a"), &Value::from("b")), Value::Bool(true));
        assert_eq!(binary(BinOp::Ge, &Value::from(2), &Value::from("2")), Value::Bool(true));
        assert_eq!(binary(BinOp::Lt, &Value::Undefined, &Value::from(1)), Value::Bool(false));
        assert_eq!(binary(BinOp::StrictNe, &Value::from(1), &Value::from("1")), Value::Bool(true));
    }
}
