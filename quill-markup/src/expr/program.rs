use std::fmt;
use std::sync::Arc;

use quill_dom::Value;

use super::{Expr, Scope, compile_expr};
use crate::error::Result;

pub enum Segment {
    Text(String),
    Expr(Expr),
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Segment::Expr(_) => f.write_str("Expr(..)"),
        }
    }
}

/// Literal text interleaved with compiled `{{ }}` expressions.
///
/// A program made of one expression yields that expression's raw value, which is how
/// attributes and loop sources receive arrays, objects and booleans.
#[derive(Debug)]
pub struct Program {
    source: String,
    segments: Vec<Segment>,
}

impl Program {
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        Program {
            segments: vec![Segment::Text(text.clone())],
            source: text,
        }
    }

    /// A program that always yields `value`, e.g. `true` for a bare attribute.
    pub fn constant(value: Value) -> Self {
        Program {
            source: value.to_text(),
            segments: vec![Segment::Expr(Arc::new(move |_: &dyn Scope| value.clone()))],
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True when the program holds no expression at all.
    pub fn is_static(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Text(_)))
    }

    pub fn evaluate(&self, scope: &dyn Scope) -> Value {
        match self.segments.as_slice() {
            [] => Value::String(String::new()),
            [Segment::Expr(e)] => e(scope),
            [Segment::Text(t)] => Value::String(t.clone()),
            segments => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        Segment::Text(t) => out.push_str(t),
                        Segment::Expr(e) => out.push_str(&e(scope).to_text()),
                    }
                }
                Value::String(out)
            }
        }
    }
}

/// Splits `text` into literal and `{{ }}` segments.
///
/// An opening `{{` without a closing `}}` stays literal text.
pub fn compile_text(text: &str) -> Result<Program> {
    let mut segments = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let Some(open) = rest.find("{{") else {
            segments.push(Segment::Text(rest.to_string()));
            break;
        };
        let Some(close) = rest[open + 2..].find("}}") else {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            segments.push(Segment::Text(rest[open..].to_string()));
            break;
        };
        if open > 0 {
            segments.push(Segment::Text(rest[..open].to_string()));
        }
        let inner = &rest[open + 2..open + 2 + close];
        if inner.trim().is_empty() {
            segments.push(Segment::Expr(Arc::new(|_: &dyn Scope| Value::Undefined)));
        } else {
            segments.push(Segment::Expr(compile_expr(inner)?));
        }
        rest = &rest[open + 2 + close + 2..];
    }
    Ok(Program {
        source: text.to_string(),
        segments,
    })
}
