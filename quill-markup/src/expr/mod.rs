//! The `{{ }}` expression language.
//!
//! Source text is parsed with pest, folded into a small [`Node`] tree with a Pratt parser and
//! then lowered into closures over a [`Scope`]. Compilation happens once per template; every
//! render only calls the closures.

mod compile;
mod program;
mod scope;

use std::sync::{Arc, LazyLock};

use pest::Parser;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use quill_dom::Value;

use crate::error::{MarkupError, Result};

pub use compile::{BinOp, binary};
pub(crate) use compile::{build_expr, lower};
pub use program::{Program, Segment, compile_text};
pub use scope::{RenderScope, Scope};

#[derive(pest_derive::Parser)]
#[grammar = "expr/grammar.pest"]
pub(crate) struct ExprParser;

/// A compiled expression.
pub type Expr = Arc<dyn Fn(&dyn Scope) -> Value + Send + Sync>;

pub(crate) static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::strict_eq, Assoc::Left)
            | Op::infix(Rule::strict_ne, Assoc::Left)
            | Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::ne, Assoc::Left))
        .op(Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left) | Op::infix(Rule::div, Assoc::Left) | Op::infix(Rule::rem, Assoc::Left))
        .op(Op::prefix(Rule::not) | Op::prefix(Rule::neg) | Op::prefix(Rule::pos))
        .op(Op::postfix(Rule::member) | Op::postfix(Rule::index) | Op::postfix(Rule::call))
});

/// Compiles a bare expression such as `a + b` or `list[index].name`.
pub fn compile_expr(text: &str) -> Result<Expr> {
    let mut pairs = ExprParser::parse(Rule::expression, text).map_err(|e| MarkupError::Expression {
        text: text.to_string(),
        message: e.variant.message().into_owned(),
    })?;
    let expression = pairs.next().ok_or_else(|| MarkupError::Expression {
        text: text.to_string(),
        message: "empty expression".to_string(),
    })?;
    let expr = expression
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| MarkupError::Expression {
            text: text.to_string(),
            message: "empty expression".to_string(),
        })?;
    Ok(lower(build_expr(expr)))
}
