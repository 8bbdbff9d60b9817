//! Markup front end: scanning, expressions, script modules, the template AST and
//! the generator that turns a template plus data into a virtual tree.

pub mod ast;
mod builder;
pub mod config;
pub mod error;
pub mod expr;
pub mod generate;
pub mod registry;
pub mod scanner;
pub mod script;

pub use ast::{AstNode, KeySpec, NodeId, NodeKind, SharedTemplate, Statement, Template};
pub use builder::Using;
pub use config::MarkupConfig;
pub use error::{MarkupError, Result};
pub use expr::{Program, compile_expr, compile_text};
pub use generate::generate;
pub use registry::Registry;
