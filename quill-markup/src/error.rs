use thiserror::Error;

/// Failures while turning markup into a template. All of them are fatal at registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("parse error at byte {offset}: `{fragment}`")]
    Scan { offset: usize, fragment: String },

    #[error("build ast error: <{tag}> is never closed")]
    Unbalanced { tag: String },

    #[error("component {tag} not found")]
    ComponentNotFound { tag: String },

    #[error("invalid expression `{text}`: {message}")]
    Expression { text: String, message: String },

    #[error("script module `{module}` does not parse: {message}")]
    Script { module: String, message: String },

    #[error("template `{name}` is already registered")]
    DuplicateTemplate { name: String },
}

pub type Result<T> = std::result::Result<T, MarkupError>;

/// Shortens `rest` to something readable inside an error message.
pub(crate) fn fragment(rest: &str) -> String {
    const MAX: usize = 40;
    match rest.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &rest[..cut]),
        None => rest.to_string(),
    }
}
