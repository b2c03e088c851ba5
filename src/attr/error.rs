use crate::expr::ExprError;
use thiserror::Error;

/// A rejected attribute, located by its dotted path from the canvas root.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("attribute '{path}': {kind}")]
pub struct AttrError {
    pub path: String,
    pub kind: AttrErrorKind,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttrErrorKind {
    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error("expected {expected}, found {found}")]
    Type { expected: &'static str, found: String },

    #[error("unknown attribute")]
    UnknownKey,

    #[error("{value:?} is not one of: {options}")]
    Option { value: String, options: String },

    #[error("expected at most {max} entries, found {found}")]
    Length { max: usize, found: usize },

    #[error("'*' is reserved for the default template")]
    Wildcard,

    #[error("edge id {0:?} is not of the form source-target[-key] or source->target[-key]")]
    EdgeId(String),

    #[error("edge refers to node {0:?} deleted in the same update")]
    DeletedNode(String),
}

impl AttrError {
    pub fn new(path: &[String], kind: impl Into<AttrErrorKind>) -> Self {
        Self {
            path: if path.is_empty() {
                "<root>".to_string()
            } else {
                path.join(".")
            },
            kind: kind.into(),
        }
    }
}
