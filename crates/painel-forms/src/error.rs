#![forbid(unsafe_code)]

//! Engine errors.
//!
//! [`ValidationError`](crate::validation::ValidationError) never leaves the
//! form; it only flips validity. [`BlockReason`] reports why a submit did not
//! dispatch. [`FetchError`] is the only error that reaches a failed submit or
//! load. [`FormError`] reports misuse of the form API.

pub use painel_runtime::FetchError;

/// Programming errors against a form's declared shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    /// No field with this name was declared.
    #[error("unknown field `{0}`")]
    UnknownField(String),
    /// No list section with this name was declared.
    #[error("unknown list section `{0}`")]
    UnknownList(String),
    /// A field or list name was declared twice.
    #[error("`{0}` declared twice")]
    Duplicate(String),
    /// A pattern validator failed to compile.
    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Why a submit was blocked before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockReason {
    /// At least one field or cross-field rule failed.
    #[error("form has validation errors")]
    Invalid,
    /// A required list section has no items.
    #[error("`{0}` must contain at least one item")]
    EmptyCollection(String),
}

impl BlockReason {
    /// Message suitable for a form-level notice.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid => "Please fix the highlighted fields.".to_string(),
            Self::EmptyCollection(name) => format!("Add at least one item to {name}."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            FormError::UnknownField("nome".into()).to_string(),
            "unknown field `nome`"
        );
        assert_eq!(
            BlockReason::EmptyCollection("options".into()).to_string(),
            "`options` must contain at least one item"
        );
        assert_ne!(BlockReason::Invalid, BlockReason::EmptyCollection("x".into()));
    }
}
