#![forbid(unsafe_code)]

//! Errors surfaced at the data-fetch boundary.

/// A fetch, create or update failed in the data collaborator.
///
/// These are the only errors that reach a screen's failure banner.
/// Validation problems never become a `FetchError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Network or server failure.
    #[error("transport failure: {0}")]
    Transport(String),
    /// A load-by-id found nothing.
    #[error("entity {id} not found")]
    NotFound { id: String },
    /// The server rejected the request with a domain error.
    #[error("{code}: {message}")]
    Domain { code: String, message: String },
}

impl FetchError {
    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Convenience constructor for missing entities.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Whether this is a [`FetchError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Message suitable for a banner.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => "Could not reach the server. Please try again.".to_string(),
            Self::NotFound { .. } => "The requested record no longer exists.".to_string(),
            Self::Domain { message, .. } => message.clone(),
        }
    }
}
