use thiserror::Error;

/// Result type for model, datastore and adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The model type's schema cannot be normalized.
    #[error("model '{model}' is badly defined: {reason}")]
    Definition { model: String, reason: String },

    /// An operation was called without something it requires.
    #[error("{0}")]
    Usage(String),

    /// Neither the call options nor the model carry a datastore.
    #[error("{model}::{operation}() called without a repository")]
    MissingRepository {
        model: String,
        operation: &'static str,
    },

    /// The datastore could not be assembled.
    #[error("datastore setup failed: {0}")]
    Setup(String),

    #[error("record '{key}' missing")]
    NotFound { key: String },

    /// A stored record does not fit the model's schema.
    #[error("cannot decode field '{field}' of model '{model}': {reason}")]
    Decode {
        model: String,
        field: String,
        reason: String,
    },

    #[error("invalid adapter configuration: {0}")]
    Config(String),

    #[error("adapter lock poisoned during {0}")]
    LockPoisoned(&'static str),

    /// Any other backend failure, passed through unmodified.
    #[error("backend error: {0}")]
    Backend(String),
}

impl Error {
    pub(crate) fn definition(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Definition {
            model: model.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(
        model: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::Decode {
            model: model.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
