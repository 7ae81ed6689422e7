//! Store error types.

use docvault_validator::VaultError;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by connectors and collections.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document `{id}` not found in `{collection}`")]
    NotFound { collection: String, id: String },

    #[error("document `{id}` already exists in `{collection}`")]
    AlreadyExists { collection: String, id: String },

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Validation(#[from] VaultError),

    #[error("failed to decode document: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::Validation(_) => "VALIDATION",
            Self::Decode(_) => "DECODE",
        }
    }

    /// The validation error, when the operation failed before reaching the
    /// store.
    pub fn validation(&self) -> Option<&VaultError> {
        match self {
            Self::Validation(error) => Some(error),
            _ => None,
        }
    }
}
