use crate::backend::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Query compilation error: {0}")]
    QueryCompilation(String),

    #[error("{operation}: not found")]
    NotFound {
        operation: String,
        #[source]
        source: BackendError,
    },

    #[error("{operation}: precondition failed")]
    PreconditionFailed {
        operation: String,
        #[source]
        source: BackendError,
    },

    #[error("{operation}: backend error")]
    BackendExecution {
        operation: String,
        #[source]
        source: BackendError,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AccessError {
    /// The backend failure behind this error, if any.
    #[must_use]
    pub const fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::NotFound { source, .. }
            | Self::PreconditionFailed { source, .. }
            | Self::BackendExecution { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The description of the operation that failed against the backend.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::NotFound { operation, .. }
            | Self::PreconditionFailed { operation, .. }
            | Self::BackendExecution { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

impl From<bson::ser::Error> for AccessError {
    fn from(e: bson::ser::Error) -> Self {
        Self::Mapping(e.to_string())
    }
}

impl From<bson::de::Error> for AccessError {
    fn from(e: bson::de::Error) -> Self {
        Self::Mapping(e.to_string())
    }
}

/// Fail with `InvalidArgument` when `value` is empty or whitespace only.
pub(crate) fn require_text(value: &str, what: &str) -> Result<(), AccessError> {
    if value.trim().is_empty() {
        return Err(AccessError::InvalidArgument(format!(
            "{what} should not be empty or only whitespaces"
        )));
    }
    Ok(())
}
