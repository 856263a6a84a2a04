use crate::backend::{BackendError, status};
use crate::errors::AccessError;

/// Backend-facing operation a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Upsert,
    FindById,
    Find,
    Paginate,
    Exists,
    Count,
    DeleteById,
    Delete,
    CreateCollection,
    DeleteCollection,
}

impl Operation {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Upsert => "upsert",
            Self::FindById => "find_by_id",
            Self::Find => "find",
            Self::Paginate => "paginate",
            Self::Exists => "exists",
            Self::Count => "count",
            Self::DeleteById => "delete_by_id",
            Self::Delete => "delete",
            Self::CreateCollection => "create_collection",
            Self::DeleteCollection => "delete_collection",
        }
    }

    /// Description attached to translated errors.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Insert => "Failed to insert item",
            Self::Upsert => "Failed to upsert item",
            Self::FindById => "Failed to find item",
            Self::Find => "Failed to find items",
            Self::Paginate => "Failed to query page",
            Self::Exists => "Failed to check existence",
            Self::Count => "Failed to count items",
            Self::DeleteById => "Failed to delete item",
            Self::Delete => "Failed to delete items by query",
            Self::CreateCollection => "Failed to create collection",
            Self::DeleteCollection => "Failed to delete collection",
        }
    }

    /// Reads that turn "not found" into an empty result instead of an error.
    #[must_use]
    pub const fn recovers_not_found(self) -> bool {
        matches!(self, Self::FindById | Self::Find | Self::Paginate | Self::Exists)
    }
}

/// Maps a backend failure onto the typed taxonomy.
#[must_use]
pub fn translate(operation: Operation, source: BackendError) -> AccessError {
    let operation = operation.description().to_string();
    match source.status() {
        status::NOT_FOUND => AccessError::NotFound { operation, source },
        status::PRECONDITION_FAILED => AccessError::PreconditionFailed { operation, source },
        _ => AccessError::BackendExecution { operation, source },
    }
}

/// Replaces a not-found failure with `empty()` when the operation may absorb it.
pub(crate) fn recover<R>(operation: Operation, result: Result<R, AccessError>, empty: impl FnOnce() -> R) -> Result<R, AccessError> {
    match result {
        Err(AccessError::NotFound { .. }) if operation.recovers_not_found() => Ok(empty()),
        other => other,
    }
}
