use thiserror::Error;

use super::types::MutationKind;

/// Failure reported by a fetch or mutate collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("timeout")]
    Timeout,
}

impl SourceError {
    /// Returns true if the error is transient and the caller may retry.
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

impl From<sqlx::Error> for SourceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("row".to_string()),
            sqlx::Error::PoolTimedOut => Self::Timeout,
            sqlx::Error::Io(e) => Self::Transport(e.to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

/// Errors surfaced by a list instance. They never leak into other lists.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("fetch failed: {0}")]
    FetchFailed(#[source] SourceError),
    #[error("{kind} of {target_id} failed: {cause}")]
    MutationFailed {
        kind: MutationKind,
        target_id: String,
        #[source]
        cause: SourceError,
    },
    #[error("row {target_id} already has a pending mutation")]
    MutationConflict { target_id: String },
    #[error("rollback target {target_id} no longer exists")]
    RollbackTargetMissing { target_id: String },
    #[error("list {0} is shut down")]
    Closed(String),
    /// A reset replaced the rows this call was loading.
    #[error("list {0} was reset while loading")]
    Superseded(String),
}

impl ListError {
    /// Returns true if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailed(_) | Self::Superseded(_))
    }
}
