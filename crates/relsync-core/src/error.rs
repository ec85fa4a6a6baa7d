//! Error types for relsync.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("package not found: {0}")]
    PackageNotFound(String),

    #[error("invalid repository url: {0}")]
    InvalidRepoUrl(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("release store error: {0}")]
    Store(String),

    #[error("job queue error: {0}")]
    Queue(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors raised before anything was read from or written to a store.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::PackageNotFound(_) | Error::InvalidRepoUrl(_) | Error::InvalidInput(_)
        )
    }

    /// Errors raised by the release store or the job queue.
    pub fn is_persistence_error(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Queue(_) | Error::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
