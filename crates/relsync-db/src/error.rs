//! Database error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Map a unique-key violation to [`DbError::Duplicate`], keeping other errors as is.
    pub fn from_insert(err: sqlx::Error, what: impl FnOnce() -> String) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => DbError::Duplicate(what()),
            _ => DbError::Database(err),
        }
    }
}

impl From<DbError> for relsync_core::Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate(what) => relsync_core::Error::Conflict(what),
            other => relsync_core::Error::Store(other.to_string()),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
