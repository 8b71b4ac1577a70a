//! Document store error types.

use super::IndexSpec;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// An ordered query needs a composite index that has not been provisioned.
    #[error("missing composite index: {index}")]
    IndexMissing { index: IndexSpec },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("malformed document {id}: {reason}")]
    Malformed { id: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_index_missing(&self) -> bool {
        matches!(self, Self::IndexMissing { .. })
    }
}
