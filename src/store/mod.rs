//! Backing document store.
//!
//! Records are schemaless JSON objects grouped into named collections.
//! Queries are equality filters with at most one ordering clause; an ordered
//! query that also filters on other fields needs a composite index, and fails
//! with [`StoreError::IndexMissing`] until one is provisioned.

mod error;
mod memory;
mod sqlite;
mod types;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;
pub use types::*;

use async_trait::async_trait;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Appends a record and returns its store-assigned id.
    async fn insert(&self, collection: &str, document: NewDocument) -> StoreResult<String>;

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>>;

    /// Provisions a composite index. Idempotent.
    async fn ensure_index(&self, index: &IndexSpec) -> StoreResult<()>;
}

/// Current server time in the fixed-width form stored in timestamp fields.
pub(crate) fn server_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
