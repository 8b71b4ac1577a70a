use super::{
    Direction, Document, DocumentStore, IndexSpec, NewDocument, Query, StoreError, StoreResult,
    compare_values, server_now,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

struct Entry {
    collection: String,
    document: Document,
}

/// Process-local document store with the same index rules as the database store.
pub struct MemoryDocumentStore {
    entries: RwLock<Vec<Entry>>,
    indexes: RwLock<HashSet<IndexSpec>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            indexes: RwLock::new(HashSet::new()),
        }
    }

    /// Inserts a record verbatim, without stamping a server timestamp.
    ///
    /// Used to seed records written by older clients.
    pub fn insert_raw(&self, collection: &str, data: Value) -> StoreResult<String> {
        let Value::Object(data) = data else {
            return Err(StoreError::InvalidQuery(
                "raw documents must be JSON objects".to_string(),
            ));
        };
        let id = Uuid::new_v4().to_string();
        self.write_entries()?.push(Entry {
            collection: collection.to_string(),
            document: Document {
                id: id.clone(),
                data,
            },
        });
        Ok(id)
    }

    pub fn len(&self, collection: &str) -> usize {
        self.entries
            .read()
            .map(|entries| entries.iter().filter(|e| e.collection == collection).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn write_entries(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Vec<Entry>>> {
        self.entries
            .write()
            .map_err(|e| StoreError::Backend(format!("Lock poisoned: {e}")))
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, collection: &str, document: NewDocument) -> StoreResult<String> {
        let mut data = document.data;
        if let Some(field) = document.server_timestamp_field {
            data.insert(field, Value::String(server_now()));
        }
        self.insert_raw(collection, Value::Object(data))
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        if let Some(index) = IndexSpec::required_for(collection, query) {
            let indexes = self
                .indexes
                .read()
                .map_err(|e| StoreError::Backend(format!("Lock poisoned: {e}")))?;
            if !indexes.contains(&index) {
                return Err(StoreError::IndexMissing { index });
            }
        }

        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Backend(format!("Lock poisoned: {e}")))?;
        let mut documents: Vec<Document> = entries
            .iter()
            .filter(|e| e.collection == collection && query.matches(&e.document.data))
            .map(|e| e.document.clone())
            .collect();

        if let Some(order) = &query.order_by {
            documents.sort_by(|a, b| {
                let a = a.get(&order.field).unwrap_or(&Value::Null);
                let b = b.get(&order.field).unwrap_or(&Value::Null);
                match order.direction {
                    Direction::Ascending => compare_values(a, b),
                    Direction::Descending => compare_values(b, a),
                }
            });
        }

        debug!(
            "Memory store returned {} documents from {}",
            documents.len(),
            collection
        );
        Ok(documents)
    }

    async fn ensure_index(&self, index: &IndexSpec) -> StoreResult<()> {
        self.indexes
            .write()
            .map_err(|e| StoreError::Backend(format!("Lock poisoned: {e}")))?
            .insert(index.clone());
        Ok(())
    }
}
