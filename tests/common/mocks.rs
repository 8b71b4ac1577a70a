use async_trait::async_trait;
use healthmate::{
    Error, Result,
    llm::{GenerativeBackend, GenerativeModel},
    store::{
        Document, DocumentStore, IndexSpec, MemoryDocumentStore, NewDocument, Query, StoreError,
        StoreResult,
    },
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Mock generative backend for testing
#[derive(Debug, Default)]
pub struct MockBackend {
    pub unavailable: HashSet<String>,
    pub responses: Arc<Mutex<Vec<String>>>,
    /// (model id, prompt) for every generate call
    pub requests: Arc<Mutex<Vec<(String, String)>>>,
    pub error: Option<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(self, responses: Vec<&str>) -> Self {
        *self.responses.lock().unwrap() = responses.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_unavailable(mut self, model_id: &str) -> Self {
        self.unavailable.insert(model_id.to_string());
        self
    }

    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn get_requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

impl GenerativeBackend for MockBackend {
    fn acquire(&self, model_id: &str) -> Result<Arc<dyn GenerativeModel>> {
        if self.unavailable.contains(model_id) {
            return Err(Error::generation(format!("{model_id} is not available")));
        }
        Ok(Arc::new(MockModel {
            id: model_id.to_string(),
            responses: Arc::clone(&self.responses),
            requests: Arc::clone(&self.requests),
            error: self.error.clone(),
        }))
    }
}

struct MockModel {
    id: String,
    responses: Arc<Mutex<Vec<String>>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
    error: Option<String>,
}

#[async_trait]
impl GenerativeModel for MockModel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((self.id.clone(), prompt.to_string()));

        if let Some(ref error) = self.error {
            return Err(Error::generation(error.clone()));
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(Error::generation("No more mock responses available"));
        }
        Ok(responses.remove(0))
    }
}

/// Document store whose every operation fails with a backend error
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl DocumentStore for FailingStore {
    async fn insert(&self, _collection: &str, _document: NewDocument) -> StoreResult<String> {
        Err(StoreError::Backend("write rejected".to_string()))
    }

    async fn query(&self, _collection: &str, _query: &Query) -> StoreResult<Vec<Document>> {
        Err(StoreError::Backend("permission denied".to_string()))
    }

    async fn ensure_index(&self, _index: &IndexSpec) -> StoreResult<()> {
        Err(StoreError::Backend("read-only".to_string()))
    }
}

/// Memory store that rejects any query filtering on `userId` alone.
///
/// Partitioned reads succeed, so the failure lands on the legacy step.
#[derive(Default)]
pub struct LegacyFailingStore {
    pub inner: MemoryDocumentStore,
}

#[async_trait]
impl DocumentStore for LegacyFailingStore {
    async fn insert(&self, collection: &str, document: NewDocument) -> StoreResult<String> {
        self.inner.insert(collection, document).await
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        if query.filters.len() == 1 && query.filters[0].field == "userId" {
            return Err(StoreError::Backend("legacy scan refused".to_string()));
        }
        self.inner.query(collection, query).await
    }

    async fn ensure_index(&self, index: &IndexSpec) -> StoreResult<()> {
        self.inner.ensure_index(index).await
    }
}
