use healthmate::{
    HistoryStore,
    config::{LlmConfig, LlmProvider},
    store::{DocumentStore, MemoryDocumentStore, NewDocument, SqliteDocumentStore},
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    Sqlite,
}

/// A history store over a fresh backend, with seeding helpers
pub struct Fixture {
    pub store: Arc<dyn DocumentStore>,
    pub history: HistoryStore,
}

impl Fixture {
    pub async fn new(backend: Backend, indexed: bool) -> Self {
        let store: Arc<dyn DocumentStore> = match backend {
            Backend::Memory => Arc::new(MemoryDocumentStore::new()),
            Backend::Sqlite => Arc::new(SqliteDocumentStore::open(":memory:").await.unwrap()),
        };
        let history = HistoryStore::new(Arc::clone(&store));
        if indexed {
            history.provision_indexes().await.unwrap();
        }
        Self { store, history }
    }

    /// Stores a record exactly as given, the way an older client would have.
    pub async fn seed(&self, collection: &str, value: Value) -> String {
        let Value::Object(data) = value else {
            panic!("seed documents must be objects");
        };
        self.store
            .insert(collection, NewDocument::new(data))
            .await
            .unwrap()
    }
}

/// Create a temporary directory for test files
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// LLM configuration pointed at a local test server
pub fn create_test_llm_config(base_url: &str) -> LlmConfig {
    LlmConfig {
        provider: LlmProvider::Gemini,
        base_url: base_url.to_string(),
        api_key: Some("test-api-key".to_string()),
        ..LlmConfig::default()
    }
}

/// Model response wrapping `text` in a fenced JSON block
pub fn fenced(json: &str) -> String {
    format!("```json\n{json}\n```")
}

pub const FLU_JSON: &str = r#"{"riskLevel":"Medium","conditions":["flu"],"advice":"rest","urgency":"see doctor if fever exceeds 3 days"}"#;
