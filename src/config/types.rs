use serde::{Deserialize, Serialize};

/// Values shipped in sample env files that mean "no key configured".
const PLACEHOLDER_API_KEYS: &[&str] = &["YOUR_GEMINI_API_KEY", "your_gemini_api_key_here"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    /// When non-empty, only these model ids can be acquired.
    #[serde(default)]
    pub available_models: Vec<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_messages_collection")]
    pub messages_collection: String,
    #[serde(default = "default_symptoms_collection")]
    pub symptoms_collection: String,
    #[serde(default = "default_true")]
    pub provision_indexes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl LlmConfig {
    /// The configured key, unless it is missing, blank or a placeholder.
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && !PLACEHOLDER_API_KEYS.contains(key))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            api_key: None,
            primary_model: default_primary_model(),
            fallback_model: default_fallback_model(),
            available_models: Vec::new(),
            temperature: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            messages_collection: default_messages_collection(),
            symptoms_collection: default_symptoms_collection(),
            provision_indexes: true,
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_provider() -> LlmProvider {
    LlmProvider::Gemini
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1".to_string()
}

fn default_primary_model() -> String {
    "models/gemini-2.0-flash".to_string()
}

fn default_fallback_model() -> String {
    "models/gemini-1.5-flash".to_string()
}

fn default_database_path() -> String {
    "history.db".to_string()
}

fn default_messages_collection() -> String {
    "chats".to_string()
}

fn default_symptoms_collection() -> String {
    "symptomAnalysis".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
