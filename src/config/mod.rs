mod types;

pub use types::*;

use crate::Result;
use std::env;
use tracing::{debug, warn};

/// Environment variable that overrides `llm.api_key`.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub async fn load() -> Result<Config> {
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    load_from(&config_path).await
}

/// Reads a YAML file and applies the `GEMINI_API_KEY` override.
///
/// Key usability is checked when the gateway is built, not here.
pub async fn load_from(config_path: &str) -> Result<Config> {
    debug!("Loading configuration from: {}", config_path);

    let config_str = tokio::fs::read_to_string(config_path).await?;
    let mut config = Config::from_yaml_str(&config_str)?;

    if let Ok(key) = env::var(API_KEY_ENV) {
        config.llm.api_key = Some(key);
    }

    Ok(config)
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

impl LlmConfig {
    /// Logs a startup warning when generation calls are bound to fail.
    pub fn warn_if_key_unusable(&self) -> bool {
        if self.usable_api_key().is_some() {
            return false;
        }
        warn!(
            "Generative AI API key missing. Set {} or llm.api_key; generation requests will fail",
            API_KEY_ENV
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
llm:
  provider: openai
  base_url: "https://generativelanguage.googleapis.com/v1beta/openai/"
  api_key: "abc123"
  primary_model: "gemini-2.0-flash"
  fallback_model: "gemini-1.5-flash"
  available_models: ["gemini-1.5-flash"]
  temperature: 0.2

store:
  database_path: ":memory:"
  provision_indexes: false

logs:
  level: "debug"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Openai);
        assert_eq!(config.llm.usable_api_key(), Some("abc123"));
        assert_eq!(config.llm.available_models, vec!["gemini-1.5-flash"]);
        assert_eq!(config.llm.temperature, Some(0.2));
        assert_eq!(config.store.database_path, ":memory:");
        assert_eq!(config.store.messages_collection, "chats");
        assert!(!config.store.provision_indexes);
        assert_eq!(config.logs.level, "debug");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Gemini);
        assert_eq!(config.llm.primary_model, "models/gemini-2.0-flash");
        assert_eq!(config.llm.fallback_model, "models/gemini-1.5-flash");
        assert_eq!(config.store.symptoms_collection, "symptomAnalysis");
        assert!(config.store.provision_indexes);
        assert_eq!(config.logs.level, "info");
    }

    #[test]
    fn test_placeholder_keys_are_unusable() {
        let mut llm = LlmConfig::default();
        assert!(llm.usable_api_key().is_none());
        assert!(llm.warn_if_key_unusable());

        for placeholder in ["", "   ", "YOUR_GEMINI_API_KEY", "your_gemini_api_key_here"] {
            llm.api_key = Some(placeholder.to_string());
            assert!(llm.usable_api_key().is_none(), "{placeholder:?}");
        }

        llm.api_key = Some("real-key".to_string());
        assert!(!llm.warn_if_key_unusable());
    }

    #[test]
    fn test_invalid_provider_rejected() {
        let result = Config::from_yaml_str("llm:\n  provider: bard\n");
        assert!(result.is_err());
    }
}
