use super::client::{GenerativeBackend, GenerativeModel, check_model_id, missing_key_error};
use crate::{Error, Result, config::LlmConfig};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Backend for the Gemini `generateContent` REST endpoint.
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    available_models: Vec<String>,
    temperature: Option<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GeminiBackend {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        info!("Gemini backend initialized (base: {})", config.base_url);
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.usable_api_key().map(str::to_string),
            available_models: config.available_models.clone(),
            temperature: config.temperature,
        })
    }

    /// `generateContent` endpoint for a model id, with or without the `models/` prefix.
    pub fn generate_url(&self, model_id: &str) -> String {
        let model_id = model_id.strip_prefix("models/").unwrap_or(model_id);
        format!("{}/models/{}:generateContent", self.base_url, model_id)
    }
}

impl GenerativeBackend for GeminiBackend {
    fn acquire(&self, model_id: &str) -> Result<Arc<dyn GenerativeModel>> {
        check_model_id(model_id, &self.available_models)?;

        Ok(Arc::new(GeminiModel {
            client: self.client.clone(),
            url: self.generate_url(model_id),
            id: model_id.to_string(),
            api_key: self.api_key.clone(),
            temperature: self.temperature,
        }))
    }
}

struct GeminiModel {
    client: reqwest::Client,
    url: String,
    id: String,
    api_key: Option<String>,
    temperature: Option<f32>,
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(missing_key_error)?;

        let mut body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });
        if let Some(temperature) = self.temperature {
            body["generationConfig"] = serde_json::json!({ "temperature": temperature });
        }

        let resp = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::generation(format!("{} request failed: {e}", self.id)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "Gemini API error for {}: {} {}",
                self.id, status, body
            )));
        }

        let data: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| Error::generation(format!("Unreadable Gemini response: {e}")))?;

        let text: String = data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            let reason = data
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "empty response".to_string());
            return Err(Error::generation(format!(
                "{} returned no text: {reason}",
                self.id
            )));
        }

        debug!("Gemini {} returned {} characters", self.id, text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_model_ids_map_to_generate_urls() {
        let config = LlmConfig {
            base_url: "https://example.test/v1/".to_string(),
            api_key: Some("k".to_string()),
            ..LlmConfig::default()
        };
        let backend = GeminiBackend::new(&config).unwrap();

        assert_eq!(
            backend.generate_url("models/gemini-2.0-flash"),
            "https://example.test/v1/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(
            backend.generate_url("gemini-1.5-flash"),
            "https://example.test/v1/models/gemini-1.5-flash:generateContent"
        );

        let model = backend.acquire("gemini-1.5-flash").unwrap();
        assert_eq!(model.id(), "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_any_request() {
        let backend = GeminiBackend::new(&LlmConfig::default()).unwrap();
        let model = backend.acquire("models/gemini-2.0-flash").unwrap();
        let err = model.generate("hi").await.unwrap_err();
        assert!(err.to_string().contains("API key is not configured"));
    }
}
