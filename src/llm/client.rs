use crate::{Error, Result, config::LlmConfig};
use async_openai::{Client, config::OpenAIConfig, types as openai_types};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// A model ready to serve single-shot text generation.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn id(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Hands out models by identifier.
///
/// Acquisition is local: it checks the identifier but does not contact the
/// endpoint, so a model that acquires fine can still fail on `generate`.
pub trait GenerativeBackend: Send + Sync {
    fn acquire(&self, model_id: &str) -> Result<Arc<dyn GenerativeModel>>;
}

pub(crate) fn check_model_id(model_id: &str, available_models: &[String]) -> Result<()> {
    if model_id.trim().is_empty() {
        return Err(Error::generation("Model identifier is empty"));
    }
    if !available_models.is_empty() && !available_models.iter().any(|m| m == model_id) {
        return Err(Error::generation(format!(
            "Model {model_id} is not available"
        )));
    }
    Ok(())
}

pub(crate) fn missing_key_error() -> Error {
    Error::generation("Generative AI API key is not configured")
}

/// Backend for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    has_key: bool,
    available_models: Vec<String>,
    temperature: Option<f32>,
}

impl OpenAiBackend {
    pub fn new(config: &LlmConfig) -> Self {
        let api_key = config.usable_api_key();
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key.unwrap_or_default());

        if !config.base_url.is_empty() {
            openai_config = openai_config.with_api_base(config.base_url.as_str());
        }

        Self {
            client: Client::with_config(openai_config),
            has_key: api_key.is_some(),
            available_models: config.available_models.clone(),
            temperature: config.temperature,
        }
    }
}

impl GenerativeBackend for OpenAiBackend {
    fn acquire(&self, model_id: &str) -> Result<Arc<dyn GenerativeModel>> {
        check_model_id(model_id, &self.available_models)?;
        Ok(Arc::new(OpenAiModel {
            client: self.client.clone(),
            model: model_id.to_string(),
            has_key: self.has_key,
            temperature: self.temperature,
        }))
    }
}

struct OpenAiModel {
    client: Client<OpenAIConfig>,
    model: String,
    has_key: bool,
    temperature: Option<f32>,
}

#[async_trait]
impl GenerativeModel for OpenAiModel {
    fn id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if !self.has_key {
            return Err(missing_key_error());
        }

        let message = openai_types::ChatCompletionRequestUserMessageArgs::default()
            .content(openai_types::ChatCompletionRequestUserMessageContent::Text(
                prompt.to_string(),
            ))
            .build()
            .map_err(|e| Error::generation(format!("Failed to build user message: {e}")))?;

        let mut args = openai_types::CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(vec![message.into()]);
        if let Some(temperature) = self.temperature {
            args.temperature(temperature);
        }
        let request = args
            .build()
            .map_err(|e| Error::generation(format!("Failed to build request: {e}")))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| Error::generation(format!("{} request failed: {e}", self.model)))?;

        debug!(
            "Received chat completion from {} with {} choices",
            self.model,
            response.choices.len()
        );

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::generation(format!("{} returned no content", self.model)))
    }
}
