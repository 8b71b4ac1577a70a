use super::client::{GenerativeBackend, GenerativeModel, OpenAiBackend};
use super::gemini::GeminiBackend;
use super::normalize::normalize_symptom_analysis;
use super::prompt::{chat_prompt, symptom_prompt};
use super::types::SymptomAnalysis;
use crate::config::{LlmConfig, LlmProvider};
use crate::history::Message;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A model acquired by [`AiGateway::select_model`].
#[derive(Clone)]
pub struct ModelHandle {
    model: Arc<dyn GenerativeModel>,
    requested: String,
    substituted: bool,
}

impl ModelHandle {
    /// The model actually serving requests.
    pub fn model_id(&self) -> &str {
        self.model.id()
    }

    /// The primary model that was asked for.
    pub fn requested_id(&self) -> &str {
        &self.requested
    }

    pub fn is_fallback(&self) -> bool {
        self.substituted
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        self.model.generate(prompt).await
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model", &self.model_id())
            .field("requested", &self.requested)
            .field("substituted", &self.substituted)
            .finish()
    }
}

pub struct AiGateway {
    backend: Arc<dyn GenerativeBackend>,
    primary_model: String,
    fallback_model: String,
}

impl AiGateway {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        primary_model: impl Into<String>,
        fallback_model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            primary_model: primary_model.into(),
            fallback_model: fallback_model.into(),
        }
    }

    /// Builds the configured backend. A missing API key is only a warning here.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        config.warn_if_key_unusable();

        let backend: Arc<dyn GenerativeBackend> = match config.provider {
            LlmProvider::Gemini => Arc::new(GeminiBackend::new(config)?),
            LlmProvider::Openai => Arc::new(OpenAiBackend::new(config)),
        };

        info!(
            "AI gateway ready ({:?}, primary {}, fallback {})",
            config.provider, config.primary_model, config.fallback_model
        );
        Ok(Self::new(
            backend,
            config.primary_model.clone(),
            config.fallback_model.clone(),
        ))
    }

    pub fn select_model(&self, primary_id: &str, fallback_id: &str) -> Result<ModelHandle> {
        match self.backend.acquire(primary_id) {
            Ok(model) => Ok(ModelHandle {
                model,
                requested: primary_id.to_string(),
                substituted: false,
            }),
            Err(primary_err) => {
                warn!(
                    "Primary model {} unavailable, trying fallback {}: {}",
                    primary_id, fallback_id, primary_err
                );
                let model = self.backend.acquire(fallback_id).map_err(|e| {
                    Error::generation(format!(
                        "No model reachable: {primary_id} ({primary_err}), {fallback_id} ({e})"
                    ))
                })?;
                Ok(ModelHandle {
                    model,
                    requested: primary_id.to_string(),
                    substituted: true,
                })
            }
        }
    }

    /// The configured primary/fallback pair.
    pub fn default_model(&self) -> Result<ModelHandle> {
        self.select_model(&self.primary_model, &self.fallback_model)
    }

    /// Always yields an analysis unless the model call itself fails.
    pub async fn analyze_symptoms(&self, symptoms: &str) -> Result<SymptomAnalysis> {
        let prompt = symptom_prompt(symptoms);
        let text = self.complete("analyze_symptoms", &prompt).await?;

        let (analysis, source) = normalize_symptom_analysis(&text);
        debug!(
            "analyze_symptoms: parsed {:?} risk via {:?}",
            analysis.risk_level, source
        );
        Ok(analysis)
    }

    /// Raw model reply to `message` given the prior turns.
    pub async fn chat(&self, message: &str, history: &[Message]) -> Result<String> {
        let prompt = chat_prompt(message, history);
        self.complete("chat", &prompt).await
    }

    async fn complete(&self, operation: &str, prompt: &str) -> Result<String> {
        let handle = self
            .default_model()
            .map_err(|e| with_operation(e, operation, None))?;
        debug!(
            "{}: prompt length {} on {}",
            operation,
            prompt.len(),
            handle.model_id()
        );

        match handle.generate(prompt).await {
            Ok(text) => {
                debug!("{}: response length {}", operation, text.len());
                Ok(text)
            }
            Err(e) => {
                error!("{} failed on {}: {}", operation, handle.model_id(), e);
                Err(with_operation(e, operation, Some(handle.model_id())))
            }
        }
    }
}

/// Prefixes a generation failure with the operation and, if known, the model.
fn with_operation(err: Error, operation: &str, model_id: Option<&str>) -> Error {
    let Error::Generation(cause) = err else {
        return err;
    };
    match model_id {
        Some(model_id) => Error::generation(format!("{operation} failed on {model_id}: {cause}")),
        None => Error::generation(format!("{operation} failed: {cause}")),
    }
}
