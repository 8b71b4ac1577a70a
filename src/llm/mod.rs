mod client;
mod gateway;
mod gemini;
mod normalize;
mod prompt;
mod types;

pub use client::{GenerativeBackend, GenerativeModel, OpenAiBackend};
pub use gateway::{AiGateway, ModelHandle};
pub use gemini::GeminiBackend;
pub use normalize::{
    DEFAULT_URGENCY, PLACEHOLDER_CONDITION, heuristic_analysis, normalize_symptom_analysis,
};
pub use prompt::{chat_prompt, symptom_prompt, transcript};
pub use types::*;
