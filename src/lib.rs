pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod store;
pub mod telemetry;

pub use error::{Error, Result};
pub use history::{Context, HistoryStore, Message, Role, SymptomRecord};
pub use llm::{AiGateway, ModelHandle, RiskLevel, SymptomAnalysis};
