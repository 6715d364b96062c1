pub mod anthropic;
pub mod bridge;
pub mod gemini;
pub mod models;
pub mod ollama;
pub mod openai;

use anthropic::AnthropicProvider;
use gemini::GeminiProvider;
use ollama::OllamaProvider;
use openai::OpenAiProvider;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;
use models::{ChatOptions, ChatResponse, Message};

pub use bridge::ModelBridge;

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Network Error: {0}")]
    Network(String),
    #[error("API Error: {0}")]
    Api(String),
    #[error("Malformed Response: {0}")]
    MalformedResponse(String),
    #[error("Rate Limited")]
    RateLimited,
    #[error("Timed out after {0}s")]
    Timeout(u64),
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, messages: &[Message], options: ChatOptions) -> Result<ChatResponse, LlmError>;
}

/// A registry or factory trait to initialize providers from config.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_default(config: &AppConfig) -> Option<Arc<dyn LlmProvider>> {
        let provider_name = config.llm.provider.as_str();

        match provider_name {
            "openai" => {
                let cfg = config.llm.openai.as_ref()?;
                Some(Arc::new(OpenAiProvider::new(
                    cfg.api_key.clone(),
                    cfg.api_base.clone(),
                    cfg.default_model.clone(),
                )))
            }
            "anthropic" => {
                let cfg = config.llm.anthropic.as_ref()?;
                Some(Arc::new(AnthropicProvider::new(
                    cfg.api_key.clone(),
                    cfg.api_base.clone(),
                    cfg.default_model.clone(),
                )))
            }
            "ollama" => {
                let cfg = config.llm.ollama.as_ref()?;
                Some(Arc::new(OllamaProvider::new(
                    cfg.base_url.clone(),
                    cfg.default_model.clone(),
                )))
            }
            "gemini" => {
                let cfg = config.llm.gemini.as_ref()?;
                Some(Arc::new(GeminiProvider::new(
                    cfg.api_key.clone(),
                    cfg.api_base.clone(),
                    cfg.default_model.clone(),
                )))
            }
            _ => None,
        }
    }
}
