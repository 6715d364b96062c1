//! Stateless request/response boundary to the language model.
//!
//! Conversation state lives entirely in the transcript; every call carries the
//! full context window it needs and no provider-side chat handle is kept.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::db::models::Message as TranscriptMessage;
use crate::llm::models::{ChatOptions, Message};
use crate::llm::{LlmError, LlmProvider};

pub struct ModelBridge {
    provider: Arc<dyn LlmProvider>,
    options: ChatOptions,
    timeout: Duration,
}

impl ModelBridge {
    pub fn new(provider: Arc<dyn LlmProvider>, options: ChatOptions, timeout: Duration) -> Self {
        Self {
            provider,
            options,
            timeout,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &AppConfig) -> Self {
        let options = ChatOptions {
            model: config.llm.model.clone(),
            temperature: Some(config.llm.temperature),
            max_tokens: Some(config.llm.max_output_tokens),
            system_prompt: Some(config.chat.system_prompt.clone()),
        };
        Self::new(provider, options, Duration::from_secs(config.llm.timeout_secs))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Produces the assistant reply to `message` given the prior `context`.
    pub async fn generate(
        &self,
        context: &[TranscriptMessage],
        message: &str,
        language: &str,
    ) -> Result<String, LlmError> {
        let mut messages: Vec<Message> = context
            .iter()
            .map(|m| Message {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();
        messages.push(Message::user(message));

        let mut options = self.options.clone();
        if language != "en" {
            let prompt = options.system_prompt.take().unwrap_or_default();
            let instruction = format!(
                "{}\n\nReply in the language identified by the tag '{}'.",
                prompt, language
            );
            options.system_prompt = Some(instruction.trim_start().to_string());
        }

        debug!(
            provider = self.provider.name(),
            context_len = context.len(),
            "Calling model"
        );

        let call = self.provider.chat(&messages, options);
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    provider = self.provider.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Model call timed out"
                );
                return Err(LlmError::Timeout(self.timeout.as_secs()));
            }
        };

        if response.content.trim().is_empty() {
            return Err(LlmError::MalformedResponse("empty completion".to_string()));
        }
        Ok(response.content)
    }
}
