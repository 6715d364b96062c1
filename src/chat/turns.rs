use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::Identity;
use crate::chat::{now, SessionManager};
use crate::config::ChatConfig;
use crate::db::{SessionId, TranscriptStore, Turn};
use crate::error::AppError;
use crate::llm::{LlmError, ModelBridge};

const DEFAULT_LANGUAGE: &str = "en";
const MAX_LANGUAGE_TAG_CHARS: usize = 16;

#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// `None` starts a new session.
    pub session_id: Option<SessionId>,
    pub message: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub reply: String,
    /// Set when the model failed and `reply` is the fallback apology; nothing was committed.
    pub degraded: Option<LlmError>,
}

impl TurnOutcome {
    pub fn committed(&self) -> bool {
        self.degraded.is_none()
    }
}

/// Progress of a single exchange. No state is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    Received,
    Validated,
    ModelCalled,
    Committed,
    FailedNoCommit,
}

pub struct TurnCoordinator {
    sessions: Arc<SessionManager>,
    store: Arc<dyn TranscriptStore>,
    bridge: ModelBridge,
    context_bound: usize,
    max_message_chars: usize,
    fallback_reply: String,
}

impl TurnCoordinator {
    pub fn new(sessions: Arc<SessionManager>, bridge: ModelBridge, chat: &ChatConfig) -> Self {
        Self {
            store: sessions.store(),
            sessions,
            bridge,
            context_bound: chat.max_history_messages,
            max_message_chars: chat.max_message_chars,
            fallback_reply: chat.fallback_reply.clone(),
        }
    }

    pub fn context_bound(&self) -> usize {
        self.context_bound
    }

    /// Runs one user/assistant exchange.
    ///
    /// Validation, authorization and store failures are returned as errors.
    /// A model failure is not: the caller gets the fallback reply with
    /// `degraded` set, and the transcript is left untouched.
    pub async fn submit_turn(
        &self,
        request: TurnRequest,
        identity: &Identity,
    ) -> Result<TurnOutcome, AppError> {
        let asked_at = now();
        let mut state = TurnState::Received;
        debug!(?state, subject = %identity.subject, "Turn received");

        let message = self.validate_message(&request.message)?;
        let language = validate_language(request.language.as_deref())?;
        state = TurnState::Validated;

        let session = match request.session_id.as_deref() {
            Some(id) => self.sessions.resolve(id, identity).await?,
            None => self.sessions.create_session(identity).await?,
        };
        debug!(?state, session_id = %session.id, "Turn validated");

        let context = self.store.recent_messages(&session.id, self.context_bound).await?;

        let generated = self.bridge.generate(&context, &message, &language).await;
        state = TurnState::ModelCalled;
        debug!(?state, session_id = %session.id, context_len = context.len(), "Model returned");

        let reply = match generated {
            Ok(reply) => reply,
            Err(e) => {
                state = TurnState::FailedNoCommit;
                warn!(
                    ?state,
                    session_id = %session.id,
                    provider = self.bridge.provider_name(),
                    error = %e,
                    "Model call failed; replying with fallback"
                );
                return Ok(TurnOutcome {
                    session_id: session.id,
                    reply: self.fallback_reply.clone(),
                    degraded: Some(e),
                });
            }
        };

        let turn = Turn {
            user_message: message,
            assistant_reply: reply,
            language,
            asked_at,
            answered_at: now(),
        };
        self.store.append_turn(&session.id, &turn).await?;
        state = TurnState::Committed;
        info!(?state, session_id = %session.id, subject = %identity.subject, "Turn committed");

        Ok(TurnOutcome {
            session_id: session.id,
            reply: turn.assistant_reply,
            degraded: None,
        })
    }

    fn validate_message(&self, raw: &str) -> Result<String, AppError> {
        let message = raw.trim();
        let len = message.chars().count();
        if len == 0 || len > self.max_message_chars {
            return Err(AppError::Validation {
                message: format!(
                    "Message must be between 1 and {} characters",
                    self.max_message_chars
                ),
                details: Some(serde_json::json!([{ "field": "user_message", "length": len }])),
            });
        }
        Ok(message.to_string())
    }
}

fn validate_language(raw: Option<&str>) -> Result<String, AppError> {
    let tag = match raw.map(str::trim) {
        None | Some("") => return Ok(DEFAULT_LANGUAGE.to_string()),
        Some(tag) => tag,
    };

    let well_formed = tag.len() <= MAX_LANGUAGE_TAG_CHARS
        && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !tag.starts_with('-')
        && !tag.ends_with('-');
    if !well_formed {
        return Err(AppError::Validation {
            message: "Invalid language tag".to_string(),
            details: Some(serde_json::json!([{ "field": "language", "value": tag }])),
        });
    }
    Ok(tag.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_language_defaults_to_english() {
        assert_eq!(validate_language(None).unwrap(), "en");
        assert_eq!(validate_language(Some("  ")).unwrap(), "en");
    }

    #[test]
    fn language_tags_are_normalised() {
        assert_eq!(validate_language(Some("HI")).unwrap(), "hi");
        assert_eq!(validate_language(Some("pt-BR")).unwrap(), "pt-br");
    }

    #[test]
    fn malformed_language_tags_are_rejected() {
        for bad in ["en_US", "-en", "en-", "fr;drop", "abcdefghijklmnopq"] {
            assert!(
                matches!(validate_language(Some(bad)), Err(AppError::Validation { .. })),
                "{bad} should be rejected"
            );
        }
    }
}
