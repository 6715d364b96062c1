#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use counsel::auth::Identity;
use counsel::chat::{SessionManager, TurnCoordinator};
use counsel::config::ChatConfig;
use counsel::db::MemoryStore;
use counsel::llm::models::{ChatOptions, ChatResponse, Message};
use counsel::llm::{LlmError, LlmProvider, ModelBridge};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SYSTEM_PROMPT: &str = "You are a careful legal information assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Replies "reply to <last user message>".
    Echo,
    Fail,
    Hang,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub options: ChatOptions,
}

pub struct ScriptedProvider {
    mode: Mutex<Mode>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, messages: &[Message], options: ChatOptions) -> Result<ChatResponse, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            options,
        });
        let mode = *self.mode.lock().unwrap();

        match mode {
            Mode::Echo => {
                let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
                // Yield so concurrent turns genuinely interleave.
                tokio::task::yield_now().await;
                Ok(ChatResponse {
                    content: format!("reply to {}", last),
                    model: "scripted-1".to_string(),
                    usage: None,
                })
            }
            Mode::Fail => Err(LlmError::Api("upstream 500".to_string())),
            Mode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(LlmError::Network("unreachable".to_string()))
            }
        }
    }
}

pub struct Harness {
    pub sessions: Arc<SessionManager>,
    pub turns: Arc<TurnCoordinator>,
    pub provider: Arc<ScriptedProvider>,
}

pub fn harness(mode: Mode) -> Harness {
    let store = Arc::new(MemoryStore::new(chrono::Duration::hours(24)));
    let sessions = Arc::new(SessionManager::new(store));
    let provider = ScriptedProvider::new(mode);

    let options = ChatOptions {
        system_prompt: Some(SYSTEM_PROMPT.to_string()),
        ..ChatOptions::default()
    };
    let bridge = ModelBridge::new(provider.clone(), options, Duration::from_secs(30));
    let turns = Arc::new(TurnCoordinator::new(sessions.clone(), bridge, &ChatConfig::default()));

    Harness {
        sessions,
        turns,
        provider,
    }
}

pub fn identity(subject: &str) -> Identity {
    let now = Utc::now();
    Identity {
        subject: subject.to_string(),
        issued_at: now,
        expires_at: now + chrono::Duration::minutes(30),
    }
}
