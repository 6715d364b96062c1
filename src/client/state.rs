//! Chat view state machine.
//!
//! Pure transitions: every method applies one event to the view and returns
//! the effects the driver must perform next. Results come back through the
//! matching `*_loaded` / `*_completed` methods. The view is disposable; it can
//! always be rebuilt from the server.

use thiserror::Error;

use crate::api::models::{ChatResponse, HistoryItem, SessionInfo};

const OFFLINE_TEXT: &str = "You appear to be offline. Check your connection and try again.";
const AUTH_EXPIRED_TEXT: &str = "Your session has expired. Please sign in again.";
const SERVER_ERROR_TEXT: &str = "Sorry, there was an error connecting to the chatbot.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    Offline,
    AuthExpired,
    Server,
}

impl FailureCause {
    pub fn display_text(&self) -> &'static str {
        match self {
            FailureCause::Offline => OFFLINE_TEXT,
            FailureCause::AuthExpired => AUTH_EXPIRED_TEXT,
            FailureCause::Server => SERVER_ERROR_TEXT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewMessage {
    pub sender: Sender,
    pub text: String,
    pub is_error: bool,
}

impl ViewMessage {
    fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            is_error: false,
        }
    }

    fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            is_error: false,
        }
    }

    fn error(cause: FailureCause) -> Self {
        Self {
            sender: Sender::Assistant,
            text: cause.display_text().to_string(),
            is_error: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchSessions,
    CreateSession,
    FetchHistory {
        session_id: String,
    },
    SubmitTurn {
        session_id: Option<String>,
        message: String,
        language: String,
    },
    DeleteSession {
        session_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("a reply is still pending")]
    Pending,
    #[error("the conversation is still loading")]
    LoadingHistory,
    #[error("the network is unavailable")]
    Offline,
    #[error("message is empty")]
    EmptyMessage,
    #[error("cannot delete the only remaining session")]
    LastSession,
    #[error("unknown session")]
    UnknownSession,
}

/// Where the in-flight turn was sent from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    session_id: Option<String>,
    epoch: u64,
}

#[derive(Debug)]
pub struct ChatView {
    sessions: Vec<SessionInfo>,
    current_session_id: Option<String>,
    messages: Vec<ViewMessage>,
    pending: bool,
    network_up: bool,
    language: String,
    in_flight: Option<InFlight>,
    /// A history fetch for the current view has not come back yet.
    loading_history: bool,
    creating_session: bool,
    last_failure: Option<FailureCause>,
    /// Bumped whenever the message list is rebuilt for a different view.
    epoch: u64,
}

impl ChatView {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            sessions: Vec::new(),
            current_session_id: None,
            messages: Vec::new(),
            pending: false,
            network_up: true,
            language: language.into(),
            in_flight: None,
            loading_history: false,
            creating_session: false,
            last_failure: None,
            epoch: 0,
        }
    }

    pub fn sessions(&self) -> &[SessionInfo] {
        &self.sessions
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.current_session_id.as_deref()
    }

    pub fn messages(&self) -> &[ViewMessage] {
        &self.messages
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn network_up(&self) -> bool {
        self.network_up
    }

    pub fn last_failure(&self) -> Option<FailureCause> {
        self.last_failure
    }

    pub fn can_send(&self) -> bool {
        self.network_up && !self.pending && !self.loading_history
    }

    pub fn loading_history(&self) -> bool {
        self.loading_history
    }

    pub fn show_welcome(&self) -> bool {
        self.current_session_id.is_none() && self.messages.is_empty()
    }

    pub fn mount(&mut self) -> Vec<Effect> {
        vec![Effect::FetchSessions]
    }

    pub fn sessions_loaded(&mut self, result: Result<Vec<SessionInfo>, FailureCause>) -> Vec<Effect> {
        let sessions = match result {
            Ok(sessions) => sessions,
            Err(cause) => {
                self.record_failure(cause);
                return Vec::new();
            }
        };
        self.record_success();
        self.sessions = sessions;

        // The selected session may have been deleted or expired elsewhere.
        let current_gone = self
            .current_session_id
            .as_ref()
            .is_some_and(|current| !self.sessions.iter().any(|s| &s.session_id == current));
        if current_gone && !self.pending {
            self.reset_view(None);
        }

        if self.sessions.is_empty() && !self.creating_session {
            self.creating_session = true;
            return vec![Effect::CreateSession];
        }
        Vec::new()
    }

    pub fn session_created(&mut self, result: Result<SessionInfo, FailureCause>) -> Vec<Effect> {
        self.creating_session = false;
        match result {
            Ok(session) => {
                self.record_success();
                let id = session.session_id.clone();
                self.sessions.retain(|s| s.session_id != id);
                self.sessions.insert(0, session);
                if self.current_session_id.is_none() && self.messages.is_empty() {
                    self.reset_view(Some(id));
                }
            }
            Err(cause) => self.record_failure(cause),
        }
        Vec::new()
    }

    pub fn select_session(&mut self, session_id: &str) -> Vec<Effect> {
        if self.current_session_id.as_deref() == Some(session_id) {
            return Vec::new();
        }
        self.reset_view(Some(session_id.to_string()));
        self.loading_history = true;
        vec![Effect::FetchHistory {
            session_id: session_id.to_string(),
        }]
    }

    pub fn new_chat(&mut self) {
        self.reset_view(None);
    }

    pub fn history_loaded(
        &mut self,
        session_id: &str,
        result: Result<Vec<HistoryItem>, FailureCause>,
    ) -> Vec<Effect> {
        if self.current_session_id.as_deref() != Some(session_id) {
            return Vec::new();
        }
        self.loading_history = false;

        match result {
            Ok(history) => {
                self.record_success();
                self.messages = history
                    .into_iter()
                    .flat_map(|item| {
                        let mut pair = Vec::with_capacity(2);
                        if !item.user_message.is_empty() {
                            pair.push(ViewMessage::user(item.user_message));
                        }
                        if !item.bot_response.is_empty() {
                            pair.push(ViewMessage::assistant(item.bot_response));
                        }
                        pair
                    })
                    .collect();
            }
            Err(cause) => {
                self.record_failure(cause);
                self.messages.push(ViewMessage::error(cause));
            }
        }
        Vec::new()
    }

    pub fn send(&mut self, text: &str) -> Result<Vec<Effect>, Rejected> {
        let message = text.trim();
        if message.is_empty() {
            return Err(Rejected::EmptyMessage);
        }
        if self.pending {
            return Err(Rejected::Pending);
        }
        // The incoming history would replace the optimistic message.
        if self.loading_history {
            return Err(Rejected::LoadingHistory);
        }
        if !self.network_up {
            return Err(Rejected::Offline);
        }

        self.messages.push(ViewMessage::user(message));
        self.pending = true;
        self.in_flight = Some(InFlight {
            session_id: self.current_session_id.clone(),
            epoch: self.epoch,
        });

        Ok(vec![Effect::SubmitTurn {
            session_id: self.current_session_id.clone(),
            message: message.to_string(),
            language: self.language.clone(),
        }])
    }

    pub fn turn_completed(&mut self, result: Result<ChatResponse, FailureCause>) -> Vec<Effect> {
        self.pending = false;
        let Some(origin) = self.in_flight.take() else {
            return Vec::new();
        };
        let same_view = origin.epoch == self.epoch && origin.session_id == self.current_session_id;

        match result {
            Ok(reply) => {
                self.record_success();
                let mut effects = Vec::new();
                if same_view {
                    if self.current_session_id.is_none() {
                        self.current_session_id = Some(reply.session_id.clone());
                    }
                    self.messages.push(ViewMessage::assistant(reply.bot_response));
                } else if self.current_session_id.as_deref() == Some(reply.session_id.as_str()) {
                    // Back on the same session but the view was rebuilt meanwhile.
                    self.loading_history = true;
                    effects.push(Effect::FetchHistory {
                        session_id: reply.session_id,
                    });
                }
                effects.push(Effect::FetchSessions);
                effects
            }
            Err(cause) => {
                self.record_failure(cause);
                if same_view {
                    self.messages.push(ViewMessage::error(cause));
                }
                Vec::new()
            }
        }
    }

    pub fn request_delete(&mut self, session_id: &str) -> Result<Vec<Effect>, Rejected> {
        if !self.sessions.iter().any(|s| s.session_id == session_id) {
            return Err(Rejected::UnknownSession);
        }
        if self.sessions.len() <= 1 {
            return Err(Rejected::LastSession);
        }
        Ok(vec![Effect::DeleteSession {
            session_id: session_id.to_string(),
        }])
    }

    pub fn session_deleted(&mut self, session_id: &str, result: Result<(), FailureCause>) -> Vec<Effect> {
        match result {
            Ok(()) => {
                self.record_success();
                self.sessions.retain(|s| s.session_id != session_id);
                if self.current_session_id.as_deref() == Some(session_id) {
                    self.reset_view(None);
                }
            }
            Err(cause) => self.record_failure(cause),
        }
        Vec::new()
    }

    /// Connectivity changes only gate sending; the transcript is kept.
    pub fn set_network(&mut self, up: bool) {
        self.network_up = up;
    }

    fn reset_view(&mut self, session_id: Option<String>) {
        self.current_session_id = session_id;
        self.messages.clear();
        self.loading_history = false;
        self.epoch += 1;
    }

    fn record_success(&mut self) {
        self.network_up = true;
        self.last_failure = None;
    }

    fn record_failure(&mut self, cause: FailureCause) {
        if cause == FailureCause::Offline {
            self.network_up = false;
        }
        self.last_failure = Some(cause);
    }
}
