use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque session identifier.
pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub owner: String,
    /// Set only by an explicit rename.
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

/// A listed session together with the first user message of its transcript.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session: Session,
    pub opening_message: Option<String>,
}

/// One user message and the assistant reply it produced, committed as a unit.
#[derive(Debug, Clone)]
pub struct Turn {
    pub user_message: String,
    pub assistant_reply: String,
    pub language: String,
    /// When the user message was received.
    pub asked_at: DateTime<Utc>,
    /// When the reply was produced; also the session's new activity time.
    pub answered_at: DateTime<Utc>,
}

impl Turn {
    pub fn messages(&self, session_id: &str) -> [Message; 2] {
        [
            Message {
                session_id: session_id.to_string(),
                role: Role::User,
                content: self.user_message.clone(),
                language: self.language.clone(),
                created_at: self.asked_at,
            },
            Message {
                session_id: session_id.to_string(),
                role: Role::Assistant,
                content: self.assistant_reply.clone(),
                language: self.language.clone(),
                created_at: self.answered_at,
            },
        ]
    }
}
