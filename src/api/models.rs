use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::{display_label, SessionListing};
use crate::db::{Message, Role, Session, SessionSummary};

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user_message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub bot_response: String,
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub label: String,
    pub created: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl From<&SessionListing> for SessionInfo {
    fn from(listing: &SessionListing) -> Self {
        Self {
            session_id: listing.session.id.clone(),
            label: listing.display_label.clone(),
            created: listing.session.created_at,
            last_active: listing.session.last_active_at,
        }
    }
}

impl From<Session> for SessionInfo {
    fn from(session: Session) -> Self {
        let summary = SessionSummary {
            session,
            opening_message: None,
        };
        Self {
            label: display_label(&summary),
            session_id: summary.session.id,
            created: summary.session.created_at,
            last_active: summary.session.last_active_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: DateTime<Utc>,
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub history: Vec<HistoryItem>,
}

impl HistoryItem {
    /// Groups a transcript into user/assistant pairs in commit order.
    pub fn pair_transcript(messages: &[Message]) -> Vec<HistoryItem> {
        let mut items = Vec::with_capacity(messages.len() / 2 + 1);
        let mut iter = messages.iter().peekable();

        while let Some(message) = iter.next() {
            match message.role {
                Role::User => {
                    let reply = iter.next_if(|next| next.role == Role::Assistant);
                    items.push(HistoryItem {
                        user_message: message.content.clone(),
                        bot_response: reply.map(|r| r.content.clone()).unwrap_or_default(),
                        timestamp: message.created_at,
                        language: message.language.clone(),
                    });
                }
                Role::Assistant => items.push(HistoryItem {
                    user_message: String::new(),
                    bot_response: message.content.clone(),
                    timestamp: message.created_at,
                    language: message.language.clone(),
                }),
            }
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: Role, content: &str) -> Message {
        Message {
            session_id: "s".to_string(),
            role,
            content: content.to_string(),
            language: "en".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn transcript_pairs_user_with_following_reply() {
        let transcript = vec![
            message(Role::User, "q1"),
            message(Role::Assistant, "a1"),
            message(Role::User, "q2"),
            message(Role::Assistant, "a2"),
        ];
        let items = HistoryItem::pair_transcript(&transcript);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].user_message, "q2");
        assert_eq!(items[1].bot_response, "a2");
    }

    #[test]
    fn unanswered_user_message_keeps_its_own_item() {
        let transcript = vec![
            message(Role::User, "q1"),
            message(Role::User, "q2"),
            message(Role::Assistant, "a2"),
        ];
        let items = HistoryItem::pair_transcript(&transcript);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].bot_response, "");
        assert_eq!(items[1].bot_response, "a2");
    }
}
