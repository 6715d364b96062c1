use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::db::models::{Message, Session, SessionSummary, Turn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    SessionMissing(String),
    #[error("session {0} already exists")]
    Duplicate(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<duckdb::Error> for StoreError {
    fn from(e: duckdb::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Keyed document store holding sessions and their ordered transcripts.
///
/// Sessions idle for longer than the store's time-to-live are treated as
/// absent by every read and may be physically removed on any write.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<(), StoreError>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Sessions owned by `owner`, most recently active first.
    async fn list_sessions(&self, owner: &str) -> Result<Vec<SessionSummary>, StoreError>;

    /// Full transcript in commit order.
    async fn messages(&self, id: &str) -> Result<Vec<Message>, StoreError>;

    /// The last `limit` messages in commit order.
    async fn recent_messages(&self, id: &str, limit: usize) -> Result<Vec<Message>, StoreError>;

    /// Appends both messages of `turn` and bumps `last_active_at` in one write.
    async fn append_turn(&self, id: &str, turn: &Turn) -> Result<(), StoreError>;

    async fn rename_session(&self, id: &str, label: &str) -> Result<(), StoreError>;

    /// Returns `false` when nothing was deleted.
    async fn delete_session(&self, id: &str) -> Result<bool, StoreError>;
}

/// Oldest `last_active_at` still considered live for the given time-to-live.
pub(crate) fn expiry_cutoff(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now - ttl
}
