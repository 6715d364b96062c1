//! In-process transcript store.
//!
//! Sessions are keyed by id in a single map; every write takes the write lock
//! once, so a turn becomes visible to readers as a whole or not at all.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::db::models::{Message, Role, Session, SessionSummary, Turn};
use crate::db::store::{expiry_cutoff, StoreError, TranscriptStore};

#[derive(Debug, Clone)]
struct Entry {
    session: Session,
    messages: Vec<Message>,
}

pub struct MemoryStore {
    inner: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn is_live(&self, entry: &Entry) -> bool {
        entry.session.last_active_at > expiry_cutoff(Utc::now(), self.ttl)
    }
}

#[async_trait]
impl TranscriptStore for MemoryStore {
    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let cutoff = expiry_cutoff(Utc::now(), self.ttl);
        let mut map = self.inner.write().await;
        map.retain(|_, entry| entry.session.last_active_at > cutoff);

        if map.contains_key(&session.id) {
            return Err(StoreError::Duplicate(session.id.clone()));
        }
        map.insert(
            session.id.clone(),
            Entry {
                session: session.clone(),
                messages: Vec::new(),
            },
        );
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let map = self.inner.read().await;
        Ok(map
            .get(id)
            .filter(|entry| self.is_live(entry))
            .map(|entry| entry.session.clone()))
    }

    async fn list_sessions(&self, owner: &str) -> Result<Vec<SessionSummary>, StoreError> {
        let map = self.inner.read().await;
        let mut sessions: Vec<SessionSummary> = map
            .values()
            .filter(|entry| entry.session.owner == owner && self.is_live(entry))
            .map(|entry| SessionSummary {
                session: entry.session.clone(),
                opening_message: entry
                    .messages
                    .iter()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.clone()),
            })
            .collect();

        sessions.sort_by(|a, b| {
            b.session
                .last_active_at
                .cmp(&a.session.last_active_at)
                .then_with(|| b.session.created_at.cmp(&a.session.created_at))
        });
        Ok(sessions)
    }

    async fn messages(&self, id: &str) -> Result<Vec<Message>, StoreError> {
        let map = self.inner.read().await;
        Ok(map
            .get(id)
            .filter(|entry| self.is_live(entry))
            .map(|entry| entry.messages.clone())
            .unwrap_or_default())
    }

    async fn recent_messages(&self, id: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
        let map = self.inner.read().await;
        Ok(map
            .get(id)
            .filter(|entry| self.is_live(entry))
            .map(|entry| {
                let start = entry.messages.len().saturating_sub(limit);
                entry.messages[start..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn append_turn(&self, id: &str, turn: &Turn) -> Result<(), StoreError> {
        let cutoff = expiry_cutoff(Utc::now(), self.ttl);
        let mut map = self.inner.write().await;
        let entry = map
            .get_mut(id)
            .filter(|entry| entry.session.last_active_at > cutoff)
            .ok_or_else(|| StoreError::SessionMissing(id.to_string()))?;

        entry.messages.extend(turn.messages(id));
        entry.session.last_active_at = entry.session.last_active_at.max(turn.answered_at);
        Ok(())
    }

    async fn rename_session(&self, id: &str, label: &str) -> Result<(), StoreError> {
        let cutoff = expiry_cutoff(Utc::now(), self.ttl);
        let mut map = self.inner.write().await;
        let entry = map
            .get_mut(id)
            .filter(|entry| entry.session.last_active_at > cutoff)
            .ok_or_else(|| StoreError::SessionMissing(id.to_string()))?;

        entry.session.label = Some(label.to_string());
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        let cutoff = expiry_cutoff(Utc::now(), self.ttl);
        let mut map = self.inner.write().await;
        Ok(map
            .remove(id)
            .map(|entry| entry.session.last_active_at > cutoff)
            .unwrap_or(false))
    }
}
