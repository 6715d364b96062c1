use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use duckdb::{params, types::Type, Connection, Result as DbResult, Row};
use std::sync::MutexGuard;
use tracing::debug;

use crate::db::connection::DbPool;
use crate::db::models::{Message, Role, Session, SessionSummary, Turn};
use crate::db::store::{expiry_cutoff, StoreError, TranscriptStore};

const SESSION_COLUMNS: &str = "id, owner, label, created_ms, last_active_ms";
const MESSAGE_COLUMNS: &str = "session_id, role, content, language, created_ms";

/// Transcript store backed by a single DuckDB connection.
pub struct DuckDbStore {
    pool: DbPool,
    ttl: Duration,
}

impl DuckDbStore {
    pub fn new(pool: DbPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.pool
            .lock()
            .map_err(|_| StoreError::Unavailable("database connection lock poisoned".to_string()))
    }

    fn cutoff_ms(&self) -> i64 {
        expiry_cutoff(Utc::now(), self.ttl).timestamp_millis()
    }

    fn row_to_session(row: &Row) -> DbResult<Session> {
        Ok(Session {
            id: row.get(0)?,
            owner: row.get(1)?,
            label: row.get::<_, Option<String>>(2)?,
            created_at: from_millis(row.get(3)?),
            last_active_at: from_millis(row.get(4)?),
        })
    }

    fn row_to_message(row: &Row) -> DbResult<Message> {
        let role: String = row.get(1)?;
        let role = role
            .parse::<Role>()
            .map_err(|e| duckdb::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;

        Ok(Message {
            session_id: row.get(0)?,
            role,
            content: row.get(2)?,
            language: row.get(3)?,
            created_at: from_millis(row.get(4)?),
        })
    }

    fn purge_expired(conn: &Connection, cutoff_ms: i64) -> DbResult<()> {
        conn.execute(
            "DELETE FROM messages WHERE session_id IN (SELECT id FROM sessions WHERE last_active_ms <= ?)",
            params![cutoff_ms],
        )?;
        let purged = conn.execute(
            "DELETE FROM sessions WHERE last_active_ms <= ?",
            params![cutoff_ms],
        )?;
        if purged > 0 {
            debug!(purged, "Purged expired sessions");
        }
        Ok(())
    }
}

#[async_trait]
impl TranscriptStore for DuckDbStore {
    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let cutoff = self.cutoff_ms();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        Self::purge_expired(&tx, cutoff)?;
        let inserted = tx.execute(
            "INSERT INTO sessions (id, owner, label, created_ms, last_active_ms) VALUES (?, ?, ?, ?, ?) ON CONFLICT DO NOTHING",
            params![
                session.id,
                session.owner,
                session.label,
                session.created_at.timestamp_millis(),
                session.last_active_at.timestamp_millis()
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::Duplicate(session.id.clone()));
        }

        tx.commit()?;
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ? AND last_active_ms > ?"
        ))?;
        let mut rows = stmt.query_map(params![id, self.cutoff_ms()], Self::row_to_session)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    async fn list_sessions(&self, owner: &str) -> Result<Vec<SessionSummary>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.owner, s.label, s.created_ms, s.last_active_ms,
                    (SELECT m.content FROM messages m
                      WHERE m.session_id = s.id AND m.role = 'user'
                      ORDER BY m.id ASC LIMIT 1) AS opening
             FROM sessions s
             WHERE s.owner = ? AND s.last_active_ms > ?
             ORDER BY s.last_active_ms DESC, s.created_ms DESC",
        )?;
        let rows = stmt.query_map(params![owner, self.cutoff_ms()], |row| {
            Ok(SessionSummary {
                session: Self::row_to_session(row)?,
                opening_message: row.get::<_, Option<String>>(5)?,
            })
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    async fn messages(&self, id: &str) -> Result<Vec<Message>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE session_id = ?
               AND EXISTS (SELECT 1 FROM sessions WHERE id = ? AND last_active_ms > ?)
             ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![id, id, self.cutoff_ms()], Self::row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    async fn recent_messages(&self, id: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM (
                SELECT id, {MESSAGE_COLUMNS} FROM messages
                WHERE session_id = ?
                  AND EXISTS (SELECT 1 FROM sessions WHERE id = ? AND last_active_ms > ?)
                ORDER BY id DESC
                LIMIT ?
             ) recent
             ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(
            params![id, id, self.cutoff_ms(), limit as i64],
            Self::row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    async fn append_turn(&self, id: &str, turn: &Turn) -> Result<(), StoreError> {
        let cutoff = self.cutoff_ms();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for message in turn.messages(id) {
            tx.execute(
                "INSERT INTO messages (session_id, role, content, language, created_ms) VALUES (?, ?, ?, ?, ?)",
                params![
                    message.session_id,
                    message.role.as_str(),
                    message.content,
                    message.language,
                    message.created_at.timestamp_millis()
                ],
            )?;
        }

        // The session may have been deleted or expired while the model was generating.
        let touched = tx.execute(
            "UPDATE sessions SET last_active_ms = GREATEST(last_active_ms, ?) WHERE id = ? AND last_active_ms > ?",
            params![turn.answered_at.timestamp_millis(), id, cutoff],
        )?;
        if touched == 0 {
            // Dropping the transaction rolls back both inserts.
            return Err(StoreError::SessionMissing(id.to_string()));
        }

        tx.commit()?;
        Ok(())
    }

    async fn rename_session(&self, id: &str, label: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE sessions SET label = ? WHERE id = ? AND last_active_ms > ?",
            params![label, id, self.cutoff_ms()],
        )?;
        if updated == 0 {
            return Err(StoreError::SessionMissing(id.to_string()));
        }
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        let cutoff = self.cutoff_ms();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let live: i64 = tx.query_row(
            "SELECT COUNT(*) FROM sessions WHERE id = ? AND last_active_ms > ?",
            params![id, cutoff],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM messages WHERE session_id = ?", params![id])?;
        tx.execute("DELETE FROM sessions WHERE id = ?", params![id])?;
        tx.commit()?;

        Ok(live > 0)
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
