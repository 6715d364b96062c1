use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::Identity;
use crate::chat::now;
use crate::db::{Message, Session, SessionSummary, TranscriptStore};
use crate::error::AppError;

const LABEL_PREVIEW_CHARS: usize = 50;
const MAX_LABEL_CHARS: usize = 100;
const UNTITLED_LABEL: &str = "New chat";

/// A session as shown in listings.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListing {
    #[serde(flatten)]
    pub session: Session,
    pub display_label: String,
}

/// Owns session lifecycle and the ownership boundary around it.
///
/// Holds no per-session state of its own; everything lives in the store, so
/// any number of instances can serve the same sessions across restarts.
pub struct SessionManager {
    store: Arc<dyn TranscriptStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn TranscriptStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn TranscriptStore> {
        self.store.clone()
    }

    pub async fn create_session(&self, identity: &Identity) -> Result<Session, AppError> {
        let at = now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            owner: identity.subject.clone(),
            label: None,
            created_at: at,
            last_active_at: at,
        };
        self.store.create_session(&session).await?;

        info!(session_id = %session.id, subject = %identity.subject, "Created session");
        Ok(session)
    }

    /// Sessions owned by the caller, most recently active first.
    pub async fn list_sessions(&self, identity: &Identity) -> Result<Vec<SessionListing>, AppError> {
        let summaries = self.store.list_sessions(&identity.subject).await?;
        Ok(summaries
            .into_iter()
            // The store filters by owner already; this keeps the boundary local.
            .filter(|s| s.session.owner == identity.subject)
            .map(|summary| SessionListing {
                display_label: display_label(&summary),
                session: summary.session,
            })
            .collect())
    }

    /// Looks up a live session and checks that `identity` owns it.
    pub async fn resolve(&self, id: &str, identity: &Identity) -> Result<Session, AppError> {
        let session = self
            .store
            .get_session(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Session".to_string()))?;

        if session.owner != identity.subject {
            return Err(AppError::Forbidden);
        }
        Ok(session)
    }

    pub async fn get_history(&self, id: &str, identity: &Identity) -> Result<Vec<Message>, AppError> {
        self.resolve(id, identity).await?;
        Ok(self.store.messages(id).await?)
    }

    pub async fn delete_session(&self, id: &str, identity: &Identity) -> Result<(), AppError> {
        self.resolve(id, identity).await?;
        if !self.store.delete_session(id).await? {
            return Err(AppError::NotFound("Session".to_string()));
        }

        info!(session_id = %id, subject = %identity.subject, "Deleted session");
        Ok(())
    }

    pub async fn rename_session(
        &self,
        id: &str,
        identity: &Identity,
        label: &str,
    ) -> Result<Session, AppError> {
        let label = label.trim();
        let len = label.chars().count();
        if len == 0 || len > MAX_LABEL_CHARS {
            return Err(AppError::validation(format!(
                "Label must be between 1 and {} characters",
                MAX_LABEL_CHARS
            )));
        }

        let mut session = self.resolve(id, identity).await?;
        self.store.rename_session(id, label).await?;
        session.label = Some(label.to_string());
        Ok(session)
    }

    /// Plain-text rendering of the full transcript.
    pub async fn export_session(&self, id: &str, identity: &Identity) -> Result<String, AppError> {
        let session = self.resolve(id, identity).await?;
        let messages = self.store.messages(id).await?;

        let mut export = String::new();
        export.push_str(&format!("Session: {}\n", session.label.as_deref().unwrap_or(UNTITLED_LABEL)));
        export.push_str(&format!("ID: {}\n", session.id));
        export.push_str(&format!("Created At: {}\n", session.created_at.to_rfc3339()));
        export.push_str("---\n");

        for m in messages {
            export.push_str(&format!(
                "[{}] ({}, {}): {}\n",
                m.role.as_str().to_uppercase(),
                m.language,
                m.created_at.to_rfc3339(),
                m.content
            ));
            export.push_str("---\n");
        }
        Ok(export)
    }
}

/// Explicit label, else a preview of the opening user message, else a placeholder.
pub fn display_label(summary: &SessionSummary) -> String {
    if let Some(label) = &summary.session.label {
        return label.clone();
    }
    match &summary.opening_message {
        Some(opening) if opening.chars().count() > LABEL_PREVIEW_CHARS => {
            let preview: String = opening.chars().take(LABEL_PREVIEW_CHARS).collect();
            format!("{}...", preview)
        }
        Some(opening) => opening.clone(),
        None => UNTITLED_LABEL.to_string(),
    }
}
