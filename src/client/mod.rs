//! Client-side reconciliation of the chat view against the server.

pub mod api;
pub mod state;

pub use api::{ClientError, HttpChatClient};
pub use state::{ChatView, Effect, FailureCause, Rejected, Sender, ViewMessage};

use std::collections::VecDeque;
use tracing::debug;

/// Performs effects against the server, feeding each result back into the
/// view until no follow-up work remains.
pub async fn drive(view: &mut ChatView, client: &HttpChatClient, effects: Vec<Effect>) {
    let mut queue: VecDeque<Effect> = effects.into();

    while let Some(effect) = queue.pop_front() {
        debug!(?effect, "Running client effect");
        let next = match effect {
            Effect::FetchSessions => {
                let result = client.list_sessions().await.map_err(|e| e.cause());
                view.sessions_loaded(result)
            }
            Effect::CreateSession => {
                let result = client.create_session().await.map_err(|e| e.cause());
                view.session_created(result)
            }
            Effect::FetchHistory { session_id } => {
                let result = client.history(&session_id).await.map_err(|e| e.cause());
                view.history_loaded(&session_id, result)
            }
            Effect::SubmitTurn {
                session_id,
                message,
                language,
            } => {
                let result = client
                    .submit_turn(session_id.as_deref(), &message, &language)
                    .await
                    .map_err(|e| e.cause());
                view.turn_completed(result)
            }
            Effect::DeleteSession { session_id } => {
                let result = client.delete_session(&session_id).await.map_err(|e| e.cause());
                view.session_deleted(&session_id, result)
            }
        };
        queue.extend(next);
    }
}
