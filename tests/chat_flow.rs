mod common;

use common::{harness, identity, Mode, SYSTEM_PROMPT};
use counsel::chat::TurnRequest;
use counsel::config::ChatConfig;
use counsel::db::Role;
use counsel::error::AppError;
use counsel::llm::LlmError;

fn request(session_id: Option<&str>, message: &str) -> TurnRequest {
    TurnRequest {
        session_id: session_id.map(str::to_string),
        message: message.to_string(),
        language: None,
    }
}

#[tokio::test]
async fn first_turn_creates_session_and_commits_both_messages() {
    let h = harness(Mode::Echo);
    let alice = identity("alice");

    let outcome = h
        .turns
        .submit_turn(request(None, "What are my rights?"), &alice)
        .await
        .unwrap();
    assert!(outcome.committed());
    assert_eq!(outcome.reply, "reply to What are my rights?");

    let history = h.sessions.get_history(&outcome.session_id, &alice).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "What are my rights?");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[0].language, "en");

    let listings = h.sessions.list_sessions(&alice).await.unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].display_label, "What are my rights?");
}

#[tokio::test]
async fn model_context_is_bounded_to_recent_messages() {
    let h = harness(Mode::Echo);
    let alice = identity("alice");
    let session = h.sessions.create_session(&alice).await.unwrap();

    for i in 0..25 {
        h.turns
            .submit_turn(request(Some(&session.id), &format!("question {}", i)), &alice)
            .await
            .unwrap();
    }
    let history = h.sessions.get_history(&session.id, &alice).await.unwrap();
    assert_eq!(history.len(), 50);

    h.turns
        .submit_turn(request(Some(&session.id), "question 25"), &alice)
        .await
        .unwrap();

    let calls = h.provider.calls();
    let last = calls.last().unwrap();
    assert_eq!(last.messages.len(), h.turns.context_bound() + 1);
    assert_eq!(last.messages[0].role, "user");
    assert_eq!(last.messages[0].content, "question 15");
    assert_eq!(last.messages[20].content, "question 25");
    assert_eq!(last.options.system_prompt.as_deref(), Some(SYSTEM_PROMPT));

    // The full transcript is retained even though the model saw only a window.
    let history = h.sessions.get_history(&session.id, &alice).await.unwrap();
    assert_eq!(history.len(), 52);
}

#[tokio::test]
async fn model_failure_returns_fallback_without_committing() {
    let h = harness(Mode::Echo);
    let alice = identity("alice");
    let session = h.sessions.create_session(&alice).await.unwrap();
    h.turns
        .submit_turn(request(Some(&session.id), "first"), &alice)
        .await
        .unwrap();

    h.provider.set_mode(Mode::Fail);
    let outcome = h
        .turns
        .submit_turn(request(Some(&session.id), "second"), &alice)
        .await
        .unwrap();

    assert!(!outcome.committed());
    assert!(matches!(outcome.degraded, Some(LlmError::Api(_))));
    assert_eq!(outcome.reply, ChatConfig::default().fallback_reply);
    assert_eq!(outcome.session_id, session.id);

    let history = h.sessions.get_history(&session.id, &alice).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|m| m.content != "second"));
}

#[tokio::test(start_paused = true)]
async fn slow_model_times_out_into_fallback() {
    let h = harness(Mode::Hang);
    let alice = identity("alice");
    let session = h.sessions.create_session(&alice).await.unwrap();

    let outcome = h
        .turns
        .submit_turn(request(Some(&session.id), "anyone there?"), &alice)
        .await
        .unwrap();

    assert!(matches!(outcome.degraded, Some(LlmError::Timeout(30))));
    assert!(h.sessions.get_history(&session.id, &alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_messages_never_reach_the_model() {
    let h = harness(Mode::Echo);
    let alice = identity("alice");

    let too_long = "x".repeat(2001);
    for bad in ["", "   \n\t", too_long.as_str()] {
        let err = h.turns.submit_turn(request(None, bad), &alice).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    let err = h
        .turns
        .submit_turn(
            TurnRequest {
                session_id: None,
                message: "hello".to_string(),
                language: Some("en_US".to_string()),
            },
            &alice,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    assert!(h.provider.calls().is_empty());
    assert!(h.sessions.list_sessions(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn two_thousand_characters_is_accepted() {
    let h = harness(Mode::Echo);
    let alice = identity("alice");
    let outcome = h
        .turns
        .submit_turn(request(None, &"y".repeat(2000)), &alice)
        .await
        .unwrap();
    assert!(outcome.committed());
}

#[tokio::test]
async fn sessions_are_isolated_between_owners() {
    let h = harness(Mode::Echo);
    let alice = identity("alice");
    let bob = identity("bob");
    let session = h.sessions.create_session(&alice).await.unwrap();

    let err = h
        .turns
        .submit_turn(request(Some(&session.id), "let me in"), &bob)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    assert!(h.provider.calls().is_empty());

    assert!(matches!(
        h.sessions.get_history(&session.id, &bob).await,
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        h.sessions.delete_session(&session.id, &bob).await,
        Err(AppError::Forbidden)
    ));
    assert!(h.sessions.list_sessions(&bob).await.unwrap().is_empty());
    assert_eq!(h.sessions.list_sessions(&alice).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let h = harness(Mode::Echo);
    let alice = identity("alice");

    let err = h
        .turns
        .submit_turn(request(Some("no-such-session"), "hello"), &alice)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn deleting_twice_reports_not_found() {
    let h = harness(Mode::Echo);
    let alice = identity("alice");
    let outcome = h.turns.submit_turn(request(None, "hello"), &alice).await.unwrap();

    h.sessions.delete_session(&outcome.session_id, &alice).await.unwrap();
    assert!(matches!(
        h.sessions.delete_session(&outcome.session_id, &alice).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        h.sessions.get_history(&outcome.session_id, &alice).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn concurrent_turns_on_one_session_commit_as_whole_pairs() {
    let h = harness(Mode::Echo);
    let alice = identity("alice");
    let session = h.sessions.create_session(&alice).await.unwrap();

    let (a, b) = tokio::join!(
        h.turns.submit_turn(request(Some(&session.id), "alpha"), &alice),
        h.turns.submit_turn(request(Some(&session.id), "beta"), &alice),
    );
    assert!(a.unwrap().committed());
    assert!(b.unwrap().committed());

    let history = h.sessions.get_history(&session.id, &alice).await.unwrap();
    assert_eq!(history.len(), 4);
    for pair in history.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
        assert_eq!(pair[1].content, format!("reply to {}", pair[0].content));
    }
}

#[tokio::test]
async fn non_english_turns_request_reply_language() {
    let h = harness(Mode::Echo);
    let alice = identity("alice");

    let outcome = h
        .turns
        .submit_turn(
            TurnRequest {
                session_id: None,
                message: "मेरे अधिकार क्या हैं?".to_string(),
                language: Some("HI".to_string()),
            },
            &alice,
        )
        .await
        .unwrap();

    let calls = h.provider.calls();
    let prompt = calls[0].options.system_prompt.clone().unwrap();
    assert!(prompt.starts_with(SYSTEM_PROMPT));
    assert!(prompt.contains("'hi'"));

    let history = h.sessions.get_history(&outcome.session_id, &alice).await.unwrap();
    assert!(history.iter().all(|m| m.language == "hi"));
}

#[tokio::test]
async fn export_contains_every_message() {
    let h = harness(Mode::Echo);
    let alice = identity("alice");
    let outcome = h.turns.submit_turn(request(None, "hello"), &alice).await.unwrap();
    h.sessions
        .rename_session(&outcome.session_id, &alice, "Greeting")
        .await
        .unwrap();

    let export = h.sessions.export_session(&outcome.session_id, &alice).await.unwrap();
    assert!(export.starts_with("Session: Greeting\n"));
    assert!(export.contains("[USER] (en, "));
    assert!(export.contains("): reply to hello\n"));
}

mod failing_store {
    use async_trait::async_trait;
    use counsel::db::{Message, MemoryStore, Session, SessionSummary, StoreError, TranscriptStore, Turn};

    /// Delegates to an in-memory store but refuses every turn commit.
    pub struct RejectingAppends(pub MemoryStore);

    #[async_trait]
    impl TranscriptStore for RejectingAppends {
        async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
            self.0.create_session(session).await
        }

        async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
            self.0.get_session(id).await
        }

        async fn list_sessions(&self, owner: &str) -> Result<Vec<SessionSummary>, StoreError> {
            self.0.list_sessions(owner).await
        }

        async fn messages(&self, id: &str) -> Result<Vec<Message>, StoreError> {
            self.0.messages(id).await
        }

        async fn recent_messages(&self, id: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
            self.0.recent_messages(id, limit).await
        }

        async fn append_turn(&self, _id: &str, _turn: &Turn) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk full".to_string()))
        }

        async fn rename_session(&self, id: &str, label: &str) -> Result<(), StoreError> {
            self.0.rename_session(id, label).await
        }

        async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
            self.0.delete_session(id).await
        }
    }
}

#[tokio::test]
async fn store_failure_on_commit_surfaces_and_leaves_transcript_empty() {
    use counsel::chat::{SessionManager, TurnCoordinator};
    use counsel::llm::{models::ChatOptions, ModelBridge};
    use std::sync::Arc;

    let store = Arc::new(failing_store::RejectingAppends(counsel::db::MemoryStore::new(
        chrono::Duration::hours(24),
    )));
    let sessions = Arc::new(SessionManager::new(store));
    let provider = common::ScriptedProvider::new(Mode::Echo);
    let bridge = ModelBridge::new(
        provider.clone(),
        ChatOptions::default(),
        std::time::Duration::from_secs(30),
    );
    let turns = TurnCoordinator::new(sessions.clone(), bridge, &ChatConfig::default());
    let alice = identity("alice");
    let session = sessions.create_session(&alice).await.unwrap();

    let err = turns
        .submit_turn(request(Some(&session.id), "hello"), &alice)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StoreUnavailable(_)));
    assert_eq!(provider.calls().len(), 1);
    assert!(sessions.get_history(&session.id, &alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn replying_to_an_older_session_moves_it_to_the_top() {
    let h = harness(Mode::Echo);
    let alice = identity("alice");
    let first = h.sessions.create_session(&alice).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = h.sessions.create_session(&alice).await.unwrap();

    let listed = h.sessions.list_sessions(&alice).await.unwrap();
    assert_eq!(listed[0].session.id, second.id);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    h.turns
        .submit_turn(request(Some(&first.id), "back to this one"), &alice)
        .await
        .unwrap();

    let listed = h.sessions.list_sessions(&alice).await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|l| l.session.id.as_str()).collect();
    assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);

    let history = h.sessions.get_history(&first.id, &alice).await.unwrap();
    assert!(history[0].created_at <= history[1].created_at);
}
