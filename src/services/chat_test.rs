use super::*;
use crate::gateway::test_helpers::{MockGateway, chat_reply};
use crate::store::MemoryStorage;
use tokio::sync::Notify;

fn algebra() -> Chapter {
    Chapter::new("c1", "Linear Equations").with_notes("ax + b = c")
}

fn session_with(mock: Arc<MockGateway>) -> (ChatSession, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (ChatSession::new(mock, storage.clone(), 6), storage)
}

async fn wait_for_chat_calls(mock: &MockGateway, n: usize) {
    while mock.calls.lock().unwrap().chat.len() < n {
        tokio::task::yield_now().await;
    }
}

// =========================================================================
// open / close
// =========================================================================

#[test]
fn open_seeds_single_greeting_with_title() {
    let (session, _) = session_with(Arc::new(MockGateway::new()));
    session.open_chat(algebra());

    let state = session.snapshot();
    assert!(state.is_open);
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].role, Role::Assistant);
    assert!(state.messages[0].content.contains("Linear Equations"));
}

#[tokio::test]
async fn close_discards_everything() {
    let (session, _) = session_with(Arc::new(MockGateway::new()));
    session.open_chat(algebra());
    session.send_user_message("what is x?").await.unwrap();

    session.close_chat();

    let state = session.snapshot();
    assert!(!state.is_open);
    assert!(state.selected_chapter.is_none());
    assert!(state.messages.is_empty());
    assert!(!state.is_typing);
}

#[tokio::test]
async fn reopen_replaces_previous_conversation() {
    let (session, _) = session_with(Arc::new(MockGateway::new()));
    session.open_chat(algebra());
    session.send_user_message("first").await.unwrap();

    session.open_chat(Chapter::new("c2", "Quadratics"));

    let state = session.snapshot();
    assert_eq!(state.messages.len(), 1);
    assert!(state.messages[0].content.contains("Quadratics"));
}

// =========================================================================
// send_user_message
// =========================================================================

#[tokio::test]
async fn send_appends_user_then_reply() {
    let mock = Arc::new(MockGateway::new());
    mock.push_chat(Ok(chat_reply("x = 5")));
    let (session, _) = session_with(mock.clone());
    session.open_chat(algebra());

    let reply = session.send_user_message("  solve 2x = 10  ").await.unwrap();
    assert_eq!(reply.content, "x = 5");
    assert_eq!(reply.timestamp, "2026-01-01T00:00:00Z");

    let state = session.snapshot();
    assert_eq!(state.messages.len(), 3);
    assert_eq!(state.messages[1].role, Role::User);
    assert_eq!(state.messages[1].content, "solve 2x = 10");
    assert_eq!(state.messages[2].content, "x = 5");
    assert!(!state.is_typing);

    let calls = mock.calls.lock().unwrap();
    let request = &calls.chat[0];
    assert_eq!(request.message, "solve 2x = 10");
    assert_eq!(request.chapter_title, "Linear Equations");
    assert_eq!(request.chapter_notes.as_deref(), Some("ax + b = c"));
    assert_eq!(request.chapter_id.as_deref(), Some("c1"));
    // History excludes the message being sent.
    assert_eq!(request.conversation_history.len(), 1);
}

#[tokio::test]
async fn failure_appends_apology_and_surfaces_error() {
    let mock = Arc::new(MockGateway::new());
    mock.push_chat(Err(GatewayError::Server { status: 500, message: "model overloaded".into() }));
    let (session, _) = session_with(mock);
    session.open_chat(algebra());

    let err = session.send_user_message("hello").await.unwrap_err();
    assert!(matches!(err, ChatError::Gateway(_)));
    assert!(err.to_string().contains("model overloaded"));

    let state = session.snapshot();
    assert_eq!(state.messages.len(), 3);
    assert_eq!(state.messages[1].content, "hello");
    assert_eq!(state.messages[2].content, FALLBACK_REPLY);
    assert!(!state.is_typing);
    assert!(state.last_saved_doubt_chapter_id.is_none());
}

#[tokio::test]
async fn blank_message_is_rejected_without_call() {
    let mock = Arc::new(MockGateway::new());
    let (session, _) = session_with(mock.clone());
    session.open_chat(algebra());

    let err = session.send_user_message("   ").await.unwrap_err();
    assert_eq!(err.error_code(), "E_EMPTY_MESSAGE");
    assert_eq!(session.snapshot().messages.len(), 1);
    assert!(mock.calls.lock().unwrap().chat.is_empty());
}

#[tokio::test]
async fn send_without_session_is_rejected() {
    let mock = Arc::new(MockGateway::new());
    let (session, _) = session_with(mock.clone());

    let err = session.send_user_message("hi").await.unwrap_err();
    assert!(matches!(err, ChatError::NotOpen));
    assert!(mock.calls.lock().unwrap().chat.is_empty());
}

#[tokio::test]
async fn history_is_bounded_to_window() {
    let mock = Arc::new(MockGateway::new());
    let (session, _) = session_with(mock.clone());
    session.open_chat(algebra());

    for i in 0..5 {
        session.send_user_message(&format!("q{i}")).await.unwrap();
    }

    let calls = mock.calls.lock().unwrap();
    let last = calls.chat.last().unwrap();
    assert_eq!(last.conversation_history.len(), 6);
    assert_eq!(last.conversation_history[0].content, "q1");
    assert_eq!(last.conversation_history[5].content, "ok");
    assert_eq!(last.conversation_history[4].content, "q3");
}

#[tokio::test]
async fn reply_announces_saved_doubt() {
    let (session, _) = session_with(Arc::new(MockGateway::new()));
    let mut events = session.subscribe();
    session.open_chat(algebra());

    session.send_user_message("why?").await.unwrap();

    assert_eq!(events.try_recv().unwrap(), ChatEvent::DoubtSaved { chapter_id: "c1".into() });
    assert_eq!(session.snapshot().last_saved_doubt_chapter_id.as_deref(), Some("c1"));
}

// =========================================================================
// In-flight behavior
// =========================================================================

#[tokio::test]
async fn typing_is_set_while_waiting() {
    let gate = Arc::new(Notify::new());
    let mock = Arc::new(MockGateway::gated(gate.clone()));
    let (session, _) = session_with(mock.clone());
    let session = Arc::new(session);
    session.open_chat(algebra());

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.send_user_message("hi").await }
    });
    wait_for_chat_calls(&mock, 1).await;
    assert!(session.snapshot().is_typing);

    gate.notify_one();
    task.await.unwrap().unwrap();
    assert!(!session.snapshot().is_typing);
}

#[tokio::test]
async fn reply_after_close_is_dropped() {
    let gate = Arc::new(Notify::new());
    let mock = Arc::new(MockGateway::gated(gate.clone()));
    let (session, _) = session_with(mock.clone());
    let session = Arc::new(session);
    let mut events = session.subscribe();
    session.open_chat(algebra());

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.send_user_message("hi").await }
    });
    wait_for_chat_calls(&mock, 1).await;
    session.close_chat();
    gate.notify_one();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, ChatError::SessionEnded));
    let state = session.snapshot();
    assert!(state.messages.is_empty());
    assert!(!state.is_typing);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn stale_reply_does_not_clear_new_session_typing() {
    let gate = Arc::new(Notify::new());
    let mock = Arc::new(MockGateway::gated(gate.clone()));
    let (session, _) = session_with(mock.clone());
    let session = Arc::new(session);
    session.open_chat(algebra());

    let stale = tokio::spawn({
        let session = session.clone();
        async move { session.send_user_message("old").await }
    });
    wait_for_chat_calls(&mock, 1).await;

    session.open_chat(Chapter::new("c2", "Quadratics"));
    let fresh = tokio::spawn({
        let session = session.clone();
        async move { session.send_user_message("new").await }
    });
    wait_for_chat_calls(&mock, 2).await;

    gate.notify_one();
    let first = stale.await.unwrap();
    assert!(matches!(first, Err(ChatError::SessionEnded)));
    assert!(session.snapshot().is_typing);

    gate.notify_one();
    fresh.await.unwrap().unwrap();
    let state = session.snapshot();
    assert!(!state.is_typing);
    assert_eq!(state.messages.len(), 3);
}

// =========================================================================
// Persistence
// =========================================================================

#[tokio::test]
async fn session_survives_restart() {
    let mock = Arc::new(MockGateway::new());
    let (session, storage) = session_with(mock.clone());
    session.open_chat(algebra());
    session.send_user_message("remember me").await.unwrap();
    let before = session.snapshot();

    let restored = ChatSession::new(mock, storage, 6);
    let after = restored.snapshot();
    assert!(after.is_open);
    assert_eq!(after.selected_chapter, before.selected_chapter);
    assert_eq!(after.messages, before.messages);
    assert!(!after.is_typing);
    assert!(after.last_saved_doubt_chapter_id.is_none());
}

#[test]
fn closed_session_restores_closed() {
    let mock = Arc::new(MockGateway::new());
    let (session, storage) = session_with(mock.clone());
    session.open_chat(algebra());
    session.close_chat();

    let restored = ChatSession::new(mock, storage, 6);
    assert_eq!(restored.snapshot(), ChatState::default());
}
