//! Chat session — one tutoring conversation bound to a chapter.
//!
//! DESIGN
//! ======
//! A session is opened for exactly one chapter and seeded with a greeting.
//! Each user turn appends the user's message immediately, sends it with the
//! chapter context and a bounded slice of prior history, and appends either
//! the tutor's reply or a fixed apology. The backend stores every successful
//! exchange as a doubt for the chapter; the session announces that through a
//! broadcast channel so listeners can refresh.
//!
//! SESSION EPOCH
//! =============
//! Closing or reopening bumps an epoch counter. A reply that lands after its
//! session ended is dropped instead of leaking into the next conversation.
//! Concurrent sends within one session are allowed; replies are appended in
//! arrival order, not request order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{ErrorCode, ValidationError};
use crate::gateway::types::ChatRequest;
use crate::gateway::{GatewayError, TutorGateway};
use crate::state::chat::{Chapter, ChatMessage, ChatSnapshot, ChatState, FALLBACK_REPLY, Role};
use crate::store::{self, CHAT_KEY, Storage};

const EVENT_CAPACITY: usize = 32;

// =============================================================================
// ERRORS / EVENTS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no chat session is open")]
    NotOpen,

    #[error("chat session ended before the reply arrived")]
    SessionEnded,

    #[error("failed to send message: {0}")]
    Gateway(#[from] GatewayError),
}

impl ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::NotOpen => "E_CHAT_NOT_OPEN",
            Self::SessionEnded => "E_CHAT_SESSION_ENDED",
            Self::Gateway(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Gateway(e) if e.retryable())
    }
}

/// Notifications emitted by a [`ChatSession`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    /// A reply arrived; the backend has recorded the exchange for this chapter.
    DoubtSaved { chapter_id: String },
}

// =============================================================================
// SESSION
// =============================================================================

struct ChatInner {
    state: ChatState,
    epoch: u64,
    pending_replies: usize,
}

pub struct ChatSession {
    gateway: Arc<dyn TutorGateway>,
    storage: Arc<dyn Storage>,
    history_window: usize,
    inner: Mutex<ChatInner>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatSession {
    /// Create a session, rehydrating persisted messages and chapter.
    pub fn new(gateway: Arc<dyn TutorGateway>, storage: Arc<dyn Storage>, history_window: usize) -> Self {
        let state = store::load_json::<ChatSnapshot>(storage.as_ref(), CHAT_KEY)
            .map(ChatState::restore)
            .unwrap_or_default();
        if state.is_open {
            info!(messages = state.messages.len(), "chat: restored session");
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            storage,
            history_window,
            inner: Mutex::new(ChatInner { state, epoch: 0, pending_replies: 0 }),
            events,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Point-in-time copy of the session state.
    #[must_use]
    pub fn snapshot(&self) -> ChatState {
        self.lock().state.clone()
    }

    /// Bind `chapter` and start a fresh conversation with a greeting.
    pub fn open_chat(&self, chapter: Chapter) {
        let mut inner = self.lock();
        info!(chapter_id = %chapter.id, title = %chapter.title, "chat: opened");
        inner.epoch += 1;
        inner.pending_replies = 0;
        inner.state.open(chapter);
        self.persist(&inner.state);
    }

    /// End the session and discard its messages.
    pub fn close_chat(&self) {
        let mut inner = self.lock();
        if inner.state.is_open {
            info!("chat: closed");
        }
        inner.epoch += 1;
        inner.pending_replies = 0;
        inner.state.close();
        self.persist(&inner.state);
    }

    /// Send one user turn and wait for the tutor's reply.
    ///
    /// The user's message is appended before the call. On gateway failure
    /// the fixed apology is appended and the error is returned for display.
    ///
    /// # Errors
    ///
    /// [`ChatError::Validation`] for blank input and [`ChatError::NotOpen`]
    /// without an open session; neither touches state. [`ChatError::Gateway`]
    /// when the backend call fails and [`ChatError::SessionEnded`] when the
    /// session was closed or reopened while waiting.
    pub async fn send_user_message(&self, text: &str) -> Result<ChatMessage, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let (request, epoch) = {
            let mut inner = self.lock();
            let chapter = match (&inner.state.selected_chapter, inner.state.is_open) {
                (Some(chapter), true) => chapter.clone(),
                _ => return Err(ChatError::NotOpen),
            };
            let conversation_history = inner.state.recent_history(self.history_window);
            inner.state.push(ChatMessage::user(text));
            inner.pending_replies += 1;
            inner.state.is_typing = true;
            self.persist(&inner.state);

            let request = ChatRequest {
                message: text.to_owned(),
                chapter_title: chapter.title,
                chapter_notes: chapter.notes,
                chapter_id: Some(chapter.id).filter(|id| !id.is_empty()),
                conversation_history,
            };
            (request, inner.epoch)
        };

        let _typing = TypingGuard { session: self, epoch };
        debug!(history = request.conversation_history.len(), "chat: sending");
        let result = self.gateway.send_chat_message(&request).await;

        let mut inner = self.lock();
        if inner.epoch != epoch {
            info!("chat: dropping reply for ended session");
            return match result {
                Ok(_) => Err(ChatError::SessionEnded),
                Err(e) => Err(e.into()),
            };
        }

        match result {
            Ok(reply) => {
                let message = ChatMessage {
                    role: Role::Assistant,
                    content: reply.response,
                    timestamp: reply.timestamp.unwrap_or_else(crate::state::now_rfc3339),
                };
                inner.state.push(message.clone());
                if let Some(chapter_id) = request.chapter_id {
                    inner.state.doubt_saved(chapter_id.clone());
                    // No subscribers is fine.
                    let _ = self.events.send(ChatEvent::DoubtSaved { chapter_id });
                }
                self.persist(&inner.state);
                Ok(message)
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "chat: send failed");
                inner.state.push(ChatMessage::assistant(FALLBACK_REPLY));
                self.persist(&inner.state);
                Err(e.into())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChatInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &ChatState) {
        store::save_json(self.storage.as_ref(), CHAT_KEY, &state.snapshot());
    }
}

/// Clears the typing flag for one outstanding reply, however the send ends.
struct TypingGuard<'a> {
    session: &'a ChatSession,
    epoch: u64,
}

impl Drop for TypingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.session.lock();
        if inner.epoch != self.epoch {
            return;
        }
        inner.pending_replies = inner.pending_replies.saturating_sub(1);
        inner.state.is_typing = inner.pending_replies > 0;
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
