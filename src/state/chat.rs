use serde::{Deserialize, Serialize};

/// Fields of [`ChatState`] that survive a restart. Everything else
/// (`is_open`, `is_typing`, `last_saved_doubt_chapter_id`) is ephemeral.
pub const PERSISTED_FIELDS: &[&str] = &["messages", "selectedChapter"];

/// Reply appended when the chat gateway fails.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// A course chapter a chat session can be bound to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    #[serde(default, alias = "ai_generated_notes", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Chapter {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), notes: None }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat message. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), timestamp: super::now_rfc3339() }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), timestamp: super::now_rfc3339() }
    }
}

/// Greeting seeded into every freshly opened session.
#[must_use]
pub fn greeting_for(chapter: &Chapter) -> String {
    format!(
        "Hello! I'm here to help you understand \"{}\". Ask me anything about this chapter!",
        chapter.title
    )
}

/// State for the chapter tutoring chat.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatState {
    pub is_open: bool,
    pub selected_chapter: Option<Chapter>,
    pub messages: Vec<ChatMessage>,
    pub is_typing: bool,
    pub last_saved_doubt_chapter_id: Option<String>,
}

impl ChatState {
    /// Bind a chapter and seed the greeting, replacing any previous session.
    pub fn open(&mut self, chapter: Chapter) {
        self.messages = vec![ChatMessage::assistant(greeting_for(&chapter))];
        self.selected_chapter = Some(chapter);
        self.is_open = true;
        self.is_typing = false;
    }

    pub fn close(&mut self) {
        self.is_open = false;
        self.selected_chapter = None;
        self.messages.clear();
        self.is_typing = false;
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn doubt_saved(&mut self, chapter_id: impl Into<String>) {
        self.last_saved_doubt_chapter_id = Some(chapter_id.into());
    }

    /// The last `window` messages, oldest first.
    #[must_use]
    pub fn recent_history(&self, window: usize) -> Vec<ChatMessage> {
        let start = self.messages.len().saturating_sub(window);
        self.messages[start..].to_vec()
    }

    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot { messages: self.messages.clone(), selected_chapter: self.selected_chapter.clone() }
    }

    /// Rebuild state from a persisted snapshot.
    ///
    /// `is_open` is derived from the presence of a chapter; messages without
    /// a chapter are dropped so a restored state never shows messages while
    /// closed.
    #[must_use]
    pub fn restore(snapshot: ChatSnapshot) -> Self {
        match snapshot.selected_chapter {
            Some(chapter) => Self {
                is_open: true,
                selected_chapter: Some(chapter),
                messages: snapshot.messages,
                ..Self::default()
            },
            None => Self::default(),
        }
    }
}

/// Persisted subset of [`ChatState`]; see [`PERSISTED_FIELDS`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSnapshot {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub selected_chapter: Option<Chapter>,
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
