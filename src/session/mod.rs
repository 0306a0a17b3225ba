//! Per-session conversation state.
//!
//! A [`ChatSession`] owns the append-only message list and the translation
//! cache for its assistant replies. Nothing here talks to the network; the
//! turn controller in [`crate::agent`] drives all transitions.

pub mod store;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::ErrorKind;

pub use store::{SessionEntry, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<PathBuf>,
    /// Set when `content` is a catalog message standing in for a failed reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ErrorKind>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            audio: None,
            failure: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            audio: None,
            failure: None,
        }
    }

    pub fn failed(kind: ErrorKind, content: impl Into<String>) -> Self {
        Self {
            failure: Some(kind),
            ..Self::assistant(content)
        }
    }

    /// A genuine assistant reply (not a failure stand-in).
    pub fn is_reply(&self) -> bool {
        self.role == Role::Assistant && self.failure.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    AwaitingResponse,
}

/// Ordered, append-only list of messages.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting(greeting: &str) -> Self {
        Self {
            messages: vec![Message::assistant(greeting)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Awaiting a response exactly when the last message is from the user.
    pub fn state(&self) -> TurnState {
        match self.messages.last() {
            Some(m) if m.role == Role::User => TurnState::AwaitingResponse,
            _ => TurnState::Idle,
        }
    }

    /// Append a message and return its index.
    pub(crate) fn push(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Attach audio to the trailing assistant message.
    ///
    /// Only the last message may still change, and only if it is an assistant
    /// reply; returns `false` otherwise.
    pub(crate) fn attach_audio(&mut self, index: usize, path: PathBuf) -> bool {
        let last = self.messages.len().checked_sub(1);
        match self.messages.last_mut() {
            Some(message) if Some(index) == last && message.is_reply() => {
                message.audio = Some(path);
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TranslationSlot {
    visible: bool,
    text: Option<String>,
}

/// Visibility flags and lazily filled translations, keyed by message index.
#[derive(Debug, Clone, Default)]
pub struct TranslationCache {
    slots: HashMap<usize, TranslationSlot>,
}

impl TranslationCache {
    pub fn is_visible(&self, index: usize) -> bool {
        self.slots.get(&index).is_some_and(|s| s.visible)
    }

    pub fn cached(&self, index: usize) -> Option<&str> {
        self.slots.get(&index).and_then(|s| s.text.as_deref())
    }

    /// Flip visibility and return the new value.
    pub(crate) fn toggle(&mut self, index: usize) -> bool {
        let slot = self.slots.entry(index).or_default();
        slot.visible = !slot.visible;
        slot.visible
    }

    /// Store a translation. An existing entry is never replaced.
    pub(crate) fn store(&mut self, index: usize, text: String) -> &str {
        let slot = self.slots.entry(index).or_default();
        slot.text.get_or_insert(text)
    }

    pub fn len(&self) -> usize {
        self.slots.values().filter(|s| s.text.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the surface shows for one message's translation toggle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationView {
    pub index: usize,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    conversation: Conversation,
    translations: TranslationCache,
}

impl ChatSession {
    pub fn new(greeting: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            conversation: greeting
                .map(Conversation::with_greeting)
                .unwrap_or_default(),
            translations: TranslationCache::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub(crate) fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub fn translations(&self) -> &TranslationCache {
        &self.translations
    }

    pub(crate) fn translations_mut(&mut self) -> &mut TranslationCache {
        &mut self.translations
    }

    pub fn state(&self) -> TurnState {
        self.conversation.state()
    }

    pub fn audio_path(&self, index: usize) -> Option<&Path> {
        self.conversation.get(index).and_then(|m| m.audio.as_deref())
    }

    /// Delete the audio files attached to this session's replies.
    ///
    /// Returns how many were removed. Files already gone are skipped.
    pub async fn discard_audio(&self) -> usize {
        let mut removed = 0;
        for path in self.conversation.messages().iter().filter_map(|m| m.audio.as_deref()) {
            match tokio::fs::remove_file(path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(session = %self.id, path = %path.display(), error = %e, "could not remove audio")
                }
            }
        }
        debug!(session = %self.id, removed, "session audio discarded");
        removed
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            created_at: self.created_at,
            state: self.state(),
            messages: self
                .conversation
                .messages()
                .iter()
                .enumerate()
                .map(|(index, m)| MessageView {
                    index,
                    role: m.role,
                    content: m.content.clone(),
                    has_audio: m.audio.is_some(),
                    failure: m.failure,
                    translatable: m.is_reply(),
                    translation: self
                        .translations
                        .is_visible(index)
                        .then(|| self.translations.cached(index).map(str::to_string))
                        .flatten(),
                })
                .collect(),
        }
    }
}

/// Render-ready view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub state: TurnState,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub index: usize,
    pub role: Role,
    pub content: String,
    pub has_audio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ErrorKind>,
    pub translatable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_follows_last_role() {
        let mut conv = Conversation::new();
        assert_eq!(conv.state(), TurnState::Idle);

        conv.push(Message::user("Hello"));
        assert_eq!(conv.state(), TurnState::AwaitingResponse);

        conv.push(Message::assistant("Akwaaba!"));
        assert_eq!(conv.state(), TurnState::Idle);

        conv.push(Message::user("Wo ho te sɛn?"));
        conv.push(Message::failed(ErrorKind::GenerationFailed, "x"));
        assert_eq!(conv.state(), TurnState::Idle);
    }

    #[test]
    fn greeting_starts_idle() {
        let conv = Conversation::with_greeting("Afehyia pa!");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.state(), TurnState::Idle);
        assert!(conv.messages()[0].is_reply());
    }

    #[test]
    fn audio_only_attaches_to_trailing_reply() {
        let mut conv = Conversation::with_greeting("Afehyia pa!");
        let user = conv.push(Message::user("Hello"));
        assert!(!conv.attach_audio(user, PathBuf::from("/a.wav")));
        assert!(!conv.attach_audio(0, PathBuf::from("/a.wav")));

        let reply = conv.push(Message::assistant("Akwaaba!"));
        assert!(conv.attach_audio(reply, PathBuf::from("/b.wav")));
        assert_eq!(conv.get(reply).unwrap().audio, Some(PathBuf::from("/b.wav")));
        assert!(conv.get(0).unwrap().audio.is_none());

        let failed = conv.push(Message::failed(ErrorKind::GenerationFailed, "x"));
        assert!(!conv.attach_audio(failed, PathBuf::from("/c.wav")));
    }

    #[test]
    fn push_preserves_order() {
        let mut conv = Conversation::new();
        let texts = ["a", "b", "c", "d"];
        for (i, t) in texts.iter().enumerate() {
            let msg = if i % 2 == 0 { Message::user(*t) } else { Message::assistant(*t) };
            assert_eq!(conv.push(msg), i);
        }
        let contents: Vec<&str> = conv.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, texts);
    }

    #[test]
    fn translation_toggle_and_cache() {
        let mut cache = TranslationCache::default();
        assert!(!cache.is_visible(3));
        assert!(cache.toggle(3));
        assert!(cache.is_visible(3));
        assert_eq!(cache.store(3, "Welcome!".to_string()), "Welcome!");
        assert_eq!(cache.store(3, "ignored".to_string()), "Welcome!");
        assert!(!cache.toggle(3));
        assert_eq!(cache.cached(3), Some("Welcome!"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn snapshot_shows_visible_translations_only() {
        let mut session = ChatSession::new(Some("Afehyia pa!"));
        session.translations_mut().toggle(0);
        session.translations_mut().store(0, "Happy new year!".to_string());

        let snap = session.snapshot();
        assert_eq!(snap.messages[0].translation.as_deref(), Some("Happy new year!"));
        assert!(snap.messages[0].translatable);

        session.translations_mut().toggle(0);
        assert!(session.snapshot().messages[0].translation.is_none());
    }

    #[test]
    fn message_serializes_without_empty_fields() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("audio").is_none());
        assert!(json.get("failure").is_none());

        let json = serde_json::to_value(Message::failed(ErrorKind::GenerationFailed, "x")).unwrap();
        assert_eq!(json["failure"]["kind"], "generation_failed");
    }

    #[tokio::test]
    async fn discard_audio_removes_reply_files() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("a.wav");
        std::fs::write(&kept, b"RIFF").unwrap();

        let mut session = ChatSession::new(Some("Afehyia pa!"));
        session.conversation_mut().push(Message::user("Hello"));
        let first = session.conversation_mut().push(Message::assistant("Akwaaba!"));
        session.conversation_mut().attach_audio(first, kept.clone());
        session.conversation_mut().push(Message::user("Medaase"));
        let second = session.conversation_mut().push(Message::assistant("Yoo"));
        session
            .conversation_mut()
            .attach_audio(second, dir.path().join("gone.wav"));

        assert_eq!(session.discard_audio().await, 1);
        assert!(!kept.exists());
        assert_eq!(session.discard_audio().await, 0);
    }
}
