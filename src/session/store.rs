//! In-memory registry of live chat sessions.
//!
//! Sessions are never persisted; dropping an entry ends the session.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::concurrency::TurnGate;
use crate::session::ChatSession;

/// One live session plus the gate that keeps its turns sequential.
pub struct SessionEntry {
    pub gate: TurnGate,
    pub session: Mutex<ChatSession>,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<Uuid, Arc<SessionEntry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session, seeded with `greeting` when given.
    pub fn create(&self, greeting: Option<&str>) -> (Uuid, Arc<SessionEntry>) {
        let session = ChatSession::new(greeting);
        let id = session.id();
        let entry = Arc::new(SessionEntry {
            gate: TurnGate::new(),
            session: Mutex::new(session),
        });
        self.sessions.insert(id, entry.clone());
        info!(session = %id, live = self.sessions.len(), "session started");
        (id, entry)
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<SessionEntry>> {
        self.sessions.get(id).map(|e| e.value().clone())
    }

    /// End a session and hand back its entry, or `None` if it did not exist.
    ///
    /// A turn already holding the entry still runs to completion.
    pub fn remove(&self, id: &Uuid) -> Option<Arc<SessionEntry>> {
        let (_, entry) = self.sessions.remove(id)?;
        info!(session = %id, live = self.sessions.len(), "session ended");
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions with a turn currently in flight.
    pub fn active_turns(&self) -> usize {
        self.sessions.iter().filter(|e| e.value().gate.is_busy()).count()
    }
}
