use super::session::Session;
use crate::error::{RecordError, RecordResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

/// Shared handle to one session; the mutex serialises its mutable fields
pub type SessionHandle = Arc<Mutex<Session>>;

/// Active sessions (session_id → session)
///
/// The map lock is only held for lookup, insert and remove, so messages for
/// different sessions never wait on each other.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, session_id: &str) -> RecordResult<SessionHandle> {
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(session_id) {
            return Err(RecordError::DuplicateSession(session_id.to_string()));
        }

        let session = Arc::new(Mutex::new(Session::new(session_id.to_string())));
        sessions.insert(session_id.to_string(), Arc::clone(&session));

        info!("Session {} created ({} active)", session_id, sessions.len());

        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> RecordResult<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| RecordError::SessionNotFound(session_id.to_string()))
    }

    /// Detach a session; the caller releases what it owns
    pub async fn remove(&self, session_id: &str) -> RecordResult<SessionHandle> {
        let mut sessions = self.sessions.write().await;

        let session = sessions
            .remove(session_id)
            .ok_or_else(|| RecordError::SessionNotFound(session_id.to_string()))?;

        info!("Session {} removed ({} active)", session_id, sessions.len());

        Ok(session)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }
}
