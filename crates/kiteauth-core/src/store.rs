//! In-memory session store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::traits::SessionStore;
use crate::{Result, Session};

/// A [`SessionStore`] that keeps records in process memory.
///
/// Useful for tests and for embedding where the host already persists the
/// token elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a session.
    pub fn with_session(session: Session) -> Self {
        let store = Self::new();
        store
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.user_id().to_string(), session);
        store
    }

    /// Returns a copy of the stored session for `user_id` without going
    /// through the async trait.
    pub fn get(&self, user_id: &str) -> Option<Session> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, user_id: &str) -> Result<Option<Session>> {
        Ok(self.get(user_id))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.user_id().to_string(), session.clone());
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> Result<()> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
        Ok(())
    }
}
