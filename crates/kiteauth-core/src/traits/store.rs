//! Session persistence trait.

use async_trait::async_trait;

use crate::{Result, Session};

/// Persistent storage for sessions, keyed by user id.
///
/// Implementations only move records in and out; deciding whether a loaded
/// session is still usable is the authenticator's job.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the stored session for `user_id`, if any.
    async fn load(&self, user_id: &str) -> Result<Option<Session>>;

    /// Store `session`, replacing any previous record for its user id.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Remove the stored session for `user_id`. Removing a missing record
    /// is not an error.
    async fn clear(&self, user_id: &str) -> Result<()>;
}
