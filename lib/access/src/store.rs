//! Session storage.
//!
//! [`SessionStore`] is the seam between route handlers and wherever session
//! records live. [`MemorySessionStore`] keeps them in process memory, which
//! means sessions do not survive a restart and are not shared between
//! replicas.

use async_trait::async_trait;
use std::collections::HashMap;
use tenant_gate_core::{Result, SessionId};
use tokio::sync::RwLock;

use crate::error::SessionError;
use crate::session::Session;

/// Storage for session records keyed by [`SessionId`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Finds a live session by ID. Expired sessions are reported as absent.
    async fn load(&self, id: SessionId) -> Result<Option<Session>, SessionError>;

    /// Inserts or replaces a session.
    async fn save(&self, session: Session) -> Result<(), SessionError>;

    /// Deletes a session by ID. Deleting an unknown ID is not an error.
    async fn delete(&self, id: SessionId) -> Result<(), SessionError>;

    /// Deletes expired sessions, returning how many were removed.
    async fn delete_expired(&self) -> Result<u64, SessionError>;
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions, expired ones included.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true if no sessions are stored.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Returns true if any stored session has a signed-in user.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn any_authenticated(&self) -> bool {
        self.sessions
            .read()
            .await
            .values()
            .any(Session::is_authenticated)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: SessionId) -> Result<Option<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id).filter(|s| !s.is_expired()).cloned())
    }

    async fn save(&self, session: Session) -> Result<(), SessionError> {
        self.sessions.write().await.insert(session.id(), session);
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), SessionError> {
        self.sessions.write().await.remove(&id);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, SessionError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::IdTokenClaims;
    use chrono::Duration;

    #[tokio::test]
    async fn save_then_load() {
        let store = MemorySessionStore::new();
        let session = Session::new(SessionId::new(), Duration::hours(1));
        let id = session.id();

        store.save(session.clone()).await.expect("save");

        assert_eq!(store.load(id).await.expect("load"), Some(session));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn load_unknown_is_none() {
        let store = MemorySessionStore::new();
        assert!(store.load(SessionId::new()).await.expect("load").is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn expired_sessions_are_invisible_and_swept() {
        let store = MemorySessionStore::new();
        let expired = Session::new(SessionId::new(), Duration::seconds(-1));
        let live = Session::new(SessionId::new(), Duration::hours(1));
        let expired_id = expired.id();

        store.save(expired).await.expect("save");
        store.save(live.clone()).await.expect("save");

        assert!(store.load(expired_id).await.expect("load").is_none());
        assert_eq!(store.delete_expired().await.expect("sweep"), 1);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.load(live.id()).await.expect("load"), Some(live));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemorySessionStore::new();
        let session = Session::new(SessionId::new(), Duration::hours(1));
        let id = session.id();
        store.save(session).await.expect("save");

        store.delete(id).await.expect("first delete");
        store.delete(id).await.expect("second delete");

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn any_authenticated_reports_signed_in_sessions() {
        let store = MemorySessionStore::new();
        let session = Session::new(SessionId::new(), Duration::hours(1));
        store.save(session.clone()).await.expect("save");
        assert!(!store.any_authenticated().await);

        let signed_in = session.sign_in(
            SessionId::new(),
            IdTokenClaims::new("univ-tenant-123"),
            Duration::hours(1),
        );
        store.save(signed_in).await.expect("save");
        assert!(store.any_authenticated().await);
    }
}
