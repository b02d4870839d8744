//! Per-browser session records.
//!
//! A session is keyed by an opaque [`SessionId`] delivered in a cookie and
//! holds at most two logical fields:
//! - `flow`: the pending authorization-code flow started by `/login`
//! - `user`: the identity claims resolved by a successful callback
//!
//! Sessions expire after a fixed duration; an expired session is treated as
//! absent by every store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tenant_gate_core::SessionId;

use crate::auth::{FlowState, IdTokenClaims};

/// A server-side session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for this session.
    id: SessionId,
    /// Pending authorization-code flow, consumed by the callback.
    flow: Option<FlowState>,
    /// Identity claims of the signed-in user.
    user: Option<IdTokenClaims>,
    /// When the session was created.
    created_at: DateTime<Utc>,
    /// When the session expires.
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new, empty session valid for the given duration.
    #[must_use]
    pub fn new(id: SessionId, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id,
            flow: None,
            user: None,
            created_at: now,
            expires_at: now + duration,
        }
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the pending flow, if any.
    #[must_use]
    pub fn flow(&self) -> Option<&FlowState> {
        self.flow.as_ref()
    }

    /// Returns the signed-in user's claims, if any.
    #[must_use]
    pub fn user(&self) -> Option<&IdTokenClaims> {
        self.user.as_ref()
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if a user has signed in on this session.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Stores a pending flow, replacing any earlier one.
    pub fn set_flow(&mut self, flow: FlowState) {
        self.flow = Some(flow);
    }

    /// Removes and returns the pending flow.
    pub fn take_flow(&mut self) -> Option<FlowState> {
        self.flow.take()
    }

    /// Moves the signed-in state into a session under a fresh ID.
    ///
    /// The returned session holds `user`, no pending flow, and a new expiry.
    #[must_use]
    pub fn sign_in(self, new_id: SessionId, user: IdTokenClaims, duration: Duration) -> Self {
        let mut session = Self::new(new_id, duration);
        session.created_at = self.created_at;
        session.user = Some(user);
        session
    }

    /// Extends expiration from now.
    pub fn touch(&mut self, duration: Duration) {
        self.expires_at = Utc::now() + duration;
    }
}
