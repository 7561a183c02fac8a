//! In-memory session token store
//!
//! Holds the access token issued by a successful transaction and answers
//! "is a session currently established" for the rest of the application.
//! In-memory only, never persisted.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use ag_types::AccessToken;

#[derive(Debug, Clone)]
struct SessionInfo {
    access_token: AccessToken,
    /// When the token was adopted (kept for debugging/auditing)
    _acquired_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SessionStore {
    session: RwLock<Option<SessionInfo>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt the access token from a successful transaction
    pub fn set(&self, access_token: AccessToken) {
        *self.session.write() = Some(SessionInfo {
            access_token,
            _acquired_at: Utc::now(),
        });
    }

    /// Drop the session (sign-out)
    pub fn clear(&self) {
        *self.session.write() = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    pub fn access_token(&self) -> Option<AccessToken> {
        self.session.read().as_ref().map(|s| s.access_token.clone())
    }
}
