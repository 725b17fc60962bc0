//! Signed-in session state and the token source used by the clients.
//!
//! The realtime client reads the token through [`TokenProvider`] once per
//! connection attempt; the REST client reads it once per request.

use crate::model::{LoginResponse, User};
use std::sync::RwLock;
use tracing::info;

/// Source of the bearer token for outgoing requests
pub trait TokenProvider: Send + Sync {
    /// Current token, or `None` when signed out
    fn token(&self) -> Option<String>;
}

/// Fixed token, useful for tools and tests
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// In-memory session holding the token and the signed-in user
#[derive(Default)]
pub struct SessionStore {
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Store the result of a successful login
    pub fn sign_in(&self, login: LoginResponse) {
        info!(user_id = %login.user.id, "Session started");
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Some(Session {
            token: login.token,
            user: login.user,
        });
    }

    /// Drop the token and user. Returns false if nobody was signed in.
    pub fn sign_out(&self) -> bool {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let was_signed_in = current.take().is_some();
        if was_signed_in {
            info!("Session ended");
        }
        was_signed_in
    }

    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.user.clone())
    }

    /// Replace the stored user after a profile or status change.
    ///
    /// No-op when signed out.
    pub fn update_user(&self, user: User) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = current.as_mut() {
            session.user = user;
        }
    }
}

impl TokenProvider for SessionStore {
    fn token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.token.clone())
    }
}
