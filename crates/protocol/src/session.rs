//! Bearer-token session state.
//!
//! A call reads the token once, when its headers are built, via
//! [`AuthSession::current`]. A login completing while another call is in
//! flight affects only calls dispatched afterwards.

use std::sync::{PoisonError, RwLock};

use crate::BearerToken;

/// Holds zero or one bearer token for a client instance.
#[derive(Debug, Default)]
pub struct AuthSession {
    token: RwLock<Option<BearerToken>>,
}

impl AuthSession {
    /// Anonymous session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that starts out holding `token` (e.g. a pre-issued API token).
    pub fn with_token(token: BearerToken) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }

    /// Snapshot of the current token.
    pub fn current(&self) -> Option<BearerToken> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces any previous token. Only login operations call this.
    pub fn set_from_login(&self, token: BearerToken) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
