//! The authority boundary.
//!
//! An authority is the authenticated identity that owns a remote store.
//! Its lifecycle (login, logout, revocation) belongs to the session layer;
//! a sync configuration only holds a shared reference to it.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Liveness of an authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityState {
    /// Logged in and usable for syncing.
    Active,
    /// Logged out by the user.
    LoggedOut,
    /// Revoked by the server or session layer.
    Revoked,
}

impl AuthorityState {
    fn to_u8(self) -> u8 {
        match self {
            AuthorityState::Active => 0,
            AuthorityState::LoggedOut => 1,
            AuthorityState::Revoked => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => AuthorityState::Active,
            1 => AuthorityState::LoggedOut,
            _ => AuthorityState::Revoked,
        }
    }
}

impl fmt::Display for AuthorityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorityState::Active => f.write_str("active"),
            AuthorityState::LoggedOut => f.write_str("logged out"),
            AuthorityState::Revoked => f.write_str("revoked"),
        }
    }
}

/// An authenticated identity supplied by the session layer.
///
/// Implementations must be cheap to query; the open coordinator polls
/// `state` while it waits for an initial download.
pub trait Authority: Send + Sync {
    /// Identity string substituted for the locator wildcard.
    fn identity(&self) -> &str;

    /// Current liveness.
    fn state(&self) -> AuthorityState;

    /// Returns true if the authority can still be used.
    fn is_valid(&self) -> bool {
        self.state() == AuthorityState::Active
    }
}

/// An authority backed by an in-process session.
#[derive(Debug)]
pub struct SessionAuthority {
    identity: String,
    state: AtomicU8,
}

impl SessionAuthority {
    /// Creates an active authority.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            state: AtomicU8::new(AuthorityState::Active.to_u8()),
        }
    }

    /// Marks the authority as logged out.
    pub fn log_out(&self) {
        self.set_state(AuthorityState::LoggedOut);
    }

    /// Marks the authority as revoked.
    pub fn revoke(&self) {
        self.set_state(AuthorityState::Revoked);
    }

    fn set_state(&self, state: AuthorityState) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }
}

impl Authority for SessionAuthority {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn state(&self) -> AuthorityState {
        AuthorityState::from_u8(self.state.load(Ordering::SeqCst))
    }
}
