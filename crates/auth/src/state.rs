use crate::session::{Session, User};

/// Lifecycle phase of the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// `init()` has not been called yet.
    Uninitialized,
    /// Waiting for the first session result.
    Loading,
    Authenticated,
    Unauthenticated,
}

/// Snapshot of the session as seen by readers.
///
/// # Invariants
/// - `loading` is true only before the first session result.
/// - Once resolved, `user` and `session` are both present or both absent.
///
/// Both hold by construction: the only ways to build a state are
/// [`SessionState::loading`] and [`SessionState::resolved`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    user: Option<User>,
    session: Option<Session>,
    loading: bool,
}

impl SessionState {
    pub fn loading() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
        }
    }

    pub fn resolved(session: Option<Session>) -> Self {
        Self {
            user: session.as_ref().map(|s| s.user.clone()),
            session,
            loading: false,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_authenticated(&self) -> bool {
        !self.loading && self.user.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.loading {
            SessionPhase::Loading
        } else if self.user.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::loading()
    }
}
