//! What to show for a location, given the session.

use tokio::sync::watch;

use facturly_auth::{GuardDecision, SessionState, guard};

use crate::routes::Route;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    /// Session still loading.
    Placeholder,
    Redirect { to: &'static str, from: String },
    NotFound,
}

impl core::fmt::Display for Navigation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Navigation::Render(route) => write!(f, "render {route}"),
            Navigation::Placeholder => f.write_str("loading"),
            Navigation::Redirect { to, from } => write!(f, "redirect {to} (from {from})"),
            Navigation::NotFound => f.write_str("not found"),
        }
    }
}

/// Resolve `location` against a session snapshot.
///
/// Public routes render without looking at the session; protected ones go
/// through the guard with the full requested location as `from`.
pub fn resolve(state: &SessionState, location: &str) -> Navigation {
    let Some(route) = Route::parse(location) else {
        return Navigation::NotFound;
    };
    if route.is_public() {
        return Navigation::Render(route);
    }
    match guard(state, location) {
        GuardDecision::Allow => Navigation::Render(route),
        GuardDecision::Placeholder => Navigation::Placeholder,
        GuardDecision::Redirect { to, from } => Navigation::Redirect { to, from },
    }
}

/// Current location plus a live view of the session.
#[derive(Debug)]
pub struct Navigator {
    sessions: watch::Receiver<SessionState>,
    location: String,
}

impl Navigator {
    pub fn new(sessions: watch::Receiver<SessionState>, location: impl Into<String>) -> Self {
        Self {
            sessions,
            location: location.into(),
        }
    }

    pub fn current(&self) -> Navigation {
        resolve(&self.sessions.borrow(), &self.location)
    }

    /// Move to `location` and resolve it.
    pub fn navigate(&mut self, location: impl Into<String>) -> Navigation {
        self.location = location.into();
        let outcome = self.current();
        tracing::debug!(location = %self.location, ?outcome, "navigated");
        outcome
    }

    /// Wait for the next session change and re-resolve the current location.
    ///
    /// `None` once the session store is gone.
    pub async fn changed(&mut self) -> Option<Navigation> {
        self.sessions.changed().await.ok()?;
        let outcome = resolve(&self.sessions.borrow_and_update(), &self.location);
        Some(outcome)
    }
}
