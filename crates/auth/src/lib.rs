//! `facturly-auth`: session state and the authenticated-route gate.
//!
//! The hosted auth service is reached through the [`AuthBackend`] trait; this
//! crate never performs HTTP itself. It owns:
//! - the session model (user + token material),
//! - the [`SessionStore`]: one writer task fed by auth events, many readers,
//! - the pure route [`guard`].

pub mod backend;
pub mod guard;
pub mod session;
pub mod state;
pub mod store;

pub use backend::{AuthBackend, AuthError};
pub use guard::{GuardDecision, LOGIN_PATH, SIGNUP_PATH, guard, post_login_target};
pub use session::{AuthEvent, AuthEventKind, Credentials, Session, SignUpOutcome, User};
pub use state::{SessionPhase, SessionState};
pub use store::SessionStore;
