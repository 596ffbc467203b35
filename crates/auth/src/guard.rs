//! Route guard: decides whether a protected view may render.

use crate::state::SessionState;

pub const LOGIN_PATH: &str = "/login";
pub const SIGNUP_PATH: &str = "/signup";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still loading; render a placeholder and decide later.
    Placeholder,
    /// No user; go to `to`, remembering where the user wanted to go.
    Redirect { to: &'static str, from: String },
    Allow,
}

/// Pure decision for a protected path.
pub fn guard(state: &SessionState, requested: &str) -> GuardDecision {
    if state.is_loading() {
        return GuardDecision::Placeholder;
    }
    match state.user() {
        None => GuardDecision::Redirect {
            to: LOGIN_PATH,
            from: requested.to_string(),
        },
        Some(_) => GuardDecision::Allow,
    }
}

/// Where to go after a successful login.
///
/// Only local paths are honoured, and never the auth pages themselves.
pub fn post_login_target(from: Option<&str>) -> &str {
    match from {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !is_auth_page(path) =>
        {
            path
        }
        _ => "/",
    }
}

fn is_auth_page(path: &str) -> bool {
    let bare = path.split(['?', '#']).next().unwrap_or(path).trim_end_matches('/');
    bare == LOGIN_PATH || bare == SIGNUP_PATH
}
