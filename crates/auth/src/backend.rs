//! Boundary to the hosted auth service.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::session::{AuthEvent, Credentials, Session, SignUpOutcome};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("auth service is not configured")]
    NotConfigured,

    #[error("network error: {0}")]
    Network(String),

    #[error("auth service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("session storage error: {0}")]
    Storage(String),
}

/// Capabilities the front-end needs from the auth service.
///
/// Implementations emit an [`AuthEvent`] on every state change they cause
/// (sign-in, sign-out, token refresh), in the order the changes happen.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session, if any (may refresh an expired token).
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Subscribe to auth state changes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}
