//! Auth-service calls and the [`AuthBackend`] implementation.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;

use facturly_auth::{
    AuthBackend, AuthError, AuthEvent, Credentials, Session, SignUpOutcome, User,
};

use crate::client::BackendClient;
use crate::error::BackendError;

/// Sessions this close to expiry are refreshed before being handed out.
pub const EXPIRY_MARGIN: Duration = Duration::seconds(30);

const TOKEN_PATH: &str = "auth/v1/token";
const SIGNUP_PATH: &str = "auth/v1/signup";
const LOGOUT_PATH: &str = "auth/v1/logout";

/// Token grant response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Absolute expiry (unix seconds); preferred over `expires_in` when present.
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Result<Session, BackendError> {
        let expires_at = match self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        {
            Some(at) => at,
            None => {
                let lifetime = self.expires_in.unwrap_or(3600);
                Duration::try_seconds(lifetime)
                    .and_then(|d| Utc::now().checked_add_signed(d))
                    .ok_or_else(|| BackendError::Decode(format!("token lifetime out of range: {lifetime}s")))?
            }
        };
        Ok(Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: self.user,
        })
    }
}

/// Sign-up answers with a session when email confirmation is disabled,
/// otherwise with the bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(User),
}

impl BackendClient {
    pub async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session, BackendError> {
        let request = self
            .request(Method::POST, TOKEN_PATH)?
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": credentials.email, "password": credentials.password }));

        let token: TokenResponse = self.send(request).await?.json().await?;
        let session = token.into_session()?;

        tracing::info!(user_id = %session.user.id, "signed in");
        self.store_session(Some(session.clone()));
        self.emit(AuthEvent::signed_in(session.clone()));
        Ok(session)
    }

    pub async fn sign_up_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<SignUpOutcome, BackendError> {
        let request = self
            .request(Method::POST, SIGNUP_PATH)?
            .json(&json!({ "email": credentials.email, "password": credentials.password }));

        let response: SignUpResponse = self.send(request).await?.json().await?;
        match response {
            SignUpResponse::Session(token) => {
                let session = token.into_session()?;
                tracing::info!(user_id = %session.user.id, "signed up and signed in");
                self.store_session(Some(session.clone()));
                self.emit(AuthEvent::signed_in(session.clone()));
                Ok(SignUpOutcome::SignedIn(session))
            }
            SignUpResponse::User(user) => {
                tracing::info!(user_id = %user.id, "signed up; email confirmation required");
                Ok(SignUpOutcome::ConfirmationRequired(user))
            }
        }
    }

    /// Exchange the refresh token for a new session.
    pub async fn refresh_session(&self) -> Result<Session, BackendError> {
        let current = self.cached_session().ok_or(BackendError::NotAuthenticated)?;
        self.refresh_with(&current.refresh_token).await
    }

    async fn refresh_with(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let request = self
            .request(Method::POST, TOKEN_PATH)?
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));

        let token: TokenResponse = self.send(request).await?.json().await?;
        let session = token.into_session()?;

        tracing::debug!(expires_at = %session.expires_at, "session refreshed");
        self.store_session(Some(session.clone()));
        self.emit(AuthEvent::token_refreshed(session.clone()));
        Ok(session)
    }

    /// Sign out locally and remotely.
    ///
    /// The local session is always cleared and `SignedOut` emitted; a failed
    /// remote logout is still returned to the caller.
    pub async fn sign_out_everywhere(&self) -> Result<(), BackendError> {
        let remote = match self.cached_session() {
            Some(_) => match self.request(Method::POST, LOGOUT_PATH) {
                Ok(request) => self.send(request).await.map(|_| ()),
                Err(e) => Err(e),
            },
            None => Ok(()),
        };

        self.store_session(None);
        self.emit(AuthEvent::signed_out());
        tracing::info!("signed out");

        if let Err(e) = &remote {
            tracing::warn!(error = %e, "remote sign-out failed");
        }
        remote
    }

    /// Drop the session after a failed refresh.
    pub(crate) fn expire_session(&self) {
        self.store_session(None);
        self.emit(AuthEvent::signed_out());
    }

    /// Current session: memory, then storage, refreshed when near expiry.
    ///
    /// A refresh token the service rejects means "signed out", not an error.
    pub async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        if !self.is_configured() {
            return Err(BackendError::NotConfigured);
        }

        let (session, restored) = match self.cached_session() {
            Some(session) => (Some(session), false),
            None => (self.storage().load()?, true),
        };
        let Some(session) = session else {
            return Ok(None);
        };

        if !session.expires_within(Utc::now(), EXPIRY_MARGIN) {
            if restored {
                // Listeners such as auto-refresh only re-arm on events.
                self.adopt_session(session.clone());
                tracing::info!(user_id = %session.user.id, "session restored from storage");
                self.emit(AuthEvent::signed_in(session.clone()));
            }
            return Ok(Some(session));
        }

        match self.refresh_with(&session.refresh_token).await {
            Ok(fresh) => Ok(Some(fresh)),
            Err(BackendError::Api { status, message }) => {
                tracing::info!(status, %message, "stored session could not be refreshed");
                self.store_session(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl AuthBackend for BackendClient {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.current_session().await?)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.event_sender().subscribe()
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.sign_in_with_password(credentials).await.map_err(|e| match e.status() {
            Some(400 | 401) => AuthError::InvalidCredentials,
            _ => e.into(),
        })
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, AuthError> {
        Ok(self.sign_up_with_password(credentials).await?)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Ok(self.sign_out_everywhere().await?)
    }
}
