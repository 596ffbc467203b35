//! Shared network client.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::Deserialize;
use tokio::sync::broadcast;

use facturly_auth::{AuthEvent, Session};

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::storage::{FileSessionStorage, MemorySessionStorage, SessionStorage};

const EVENT_CAPACITY: usize = 32;

#[derive(Debug)]
struct Connection {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
}

/// Handle to the hosted backend.
///
/// Holds the HTTP connection settings (immutable once built), the current
/// session and the auth-event broadcaster. An *unconfigured* client answers
/// every call with [`BackendError::NotConfigured`].
pub struct BackendClient {
    connection: Option<Connection>,
    session: RwLock<Option<Session>>,
    storage: Box<dyn SessionStorage>,
    events: broadcast::Sender<AuthEvent>,
    auto_refresh: bool,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let storage: Box<dyn SessionStorage> = match &config.session_file {
            Some(path) => Box::new(FileSessionStorage::new(path.clone())),
            None => Box::new(MemorySessionStorage::new()),
        };
        Self::with_storage(config, storage)
    }

    pub fn with_storage(
        config: BackendConfig,
        storage: Box<dyn SessionStorage>,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            connection: Some(Connection {
                http,
                base_url: config.url,
                anon_key: config.anon_key,
            }),
            session: RwLock::new(None),
            storage,
            events,
            auto_refresh: config.auto_refresh,
        })
    }

    /// A client that cannot reach anything (missing configuration).
    pub fn unconfigured() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            connection: None,
            session: RwLock::new(None),
            storage: Box::new(MemorySessionStorage::new()),
            events,
            auto_refresh: false,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.connection.is_some()
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        self.auto_refresh && self.is_configured()
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.connection.as_ref().map(|c| &c.base_url)
    }

    /// Session currently held in memory (no IO).
    pub fn cached_session(&self) -> Option<Session> {
        self.session.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn session_expiry(&self) -> Option<DateTime<Utc>> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.expires_at)
    }

    pub(crate) fn event_sender(&self) -> &broadcast::Sender<AuthEvent> {
        &self.events
    }

    pub(crate) fn storage(&self) -> &dyn SessionStorage {
        self.storage.as_ref()
    }

    /// Replace the in-memory session and mirror it to storage.
    ///
    /// Storage failures are logged; the in-memory session stays authoritative.
    pub(crate) fn store_session(&self, session: Option<Session>) {
        let persisted = match &session {
            Some(s) => self.storage.save(s),
            None => self.storage.clear(),
        };
        if let Err(e) = persisted {
            tracing::warn!(error = %e, "failed to persist session");
        }
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = session;
    }

    /// Keep a session loaded from storage in memory without re-persisting it.
    pub(crate) fn adopt_session(&self, session: Session) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn connection(&self) -> Result<&Connection, BackendError> {
        self.connection.as_ref().ok_or(BackendError::NotConfigured)
    }

    /// Build a request to `path` (relative to the service root).
    ///
    /// Every request carries the public key; the bearer token is the user's
    /// access token when signed in, the public key otherwise.
    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, BackendError> {
        let conn = self.connection()?;
        let url = conn
            .base_url
            .join(path)
            .map_err(|e| BackendError::Decode(format!("bad request path {path:?}: {e}")))?;

        let bearer = self
            .cached_session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| conn.anon_key.clone());

        Ok(conn
            .http
            .request(method, url)
            .header("apikey", &conn.anon_key)
            .bearer_auth(bearer))
    }

    /// Send once; non-2xx responses become [`BackendError::Api`].
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        tracing::debug!(status = status.as_u16(), %message, "backend request failed");
        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl core::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url().map(Url::as_str))
            .field("signed_in", &self.cached_session().is_some())
            .field("auto_refresh", &self.auto_refresh)
            .finish()
    }
}

/// Error payloads from the auth service and the REST layer use different
/// keys for the human-readable text.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_most_specific_key() {
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            Some("Invalid login credentials".to_string())
        );
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key value","details":null}"#),
            Some("duplicate key value".to_string())
        );
        assert_eq!(error_message(r#"{"code":422,"msg":"weak password"}"#), Some("weak password".to_string()));
        assert_eq!(error_message("<html>"), None);
    }

    #[test]
    fn unconfigured_client_refuses_requests() {
        let client = BackendClient::unconfigured();
        assert!(!client.is_configured());
        assert!(!client.auto_refresh_enabled());
        assert!(matches!(
            client.request(Method::GET, "rest/v1/clients"),
            Err(BackendError::NotConfigured)
        ));
    }

    #[test]
    fn requests_resolve_against_service_root() {
        let config = BackendConfig::new("https://abc.example.co/base", "anon").unwrap();
        let client = BackendClient::new(config).unwrap();
        let request = client
            .request(Method::GET, "rest/v1/clients")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "https://abc.example.co/base/rest/v1/clients");
        assert_eq!(request.headers()["apikey"], "anon");
        assert_eq!(request.headers()["authorization"], "Bearer anon");
    }
}
