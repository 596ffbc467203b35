use thiserror::Error;

use facturly_auth::AuthError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend is not configured (set SUPABASE_URL and SUPABASE_ANON_KEY)")]
    NotConfigured,

    #[error("no active session")]
    NotAuthenticated,

    #[error("network error: {0}")]
    Network(String),

    #[error("backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("session storage error: {0}")]
    Storage(String),
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

impl From<BackendError> for AuthError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotConfigured => AuthError::NotConfigured,
            BackendError::Network(msg) => AuthError::Network(msg),
            BackendError::Api { status, message } => AuthError::Service { status, message },
            BackendError::Storage(msg) => AuthError::Storage(msg),
            BackendError::NotAuthenticated => AuthError::Service {
                status: 401,
                message: "no active session".to_string(),
            },
            BackendError::Decode(msg) => AuthError::Service {
                status: 502,
                message: msg,
            },
        }
    }
}
