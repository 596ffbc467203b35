//! Backend connection settings.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

pub const URL_VAR: &str = "SUPABASE_URL";
pub const ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";
pub const SESSION_FILE_VAR: &str = "FACTURLY_SESSION_FILE";
pub const AUTO_REFRESH_VAR: &str = "FACTURLY_AUTO_REFRESH";
pub const TIMEOUT_VAR: &str = "FACTURLY_HTTP_TIMEOUT_SECS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} is not a valid URL ({value:?}): {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} has an invalid value: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Service root, always ending with `/`.
    pub url: Url,
    /// Public (anon) API key sent with every request.
    pub anon_key: String,
    /// Where to persist the session between runs; in-memory when `None`.
    pub session_file: Option<PathBuf>,
    pub auto_refresh: bool,
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(url: &str, anon_key: impl Into<String>) -> Result<Self, ConfigError> {
        let anon_key = anon_key.into();
        if anon_key.trim().is_empty() {
            return Err(ConfigError::Missing(ANON_KEY_VAR));
        }
        Ok(Self {
            url: parse_url(url)?,
            anon_key: anon_key.trim().to_string(),
            session_file: None,
            auto_refresh: true,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup` (environment-shaped key/value source).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());

        let url = get(URL_VAR).ok_or(ConfigError::Missing(URL_VAR))?;
        let anon_key = get(ANON_KEY_VAR).ok_or(ConfigError::Missing(ANON_KEY_VAR))?;
        let mut config = Self::new(&url, anon_key)?;

        config.session_file = get(SESSION_FILE_VAR).map(PathBuf::from);

        if let Some(raw) = get(AUTO_REFRESH_VAR) {
            config.auto_refresh = parse_bool(&raw).ok_or(ConfigError::InvalidValue {
                var: AUTO_REFRESH_VAR,
                value: raw,
            })?;
        }

        if let Some(raw) = get(TIMEOUT_VAR) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: TIMEOUT_VAR,
                value: raw.clone(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

impl core::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"<redacted>")
            .field("session_file", &self.session_file)
            .field("auto_refresh", &self.auto_refresh)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|e| ConfigError::InvalidUrl {
        var: URL_VAR,
        value: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            var: URL_VAR,
            value: raw.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
