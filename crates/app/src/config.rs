use facturly_backend::BackendConfig;

/// Settings the shell needs at startup.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// `None` when the backend settings are missing or invalid; the app still
    /// starts, but every network call fails with "not configured".
    pub backend: Option<BackendConfig>,
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let backend = match BackendConfig::from_lookup(lookup) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(error = %e, "backend settings unavailable; running without network");
                None
            }
        };
        Self { backend }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn complete_settings_enable_backend() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://abc.example.co"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]));
        let backend = config.backend.unwrap();
        assert_eq!(backend.url.as_str(), "https://abc.example.co/");
    }

    #[test]
    fn missing_key_is_not_fatal() {
        let config = AppConfig::from_lookup(lookup(&[("SUPABASE_URL", "https://abc.example.co")]));
        assert!(config.backend.is_none());
    }

    #[test]
    fn invalid_url_is_not_fatal() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "not a url"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]));
        assert!(config.backend.is_none());
    }
}
