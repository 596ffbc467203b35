//! Construct-on-first-use access to the shared [`BackendClient`].

use std::sync::{Arc, OnceLock};

use crate::client::BackendClient;
use crate::config::BackendConfig;

/// Hands out one shared client for its whole lifetime.
///
/// Built once at bootstrap and passed to whoever needs the network; the
/// client itself is constructed lazily on the first [`get`](Self::get), and
/// concurrent first calls still construct exactly one.
#[derive(Debug)]
pub struct ClientAccessor {
    config: Option<BackendConfig>,
    client: OnceLock<Arc<BackendClient>>,
}

impl ClientAccessor {
    /// `None` yields an unconfigured client that fails every call.
    pub fn new(config: Option<BackendConfig>) -> Self {
        Self {
            config,
            client: OnceLock::new(),
        }
    }

    /// Wrap an already-built client.
    pub fn from_client(client: Arc<BackendClient>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(client);
        Self {
            config: None,
            client: cell,
        }
    }

    pub fn get(&self) -> Arc<BackendClient> {
        Arc::clone(self.client.get_or_init(|| build(self.config.as_ref())))
    }

    pub fn is_constructed(&self) -> bool {
        self.client.get().is_some()
    }
}

fn build(config: Option<&BackendConfig>) -> Arc<BackendClient> {
    let Some(config) = config else {
        tracing::warn!("backend settings missing; network client disabled");
        return Arc::new(BackendClient::unconfigured());
    };

    match BackendClient::new(config.clone()) {
        Ok(client) => {
            tracing::info!(url = %config.url, persisted = config.session_file.is_some(), "backend client constructed");
            Arc::new(client)
        }
        Err(e) => {
            tracing::warn!(error = %e, "backend client construction failed; network client disabled");
            Arc::new(BackendClient::unconfigured())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackendConfig {
        BackendConfig::new("http://127.0.0.1:54321", "anon").unwrap()
    }

    #[test]
    fn construction_is_lazy() {
        let accessor = ClientAccessor::new(Some(config()));
        assert!(!accessor.is_constructed());
        let _ = accessor.get();
        assert!(accessor.is_constructed());
    }

    #[test]
    fn sequential_calls_share_one_handle() {
        let accessor = ClientAccessor::new(Some(config()));
        let a = accessor.get();
        let b = accessor.get();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_configured());
    }

    #[test]
    fn concurrent_first_access_constructs_once() {
        let accessor = ClientAccessor::new(Some(config()));
        let handles: Vec<Arc<BackendClient>> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8).map(|_| scope.spawn(|| accessor.get())).collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let first = &handles[0];
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, first)));
        assert!(Arc::ptr_eq(first, &accessor.get()));
    }

    #[test]
    fn missing_config_degrades_to_unconfigured_client() {
        let accessor = ClientAccessor::new(None);
        let client = accessor.get();
        assert!(!client.is_configured());
        assert!(Arc::ptr_eq(&client, &accessor.get()));
    }

    #[test]
    fn wrapping_an_existing_client() {
        let client = Arc::new(BackendClient::unconfigured());
        let accessor = ClientAccessor::from_client(client.clone());
        assert!(accessor.is_constructed());
        assert!(Arc::ptr_eq(&client, &accessor.get()));
    }
}
