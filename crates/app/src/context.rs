use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use facturly_auth::{AuthBackend, Credentials, SessionState, SessionStore, SignUpOutcome, post_login_target};
use facturly_backend::{BackendClient, ClientAccessor, spawn_auto_refresh};
use facturly_core::Validate;

use crate::config::AppConfig;
use crate::dashboard::{self, DashboardSummary};
use crate::error::{AuthFlowError, ServiceError};
use crate::navigator::Navigator;
use crate::services::{ClientService, InvoiceService, ProductService, Repository};

/// Long-lived handles shared by every view: the client accessor and the
/// session store.
///
/// Build one at startup and pass it down; nothing here is global.
pub struct AppContext {
    accessor: Arc<ClientAccessor>,
    sessions: Arc<SessionStore>,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        Self::from_accessor(Arc::new(ClientAccessor::new(config.backend)))
    }

    pub fn from_accessor(accessor: Arc<ClientAccessor>) -> Self {
        let backend: Arc<dyn AuthBackend> = accessor.get();
        Self {
            accessor,
            sessions: Arc::new(SessionStore::new(backend)),
            refresher: Mutex::new(None),
        }
    }

    /// Start session tracking (and background token refresh when enabled),
    /// then wait for the first session result.
    pub async fn start(&self) -> SessionState {
        let client = self.client();
        if client.auto_refresh_enabled() {
            match self.refresher.lock() {
                Ok(mut slot) if slot.is_none() => *slot = Some(spawn_auto_refresh(client)),
                Ok(_) => {}
                Err(_) => tracing::error!("refresh task slot poisoned"),
            }
        }
        let state = self.sessions.init().await;
        tracing::info!(phase = ?state.phase(), "session resolved");
        state
    }

    pub fn client(&self) -> Arc<BackendClient> {
        self.accessor.get()
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn navigator(&self, location: impl Into<String>) -> Navigator {
        Navigator::new(self.sessions.subscribe(), location)
    }

    pub fn clients(&self) -> ClientService {
        Repository::new(Arc::clone(&self.accessor))
    }

    pub fn invoices(&self) -> InvoiceService {
        Repository::new(Arc::clone(&self.accessor))
    }

    pub fn products(&self) -> ProductService {
        Repository::new(Arc::clone(&self.accessor))
    }

    pub async fn dashboard(&self) -> Result<DashboardSummary, ServiceError> {
        Ok(dashboard::summary(&self.client()).await?)
    }

    /// Sign in and return where to go next (`from` if it is a safe local
    /// path, the dashboard otherwise).
    pub async fn login(&self, credentials: &Credentials, from: Option<&str>) -> Result<String, AuthFlowError> {
        let credentials = credentials.validate()?;
        self.sessions.sign_in(&credentials).await?;
        Ok(post_login_target(from).to_string())
    }

    pub async fn signup(&self, credentials: &Credentials) -> Result<SignUpOutcome, AuthFlowError> {
        let credentials = credentials.validate()?;
        Ok(self.sessions.sign_up(&credentials).await?)
    }

    pub async fn logout(&self) -> Result<(), AuthFlowError> {
        Ok(self.sessions.sign_out().await?)
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.refresher.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

impl core::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppContext")
            .field("accessor", &self.accessor)
            .field("phase", &self.sessions.phase())
            .finish()
    }
}
