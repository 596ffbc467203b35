//! Process-wide session store.
//!
//! One writer task owns all mutations: it consumes the backend's auth-event
//! stream and the initial session fetch, and publishes whole-state
//! replacements on a `watch` channel. Any number of readers observe it.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::backend::{AuthBackend, AuthError};
use crate::session::{AuthEvent, Credentials, Session, SignUpOutcome};
use crate::state::{SessionPhase, SessionState};

pub struct SessionStore {
    backend: Arc<dyn AuthBackend>,
    state: Arc<watch::Sender<SessionState>>,
    started: AtomicBool,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        let (tx, _rx) = watch::channel(SessionState::loading());
        Self {
            backend,
            state: Arc::new(tx),
            started: AtomicBool::new(false),
            writer: Mutex::new(None),
        }
    }

    /// Start tracking the session and wait for the first result.
    ///
    /// Only the first call subscribes and fetches; later calls just wait for
    /// (or return) the resolved state. Resolves even when the initial fetch
    /// fails, in which case the state is unauthenticated.
    pub async fn init(&self) -> SessionState {
        if !self.started.swap(true, Ordering::SeqCst) {
            // Subscribe before fetching so no event between the two is lost.
            let events = self.backend.subscribe();
            let handle = tokio::spawn(run_writer(
                Arc::clone(&self.backend),
                events,
                Arc::clone(&self.state),
            ));
            match self.writer.lock() {
                Ok(mut slot) => *slot = Some(handle),
                Err(_) => tracing::error!("session writer slot poisoned"),
            }
            tracing::debug!("session store initialized");
        }

        let mut rx = self.state.subscribe();
        match rx.wait_for(|s| !s.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.current(),
        }
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Reactive view of the state; `changed()` fires on every replacement.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.started.load(Ordering::SeqCst) {
            return SessionPhase::Uninitialized;
        }
        self.state.borrow().phase()
    }

    /// The resulting state change arrives through the event stream.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.backend.sign_in(credentials).await
    }

    pub async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, AuthError> {
        self.backend.sign_up(credentials).await
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.backend.sign_out().await
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.writer.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

async fn run_writer(
    backend: Arc<dyn AuthBackend>,
    mut events: broadcast::Receiver<AuthEvent>,
    state: Arc<watch::Sender<SessionState>>,
) {
    let mut initial = backend.get_session();
    let mut initial_pending = true;
    let mut events_open = true;

    while initial_pending || events_open {
        tokio::select! {
            result = &mut initial, if initial_pending => {
                initial_pending = false;
                let session = match result {
                    Ok(session) => session,
                    Err(e) => {
                        tracing::warn!(error = %e, "initial session fetch failed; treating as signed out");
                        None
                    }
                };
                // An event that resolved the state first is more recent.
                let applied = state.send_if_modified(|current| {
                    if current.is_loading() {
                        *current = SessionState::resolved(session);
                        true
                    } else {
                        false
                    }
                });
                if applied {
                    tracing::info!(authenticated = state.borrow().is_authenticated(), "initial session resolved");
                } else {
                    tracing::debug!("initial session result superseded by auth event");
                }
            }
            event = events.recv(), if events_open => match event {
                Ok(event) => {
                    tracing::info!(kind = ?event.kind, "auth state changed");
                    state.send_replace(SessionState::resolved(event.session));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session store lagged behind auth events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("auth event stream closed");
                    events_open = false;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use tokio::sync::Notify;

    use facturly_core::UserId;

    use crate::session::{AuthEventKind, User};

    struct FakeBackend {
        events: broadcast::Sender<AuthEvent>,
        initial: Mutex<Option<Result<Option<Session>, AuthError>>>,
        gate: Option<Arc<Notify>>,
        fetches: AtomicUsize,
    }

    impl FakeBackend {
        fn new(initial: Result<Option<Session>, AuthError>) -> Self {
            Self::with_capacity(initial, 16)
        }

        fn with_capacity(initial: Result<Option<Session>, AuthError>, capacity: usize) -> Self {
            let (events, _) = broadcast::channel(capacity);
            Self {
                events,
                initial: Mutex::new(Some(initial)),
                gate: None,
                fetches: AtomicUsize::new(0),
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    #[async_trait]
    impl AuthBackend for FakeBackend {
        async fn get_session(&self) -> Result<Option<Session>, AuthError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.initial.lock().unwrap().take().unwrap_or(Ok(None))
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }

        async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
            let s = session(&credentials.email);
            let _ = self.events.send(AuthEvent::signed_in(s.clone()));
            Ok(s)
        }

        async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, AuthError> {
            Ok(SignUpOutcome::ConfirmationRequired(session(&credentials.email).user))
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            let _ = self.events.send(AuthEvent::signed_out());
            Ok(())
        }
    }

    fn session(email: &str) -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: "bearer".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            user: User {
                id: UserId::new(),
                email: Some(email.to_string()),
                created_at: None,
            },
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn phase_is_uninitialized_before_init() {
        let store = SessionStore::new(Arc::new(FakeBackend::new(Ok(None))));
        assert_eq!(store.phase(), SessionPhase::Uninitialized);
        assert!(store.current().is_loading());
    }

    #[tokio::test]
    async fn init_without_session_resolves_unauthenticated() {
        let store = SessionStore::new(Arc::new(FakeBackend::new(Ok(None))));
        let state = store.init().await;

        assert!(!state.is_loading());
        assert!(state.user().is_none());
        assert!(state.session().is_none());
        assert_eq!(store.phase(), SessionPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn init_failure_still_resolves_loading() {
        let backend = FakeBackend::new(Err(AuthError::Network("connection refused".into())));
        let store = SessionStore::new(Arc::new(backend));
        let state = store.init().await;

        assert!(!state.is_loading());
        assert!(state.user().is_none() && state.session().is_none());
    }

    #[tokio::test]
    async fn init_with_existing_session_is_authenticated() {
        let existing = session("jane@acme.io");
        let store = SessionStore::new(Arc::new(FakeBackend::new(Ok(Some(existing.clone())))));
        let state = store.init().await;

        assert_eq!(state.session(), Some(&existing));
        assert_eq!(state.user(), Some(&existing.user));
        assert_eq!(store.phase(), SessionPhase::Authenticated);
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let backend = Arc::new(FakeBackend::new(Ok(None)));
        let store = SessionStore::new(backend.clone());

        let first = store.init().await;
        let second = store.init().await;

        assert_eq!(first, second);
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(backend.events.receiver_count(), 1);
    }

    #[tokio::test]
    async fn events_replace_state_in_order() {
        let backend = Arc::new(FakeBackend::new(Ok(None)));
        let store = SessionStore::new(backend.clone());
        store.init().await;
        let mut rx = store.subscribe();

        let signed_in = store.sign_in(&Credentials::new("jane@acme.io", "secret1")).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().session(), Some(&signed_in));

        let refreshed = Session {
            access_token: "access-2".to_string(),
            ..signed_in.clone()
        };
        backend.events.send(AuthEvent::token_refreshed(refreshed.clone())).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().session(), Some(&refreshed));

        store.sign_out().await.unwrap();
        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(!state.is_loading());
        assert!(state.user().is_none());
        assert!(state.session().is_none());
    }

    #[tokio::test]
    async fn event_before_initial_fetch_wins() {
        let gate = Arc::new(Notify::new());
        let stale = session("stale@acme.io");
        let backend = Arc::new(FakeBackend::new(Ok(Some(stale))).gated(gate.clone()));
        let store = Arc::new(SessionStore::new(backend.clone()));

        let init = tokio::spawn({
            let store = store.clone();
            async move { store.init().await }
        });
        while backend.events.receiver_count() == 0 {
            tokio::task::yield_now().await;
        }

        let fresh = session("fresh@acme.io");
        backend.events.send(AuthEvent::signed_in(fresh.clone())).unwrap();
        let resolved = init.await.unwrap();
        assert_eq!(resolved.session(), Some(&fresh));

        gate.notify_one();
        settle().await;
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(store.current().session(), Some(&fresh));
    }

    #[tokio::test]
    async fn lagging_keeps_the_latest_event() {
        let backend = Arc::new(FakeBackend::with_capacity(Ok(None), 2));
        let store = SessionStore::new(backend.clone());
        store.init().await;

        let mut last = None;
        for i in 0..5 {
            let s = session(&format!("user{i}@acme.io"));
            backend.events.send(AuthEvent::signed_in(s.clone())).unwrap();
            last = Some(s);
        }
        settle().await;

        assert_eq!(store.current().session(), last.as_ref());
    }

    #[tokio::test]
    async fn readers_see_whole_replacements() {
        let backend = Arc::new(FakeBackend::new(Ok(None)));
        let store = SessionStore::new(backend.clone());
        store.init().await;
        let mut rx = store.subscribe();

        let s = session("jane@acme.io");
        backend
            .events
            .send(AuthEvent {
                kind: AuthEventKind::UserUpdated,
                session: Some(s.clone()),
            })
            .unwrap();
        rx.changed().await.unwrap();

        let state = rx.borrow().clone();
        assert_eq!(state.user(), Some(&s.user));
        assert_eq!(state.session().map(|x| &x.user), state.user());
    }
}
