use std::sync::Arc;
use std::time::Duration;

use facturly_auth::{AuthBackend, AuthError, AuthEventKind, Credentials, SessionPhase, SessionStore, SignUpOutcome};
use facturly_backend::testing::{FakeBackend, signed_in_emails};
use facturly_backend::{BackendClient, BackendError, FileSessionStorage, SessionStorage, spawn_auto_refresh};

const EMAIL: &str = "jane@acme.io";
const PASSWORD: &str = "hunter22";

async fn fake_with_user() -> FakeBackend {
    let fake = FakeBackend::spawn().await;
    fake.add_user(EMAIL, PASSWORD);
    fake
}

#[tokio::test]
async fn sign_in_attaches_bearer_token_to_later_requests() {
    let fake = fake_with_user().await;
    let client = BackendClient::new(fake.config()).unwrap();

    let session = client
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();
    assert_eq!(session.user.email.as_deref(), Some(EMAIL));
    assert_eq!(client.cached_session(), Some(session.clone()));

    let _ = client.count(facturly_backend::Table::Clients).await.unwrap();
    let last = fake.requests().pop().unwrap();
    assert_eq!(last.apikey.as_deref(), Some(FakeBackend::ANON_KEY));
    assert_eq!(
        last.authorization,
        Some(format!("Bearer {}", session.access_token))
    );
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let fake = fake_with_user().await;
    let client = BackendClient::new(fake.config()).unwrap();

    let err = client
        .sign_in(&Credentials::new(EMAIL, "nope"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials);
    assert!(client.cached_session().is_none());

    // The raw client keeps the service's message.
    let raw = client
        .sign_in_with_password(&Credentials::new(EMAIL, "nope"))
        .await
        .unwrap_err();
    assert_eq!(
        raw,
        BackendError::Api {
            status: 400,
            message: "Invalid login credentials".to_string()
        }
    );
}

#[tokio::test]
async fn sign_up_requires_confirmation_unless_autoconfirmed() {
    let fake = FakeBackend::spawn().await;
    let client = BackendClient::new(fake.config()).unwrap();

    let outcome = client
        .sign_up(&Credentials::new("new@acme.io", "secret1"))
        .await
        .unwrap();
    assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired(ref u) if u.email.as_deref() == Some("new@acme.io")));
    assert!(client.cached_session().is_none());

    fake.set_autoconfirm(true);
    let outcome = client
        .sign_up(&Credentials::new("auto@acme.io", "secret1"))
        .await
        .unwrap();
    assert!(matches!(outcome, SignUpOutcome::SignedIn(_)));
    assert!(client.cached_session().is_some());
}

#[tokio::test]
async fn duplicate_sign_up_reports_service_message() {
    let fake = fake_with_user().await;
    let client = BackendClient::new(fake.config()).unwrap();

    let err = client
        .sign_up(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AuthError::Service {
            status: 422,
            message: "User already registered".to_string()
        }
    );
}

#[tokio::test]
async fn sign_out_clears_local_state_even_when_remote_fails() {
    let fake = fake_with_user().await;
    let client = BackendClient::new(fake.config()).unwrap();
    client
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();
    let mut events = client.subscribe();

    fake.set_fail_logout(true);
    let err = client.sign_out().await.unwrap_err();
    assert!(matches!(err, AuthError::Service { status: 500, .. }));
    assert!(client.cached_session().is_none());
    assert_eq!(events.recv().await.unwrap().kind, AuthEventKind::SignedOut);
}

#[tokio::test]
async fn remote_sign_out_revokes_tokens() {
    let fake = fake_with_user().await;
    let client = BackendClient::new(fake.config()).unwrap();
    client
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();
    assert!(signed_in_emails(&fake).contains(EMAIL));

    client.sign_out().await.unwrap();
    assert!(signed_in_emails(&fake).is_empty());
}

#[tokio::test]
async fn persisted_session_survives_a_new_client() {
    let fake = fake_with_user().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let first = BackendClient::new(fake.config().with_session_file(&path)).unwrap();
    let session = first
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();

    let second = BackendClient::new(fake.config().with_session_file(&path)).unwrap();
    assert!(second.cached_session().is_none());
    assert_eq!(second.get_session().await.unwrap(), Some(session));
    // Still valid: no refresh round-trip.
    assert_eq!(fake.request_count("/auth/v1/token"), 1);
}

#[tokio::test]
async fn near_expiry_session_is_refreshed_on_load() {
    let fake = fake_with_user().await;
    fake.set_token_lifetime(10);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let first = BackendClient::new(fake.config().with_session_file(&path)).unwrap();
    let old = first
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();

    let second = BackendClient::new(fake.config().with_session_file(&path)).unwrap();
    let fresh = second.get_session().await.unwrap().unwrap();
    assert_ne!(fresh.access_token, old.access_token);
    assert_eq!(fresh.user.id, old.user.id);
    assert_eq!(fake.request_count("/auth/v1/token"), 2);

    let stored = FileSessionStorage::new(&path).load().unwrap().unwrap();
    assert_eq!(stored.access_token, fresh.access_token);
}

#[tokio::test]
async fn rejected_refresh_token_means_signed_out() {
    let fake = fake_with_user().await;
    fake.set_token_lifetime(10);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let first = BackendClient::new(fake.config().with_session_file(&path)).unwrap();
    first
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();
    fake.revoke_refresh_tokens();

    let second = BackendClient::new(fake.config().with_session_file(&path)).unwrap();
    assert_eq!(second.get_session().await.unwrap(), None);
    assert!(FileSessionStorage::new(&path).load().unwrap().is_none());
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    let fake = FakeBackend::spawn().await;
    let config = fake.config();
    drop(fake);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = BackendClient::new(config).unwrap();
    let err = client
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Network(_)));
}

#[tokio::test]
async fn auto_refresh_renews_before_expiry() {
    let fake = fake_with_user().await;
    // Inside the 60 s refresh margin after one second.
    fake.set_token_lifetime(61);
    let client = Arc::new(BackendClient::new(fake.config()).unwrap());
    let refresher = spawn_auto_refresh(client.clone());

    let mut events = client.subscribe();
    let first = client
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();
    assert_eq!(events.recv().await.unwrap().kind, AuthEventKind::SignedIn);

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no refresh within 5s")
        .unwrap();
    assert_eq!(event.kind, AuthEventKind::TokenRefreshed);
    let renewed = event.session.unwrap();
    assert_ne!(renewed.access_token, first.access_token);
    assert_eq!(client.cached_session(), Some(renewed));

    refresher.abort();
}

#[tokio::test]
async fn failed_auto_refresh_signs_out() {
    let fake = fake_with_user().await;
    fake.set_token_lifetime(61);
    let client = Arc::new(BackendClient::new(fake.config()).unwrap());
    let refresher = spawn_auto_refresh(client.clone());

    let mut events = client.subscribe();
    client
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();
    fake.revoke_refresh_tokens();
    assert_eq!(events.recv().await.unwrap().kind, AuthEventKind::SignedIn);

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no sign-out within 5s")
        .unwrap();
    assert_eq!(event.kind, AuthEventKind::SignedOut);
    assert!(client.cached_session().is_none());

    refresher.abort();
}

#[tokio::test]
async fn session_store_follows_the_real_client() {
    let fake = fake_with_user().await;
    let client = Arc::new(BackendClient::new(fake.config()).unwrap());
    let store = SessionStore::new(client.clone());

    let state = store.init().await;
    assert_eq!(state.phase(), SessionPhase::Unauthenticated);

    let mut rx = store.subscribe();
    store
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();
    let state = rx
        .wait_for(|s| s.is_authenticated())
        .await
        .unwrap()
        .clone();
    assert_eq!(state.user().and_then(|u| u.email.as_deref()), Some(EMAIL));

    store.sign_out().await.unwrap();
    rx.wait_for(|s| s.phase() == SessionPhase::Unauthenticated)
        .await
        .unwrap();
}

#[tokio::test]
async fn restored_session_is_auto_refreshed() {
    let fake = fake_with_user().await;
    fake.set_token_lifetime(61);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let first = BackendClient::new(fake.config().with_session_file(&path)).unwrap();
    let stored = first
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();
    drop(first);

    let client = Arc::new(BackendClient::new(fake.config().with_session_file(&path)).unwrap());
    let refresher = spawn_auto_refresh(client.clone());
    let mut events = client.subscribe();

    assert_eq!(client.get_session().await.unwrap(), Some(stored.clone()));
    assert_eq!(events.recv().await.unwrap().kind, AuthEventKind::SignedIn);

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("restored session was not refreshed within 5s")
        .unwrap();
    assert_eq!(event.kind, AuthEventKind::TokenRefreshed);
    assert_ne!(event.session.unwrap().access_token, stored.access_token);
    assert_eq!(fake.request_count("/auth/v1/token"), 2);

    refresher.abort();
}

#[tokio::test]
async fn session_already_in_memory_is_not_announced_again() {
    let fake = fake_with_user().await;
    let client = BackendClient::new(fake.config()).unwrap();
    client
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();

    let mut events = client.subscribe();
    assert!(client.get_session().await.unwrap().is_some());
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}
