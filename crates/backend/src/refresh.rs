//! Background token refresh.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::client::BackendClient;

/// How long before expiry the token is renewed.
pub const REFRESH_MARGIN: Duration = Duration::seconds(60);

/// Keep the session fresh until the returned task is aborted.
///
/// Sleeps until [`REFRESH_MARGIN`] before expiry, then refreshes once. A
/// failed refresh is not retried: the session is dropped and `SignedOut`
/// emitted. Any auth event (sign-in, sign-out, refresh) re-arms the timer.
pub fn spawn_auto_refresh(client: Arc<BackendClient>) -> JoinHandle<()> {
    let mut events = client.event_sender().subscribe();

    tokio::spawn(async move {
        loop {
            let Some(expires_at) = client.session_expiry() else {
                match events.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            };

            let wait = (expires_at - REFRESH_MARGIN - Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = client.refresh_session().await {
                        tracing::warn!(error = %e, "automatic token refresh failed; signing out");
                        client.expire_session();
                    }
                }
                event = events.recv() => {
                    if let Err(RecvError::Closed) = event {
                        break;
                    }
                }
            }
        }
        tracing::debug!("auto-refresh stopped");
    })
}
