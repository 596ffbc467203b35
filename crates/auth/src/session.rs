use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use facturly_core::validation::{is_email, normalize_text};
use facturly_core::{FieldErrors, UserId, Validate};

/// Minimum password length accepted by the auth service.
pub const PASSWORD_MIN: usize = 6;

/// Authenticated identity as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Token material for the signed-in user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the token expires within `margin` of `now` (or already has).
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.expires_at
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// What changed in the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Auth state change notification.
///
/// Every event carries the complete session that is now current, so
/// consumers replace their state instead of merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn signed_in(session: Session) -> Self {
        Self {
            kind: AuthEventKind::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            kind: AuthEventKind::SignedOut,
            session: None,
        }
    }

    pub fn token_refreshed(session: Session) -> Self {
        Self {
            kind: AuthEventKind::TokenRefreshed,
            session: Some(session),
        }
    }
}

/// Email/password pair submitted by the login and signup forms.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Validate for Credentials {
    type Output = Credentials;

    fn validate(&self) -> Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::new();

        let email = normalize_text(Some(&self.email));
        match &email {
            None => errors.add("email", "Email is required"),
            Some(e) if !is_email(e) => errors.add("email", "Invalid email address"),
            Some(_) => {}
        }

        // Passwords are taken verbatim.
        if self.password.is_empty() {
            errors.add("password", "Password is required");
        } else if self.password.chars().count() < PASSWORD_MIN {
            errors.add(
                "password",
                format!("Password must be at least {PASSWORD_MIN} characters"),
            );
        }

        errors.into_result(|| Credentials {
            email: email.unwrap_or_default(),
            password: self.password.clone(),
        })
    }
}

/// Result of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account was created and a session was issued immediately.
    SignedIn(Session),
    /// The account was created but the email address must be confirmed first.
    ConfirmationRequired(User),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: DateTime<Utc>) -> Session {
        Session {
            access_token: "secret-access".to_string(),
            refresh_token: "secret-refresh".to_string(),
            token_type: "bearer".to_string(),
            expires_at,
            user: User {
                id: UserId::new(),
                email: Some("jane@acme.io".to_string()),
                created_at: None,
            },
        }
    }

    #[test]
    fn expiry_window() {
        let now = Utc::now();
        let s = session(now + Duration::seconds(30));
        assert!(!s.is_expired(now));
        assert!(s.is_expired(now + Duration::seconds(30)));
        assert!(s.expires_within(now, Duration::seconds(60)));
        assert!(!s.expires_within(now, Duration::seconds(10)));
    }

    #[test]
    fn debug_output_never_contains_tokens() {
        let s = session(Utc::now());
        let rendered = format!("{s:?}");
        assert!(!rendered.contains("secret"));

        let creds = Credentials::new("jane@acme.io", "hunter22");
        assert!(!format!("{creds:?}").contains("hunter22"));
    }

    #[test]
    fn session_round_trips_through_json() {
        let s = session(Utc::now());
        let json = serde_json::to_string(&s).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn credentials_validation() {
        let ok = Credentials::new(" jane@acme.io ", "hunter22").validate().unwrap();
        assert_eq!(ok.email, "jane@acme.io");

        let errors = Credentials::new("", "").validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Email is required"));
        assert_eq!(errors.get("password"), Some("Password is required"));

        let errors = Credentials::new("jane", "123").validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Invalid email address"));
        assert_eq!(errors.get("password"), Some("Password must be at least 6 characters"));
    }
}
