//! Domain error model.

use thiserror::Error;

/// Domain-level error.
///
/// Deterministic failures only. Form validation reports through
/// [`FieldErrors`](crate::FieldErrors); network and storage concerns belong
/// to the backend crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (e.g. empty or parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
