use thiserror::Error;

use facturly_auth::AuthError;
use facturly_backend::BackendError;
use facturly_core::FieldErrors;

/// Failure of a data-service call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    /// The submission was rejected before any request was made.
    #[error("invalid input: {0}")]
    Validation(FieldErrors),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ServiceError {
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ServiceError::Validation(errors) => Some(errors),
            ServiceError::Backend(_) => None,
        }
    }
}

impl From<FieldErrors> for ServiceError {
    fn from(errors: FieldErrors) -> Self {
        ServiceError::Validation(errors)
    }
}

/// Failure of a login, signup or logout attempt.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthFlowError {
    #[error("invalid input: {0}")]
    Validation(FieldErrors),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<FieldErrors> for AuthFlowError {
    fn from(errors: FieldErrors) -> Self {
        AuthFlowError::Validation(errors)
    }
}
