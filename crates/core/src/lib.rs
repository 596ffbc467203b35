//! `facturly-core`: shared building blocks for the ERP front-end.
//!
//! This crate contains **pure** primitives (no IO, no async): identifiers,
//! the field-error set produced by form validation, and the small checks the
//! per-resource schemas are assembled from.

pub mod error;
pub mod id;
pub mod validation;

pub use error::DomainError;
pub use id::{ClientId, InvoiceId, ProductId, UserId};
pub use validation::{FieldErrors, Validate};
