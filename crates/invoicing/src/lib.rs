//! Invoicing module ("factures").
//!
//! This crate contains the invoice form schema, the status lifecycle and the
//! persisted row shape (no IO, no HTTP, no storage).

pub mod invoice;

pub use invoice::{ClientSummary, InvoiceInput, InvoiceRecord, InvoiceStatus, NewInvoice};
