//! Clients module (customer directory).
//!
//! This crate contains the client form schema and the persisted row shape,
//! implemented purely as deterministic logic (no IO, no HTTP, no storage).

pub mod client;

pub use client::{ClientInput, ClientRecord, NewClient};
