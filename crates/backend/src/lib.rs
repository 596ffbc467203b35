//! `facturly-backend`
//!
//! **Responsibility:** the single network client to the hosted backend
//! (auth service + REST tables).
//!
//! This crate provides:
//! - configuration from the environment (URL + public API key),
//! - [`BackendClient`]: auth calls, auth-event broadcast, table queries,
//! - [`ClientAccessor`]: construct-on-first-use shared handle,
//! - session persistence and background token refresh.
//!
//! Failed requests are returned to the caller once and never retried.

pub mod accessor;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod refresh;
pub mod storage;
pub mod tables;

#[cfg(feature = "test-util")]
pub mod testing;

pub use accessor::ClientAccessor;
pub use client::BackendClient;
pub use config::{BackendConfig, ConfigError};
pub use error::BackendError;
pub use refresh::spawn_auto_refresh;
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage};
pub use tables::Table;
