//! Application shell: configuration, bootstrap, routing and data services.
//!
//! - `config.rs`: settings from the environment (and `.env`)
//! - `context.rs`: the long-lived handles (client accessor, session store)
//! - `routes.rs` / `navigator.rs`: the route table and what to show for a path
//! - `services.rs`: one repository per resource over the shared client
//! - `dashboard.rs`: home-page figures

pub mod config;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod navigator;
pub mod routes;
pub mod services;

pub use config::AppConfig;
pub use context::AppContext;
pub use error::{AuthFlowError, ServiceError};
pub use navigator::{Navigation, Navigator};
pub use routes::Route;
