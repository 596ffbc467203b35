//! Products module (catalog).
//!
//! Product form schema and persisted row shape, as deterministic logic only.

pub mod product;

pub use product::{NewProduct, ProductInput, ProductRecord};
