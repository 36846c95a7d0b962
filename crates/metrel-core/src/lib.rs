//! metrel-core — shared library for the metrel agent and server.
//!
//! Provides:
//! - `metric` — gauge/counter model, validation, and wire format
//! - `store` — concurrent in-memory metric store and snapshot persistence
//! - `collector` — process and system metrics collection from `/proc`

pub mod collector;
pub mod metric;
pub mod store;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
