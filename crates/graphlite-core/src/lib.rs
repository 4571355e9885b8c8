//! Graphlite Core - Core abstractions for the graphlite toolkit
//!
//! This crate provides the fundamental traits and types that the other
//! graphlite crates depend on. It defines:
//!
//! - `Connection` - Trait for handles to the embedded graph store
//! - `StoreConfig` - Opaque store configuration passed to connection factories
//! - `GraphliteError` / `Result` - Common error handling
//! - `Row` - The JSON row type returned by queries

mod config;
mod connection;
mod error;
mod types;

pub use config::StoreConfig;
pub use connection::{Connection, RunResult};
pub use error::{GraphliteError, Result};
pub use types::Row;
