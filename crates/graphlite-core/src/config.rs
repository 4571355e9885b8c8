//! Store configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for the backing graph store
///
/// Opaque to the connection pool, which passes it verbatim to the
/// connection factory. The factory decides which fields matter for the
/// store it opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file path, or `:memory:` for an in-memory store
    pub path: String,
    /// Open the store read-only
    pub read_only: bool,
    /// Additional driver parameters
    pub params: HashMap<String, String>,
}

impl StoreConfig {
    /// Create a configuration for a store at the given path
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            read_only: false,
            params: HashMap::new(),
        }
    }

    /// Create a configuration for an in-memory store
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    /// Mark the store as read-only
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Set an additional driver parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}
