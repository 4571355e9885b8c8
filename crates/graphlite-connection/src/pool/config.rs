//! Pool configuration types

use std::time::Duration;

use graphlite_core::{GraphliteError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a connection pool
///
/// Controls pool sizing, timeouts, validation, and idle reclamation.
/// Validation of the configuration itself happens when the pool is
/// constructed, not when the builder methods run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Minimum number of connections to keep in the pool
    min_connections: usize,
    /// Maximum number of connections allowed in the pool
    max_connections: usize,
    /// Timeout in milliseconds when acquiring a connection from the pool
    acquire_timeout_ms: u64,
    /// Idle age in milliseconds after which an available connection is reclaimed
    idle_timeout_ms: u64,
    /// Interval in milliseconds between idle reclamation sweeps
    reclaim_interval_ms: u64,
    /// Ping reused connections before handing them out
    validate_connections: bool,
    /// Retry attempts for connection operations.
    /// Accepted for compatibility with host configuration; the acquisition
    /// path does not implement a retry policy.
    retry_attempts: u32,
    /// Delay in milliseconds between retry attempts. See `retry_attempts`.
    retry_delay_ms: u64,
}

impl PoolConfig {
    /// Create a new pool configuration with the given min and max sizes
    pub fn new(min_connections: usize, max_connections: usize) -> Self {
        Self {
            min_connections,
            max_connections,
            acquire_timeout_ms: 30_000,
            idle_timeout_ms: 300_000,
            reclaim_interval_ms: 30_000,
            validate_connections: true,
            retry_attempts: 3,
            retry_delay_ms: 1_000,
        }
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Set the idle timeout in milliseconds
    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    /// Set the interval between idle reclamation sweeps
    pub fn with_reclaim_interval_ms(mut self, interval_ms: u64) -> Self {
        self.reclaim_interval_ms = interval_ms;
        self
    }

    /// Enable or disable validation of reused connections
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_connections = validate;
        self
    }

    /// Set retry attempts and delay. See `retry_attempts`.
    pub fn with_retry(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay_ms = delay_ms;
        self
    }

    /// Check that the configuration is internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(GraphliteError::Configuration(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(GraphliteError::Configuration(format!(
                "min_connections ({}) cannot exceed max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(GraphliteError::Configuration(
                "acquire_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.idle_timeout_ms == 0 {
            return Err(GraphliteError::Configuration(
                "idle_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.reclaim_interval_ms == 0 {
            return Err(GraphliteError::Configuration(
                "reclaim_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Get the minimum pool size
    pub fn min_connections(&self) -> usize {
        self.min_connections
    }

    /// Get the maximum pool size
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Get the idle timeout as a Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Get the reclamation sweep interval as a Duration
    pub fn reclaim_interval(&self) -> Duration {
        Duration::from_millis(self.reclaim_interval_ms)
    }

    /// Whether reused connections are validated before hand-out
    pub fn validate_connections(&self) -> bool {
        self.validate_connections
    }

    /// Get the configured retry attempts. See `retry_attempts`.
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// Get the configured retry delay. See `retry_attempts`.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - min_connections: 2
    /// - max_connections: 10
    /// - acquire_timeout: 30 seconds
    /// - idle_timeout: 5 minutes
    /// - reclaim_interval: 30 seconds
    /// - validate_connections: true
    fn default() -> Self {
        Self::new(2, 10)
    }
}
