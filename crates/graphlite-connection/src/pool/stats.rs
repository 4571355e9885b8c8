//! Pool statistics types

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Number of completed acquisitions the latency average is computed over
const ACQUIRE_LATENCY_WINDOW: usize = 100;

/// Snapshot of a connection pool's counters and gauges
///
/// Counters are monotonic over the pool's lifetime; gauges reflect the
/// registry at the moment the snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Connections created since the pool was constructed
    total_created: u64,
    /// Connections destroyed since the pool was constructed
    total_destroyed: u64,
    /// Successful acquisitions
    total_acquired: u64,
    /// Releases accepted back into the pool
    total_released: u64,
    /// Validation, creation, and close failures absorbed by the pool
    errors: u64,
    /// Total number of registered connections
    total_connections: usize,
    /// Connections available for hand-out
    available_connections: usize,
    /// Connections currently held by callers
    busy_connections: usize,
    /// Callers waiting in the acquire queue
    pending_acquires: usize,
    /// Mean acquire latency in milliseconds over the most recent
    /// completed acquisitions
    average_acquire_time_ms: f64,
}

impl PoolStats {
    /// Get the number of connections created over the pool's lifetime
    pub fn total_created(&self) -> u64 {
        self.total_created
    }

    /// Get the number of connections destroyed over the pool's lifetime
    pub fn total_destroyed(&self) -> u64 {
        self.total_destroyed
    }

    /// Get the number of successful acquisitions
    pub fn total_acquired(&self) -> u64 {
        self.total_acquired
    }

    /// Get the number of accepted releases
    pub fn total_released(&self) -> u64 {
        self.total_released
    }

    /// Get the number of internally absorbed errors
    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Get the total number of registered connections
    pub fn total_connections(&self) -> usize {
        self.total_connections
    }

    /// Get the number of available connections
    pub fn available_connections(&self) -> usize {
        self.available_connections
    }

    /// Get the number of connections currently in use
    pub fn busy_connections(&self) -> usize {
        self.busy_connections
    }

    /// Get the number of callers waiting for a connection
    pub fn pending_acquires(&self) -> usize {
        self.pending_acquires
    }

    /// Get the mean acquire latency in milliseconds
    pub fn average_acquire_time_ms(&self) -> f64 {
        self.average_acquire_time_ms
    }

    /// Calculate pool utilization as a fraction (0.0 to 1.0)
    ///
    /// Returns 0.0 for an empty pool to avoid division by zero.
    pub fn utilization(&self) -> f64 {
        if self.total_connections == 0 {
            0.0
        } else {
            self.busy_connections as f64 / self.total_connections as f64
        }
    }

    /// Check if every registered connection is in use
    pub fn is_full(&self) -> bool {
        self.available_connections == 0 && self.total_connections > 0
    }
}

/// Live counters behind the pool's `stats()` snapshot
///
/// Counter updates never fail and never block on the registry lock; only
/// the latency ring takes a short mutex.
pub(crate) struct StatsRecorder {
    total_created: AtomicU64,
    total_destroyed: AtomicU64,
    total_acquired: AtomicU64,
    total_released: AtomicU64,
    errors: AtomicU64,
    acquire_times: Mutex<VecDeque<Duration>>,
}

impl StatsRecorder {
    pub(crate) fn new() -> Self {
        Self {
            total_created: AtomicU64::new(0),
            total_destroyed: AtomicU64::new(0),
            total_acquired: AtomicU64::new(0),
            total_released: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            acquire_times: Mutex::new(VecDeque::with_capacity(ACQUIRE_LATENCY_WINDOW)),
        }
    }

    pub(crate) fn record_created(&self) {
        self.total_created.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_destroyed(&self) {
        self.total_destroyed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_released(&self) {
        self.total_released.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a completed acquisition and its latency
    pub(crate) fn record_acquire(&self, latency: Duration) {
        self.total_acquired.fetch_add(1, Ordering::SeqCst);
        let mut times = self.acquire_times.lock();
        if times.len() == ACQUIRE_LATENCY_WINDOW {
            times.pop_front();
        }
        times.push_back(latency);
    }

    /// Build a snapshot from the counters plus registry gauges
    pub(crate) fn snapshot(
        &self,
        total_connections: usize,
        available_connections: usize,
        pending_acquires: usize,
    ) -> PoolStats {
        let average_acquire_time_ms = {
            let times = self.acquire_times.lock();
            if times.is_empty() {
                0.0
            } else {
                let sum: Duration = times.iter().sum();
                sum.as_secs_f64() * 1_000.0 / times.len() as f64
            }
        };

        PoolStats {
            total_created: self.total_created.load(Ordering::SeqCst),
            total_destroyed: self.total_destroyed.load(Ordering::SeqCst),
            total_acquired: self.total_acquired.load(Ordering::SeqCst),
            total_released: self.total_released.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
            total_connections,
            available_connections,
            busy_connections: total_connections.saturating_sub(available_connections),
            pending_acquires,
            average_acquire_time_ms,
        }
    }
}
