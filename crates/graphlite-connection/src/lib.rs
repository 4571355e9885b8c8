//! Graphlite Connection - Connection lifecycle and pooling
//!
//! This crate manages physical connections to the embedded graph store:
//! a bounded pool with FIFO fairness for waiting callers, acquire
//! timeouts, optional validation of reused handles, and periodic
//! reclamation of idle connections.

pub mod pool;

pub use pool::{ConnectionFactory, ConnectionPool, PoolConfig, PoolStats};
