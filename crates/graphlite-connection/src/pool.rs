//! Connection pooling for graph store connections
//!
//! The pool maintains between `min_connections` and `max_connections`
//! handles to the backing store. Callers that arrive while the pool is at
//! capacity join a FIFO wait queue and are served in request order as
//! connections are released.
//!
//! # Example
//!
//! ```ignore
//! use graphlite_connection::pool::{ConnectionPool, PoolConfig};
//! use graphlite_core::StoreConfig;
//!
//! let config = PoolConfig::new(2, 10)
//!     .with_acquire_timeout_ms(5000)
//!     .with_idle_timeout_ms(300_000);
//!
//! let pool = ConnectionPool::new(StoreConfig::new("graph.db"), config, factory)?;
//! pool.initialize().await?;
//! let conn = pool.acquire().await?;
//! // Use connection...
//! pool.release(&conn).await;
//! ```

mod config;
mod pool;
mod stats;


pub use config::PoolConfig;
pub use pool::{ConnectionFactory, ConnectionPool};
pub use stats::PoolStats;
