//! Connection pool implementation

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use graphlite_core::{Connection, GraphliteError, Result, StoreConfig};

use super::config::PoolConfig;
use super::stats::{PoolStats, StatsRecorder};

/// Factory trait for opening physical connections to the store
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Open a new connection to the store described by `config`
    async fn open(&self, config: &StoreConfig) -> Result<Arc<dyn Connection>>;
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn open(&self, config: &StoreConfig) -> Result<Arc<dyn Connection>> {
        (**self).open(config).await
    }
}

/// Internal wrapper for pooled connections with lifecycle metadata
///
/// Owned exclusively by the registry; callers only ever hold the raw
/// `Arc<dyn Connection>` handle.
struct PooledConnection {
    id: Uuid,
    connection: Arc<dyn Connection>,
    created_at: Instant,
    last_used_at: Instant,
    in_use: bool,
    is_valid: bool,
}

impl PooledConnection {
    fn new(connection: Arc<dyn Connection>, in_use: bool) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            connection,
            created_at: now,
            last_used_at: now,
            in_use,
            is_valid: true,
        }
    }

    fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }
}

/// A caller suspended in `acquire` because the pool was at capacity
struct PendingAcquire {
    id: Uuid,
    tx: oneshot::Sender<Result<Arc<dyn Connection>>>,
    enqueued_at: Instant,
}

/// Registry state, guarded by a single mutex
///
/// Every protocol step that mutates bookkeeping (map, available list,
/// waiter queue) runs under this lock. The lock is never held across
/// factory opens or validation pings; capacity is protected across an
/// in-flight open by the `opening` reservation count.
struct PoolState {
    connections: HashMap<Uuid, PooledConnection>,
    available: VecDeque<Uuid>,
    waiters: VecDeque<PendingAcquire>,
    opening: usize,
    shutting_down: bool,
}

impl PoolState {
    fn new() -> Self {
        Self {
            connections: HashMap::new(),
            available: VecDeque::new(),
            waiters: VecDeque::new(),
            opening: 0,
            shutting_down: false,
        }
    }

    fn has_capacity(&self, max: usize) -> bool {
        self.connections.len() + self.opening < max
    }
}

struct PoolInner {
    store_config: StoreConfig,
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    state: Mutex<PoolState>,
    stats: StatsRecorder,
}

/// What `acquire` decided to do after inspecting the registry
enum AcquireStep {
    Reuse(Uuid, Arc<dyn Connection>),
    Open,
    Wait(Uuid, oneshot::Receiver<Result<Arc<dyn Connection>>>),
}

/// Outcome of trying to reserve capacity for a waiter's replacement
enum ReplaceDecision {
    Open,
    Requeue,
    PoolDown,
}

/// A bounded pool of reusable connections to the graph store
///
/// Callers acquire a raw handle, use it, and hand it back with
/// [`release`](ConnectionPool::release) (or let
/// [`with_connection`](ConnectionPool::with_connection) do both).
/// Waiting callers are served strictly in request order.
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
    reclaimer: parking_lot::Mutex<Option<JoinHandle<()>>>,
    initialized: Mutex<bool>,
}

impl ConnectionPool {
    /// Create a new connection pool
    ///
    /// Performs no I/O; call [`initialize`](ConnectionPool::initialize)
    /// to warm the pool and start the idle reclaimer. Fails if the pool
    /// configuration is inconsistent.
    pub fn new<F: ConnectionFactory>(
        store_config: StoreConfig,
        config: PoolConfig,
        factory: F,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                store_config,
                config,
                factory: Arc::new(factory),
                state: Mutex::new(PoolState::new()),
                stats: StatsRecorder::new(),
            }),
            reclaimer: parking_lot::Mutex::new(None),
            initialized: Mutex::new(false),
        })
    }

    /// Warm the pool up to `min_connections` and start the idle reclaimer
    ///
    /// Idempotent: concurrent callers serialize, and none returns before
    /// the pool is warm. Fails with a connection error if the factory
    /// cannot satisfy the minimum.
    #[tracing::instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return Ok(());
        }

        let min = self.inner.config.min_connections();
        loop {
            let reserved = {
                let mut state = self.inner.state.lock().await;
                if state.shutting_down {
                    return Err(GraphliteError::ShuttingDown);
                }
                if state.connections.len() + state.opening >= min {
                    false
                } else {
                    state.opening += 1;
                    true
                }
            };
            if !reserved {
                break;
            }
            self.inner.open_reserved(false).await?;
        }

        *self.reclaimer.lock() = Some(PoolInner::spawn_reclaimer(&self.inner));
        *initialized = true;
        tracing::info!(min_connections = min, "connection pool initialized");
        Ok(())
    }

    /// Get a connection from the pool
    ///
    /// In order: reuse an available connection (validating it first if
    /// validation is enabled), open a new one if the pool is below
    /// `max_connections`, or join the FIFO wait queue until a release
    /// frees a connection or `acquire_timeout` elapses.
    pub async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        let started = Instant::now();
        loop {
            let step = {
                let mut state = self.inner.state.lock().await;
                if state.shutting_down {
                    return Err(GraphliteError::ShuttingDown);
                }
                if let Some(id) = state.available.pop_front() {
                    match state.connections.get_mut(&id) {
                        Some(pooled) => {
                            pooled.in_use = true;
                            pooled.touch();
                            AcquireStep::Reuse(id, Arc::clone(&pooled.connection))
                        }
                        // Identifier without a registry entry; discard it.
                        None => continue,
                    }
                } else if state.has_capacity(self.inner.config.max_connections()) {
                    state.opening += 1;
                    AcquireStep::Open
                } else {
                    let (tx, rx) = oneshot::channel();
                    let waiter_id = Uuid::new_v4();
                    state.waiters.push_back(PendingAcquire {
                        id: waiter_id,
                        tx,
                        enqueued_at: Instant::now(),
                    });
                    tracing::trace!(waiter_id = %waiter_id, "pool at capacity, queuing acquire");
                    AcquireStep::Wait(waiter_id, rx)
                }
            };

            match step {
                AcquireStep::Reuse(id, conn) => {
                    if self.inner.config.validate_connections()
                        && !self.inner.validate(&conn).await
                    {
                        self.inner.destroy(id, &conn).await;
                        continue;
                    }
                    self.inner.stats.record_acquire(started.elapsed());
                    return Ok(conn);
                }
                AcquireStep::Open => {
                    let conn = self.inner.open_reserved(true).await?;
                    self.inner.stats.record_acquire(started.elapsed());
                    return Ok(conn);
                }
                AcquireStep::Wait(waiter_id, mut rx) => {
                    let timeout = self.inner.config.acquire_timeout();
                    return match tokio::time::timeout(timeout, &mut rx).await {
                        Ok(Ok(delivered)) => {
                            let conn = delivered?;
                            self.inner.stats.record_acquire(started.elapsed());
                            Ok(conn)
                        }
                        // Sender dropped without resolving; the pool is gone.
                        Ok(Err(_)) => Err(GraphliteError::ShuttingDown),
                        Err(_) => {
                            // Refuse deliveries from here on; a connection
                            // sent before the close is still drained below,
                            // one sent after bounces back to the pool.
                            rx.close();
                            let was_queued = {
                                let mut state = self.inner.state.lock().await;
                                let before = state.waiters.len();
                                state.waiters.retain(|w| w.id != waiter_id);
                                state.waiters.len() != before
                            };
                            if was_queued {
                                tracing::debug!(
                                    timeout = ?timeout,
                                    "acquire timed out waiting for a connection"
                                );
                                return Err(GraphliteError::AcquireTimeout(format!(
                                    "no connection became available within {timeout:?}"
                                )));
                            }
                            // A release resolved this waiter in the same
                            // instant the timer fired; honor its outcome.
                            match rx.try_recv() {
                                Ok(Ok(conn)) => {
                                    self.inner.stats.record_acquire(started.elapsed());
                                    Ok(conn)
                                }
                                Ok(Err(e)) => Err(e),
                                Err(_) => Err(GraphliteError::AcquireTimeout(format!(
                                    "no connection became available within {timeout:?}"
                                ))),
                            }
                        }
                    };
                }
            }
        }
    }

    /// Return a connection to the pool
    ///
    /// Releasing a handle the pool does not know, or releasing the same
    /// handle twice, is a logged no-op. A successful release immediately
    /// offers the connection to the oldest waiting acquire, if any.
    pub async fn release(&self, handle: &Arc<dyn Connection>) {
        if !self.inner.release_handle(handle).await {
            tracing::warn!("ignoring release of unknown or already-released connection");
        }
    }

    /// Run `f` with a pooled connection, releasing it afterwards
    ///
    /// The connection is released on every exit path: normal return,
    /// error return, and cancellation (the future being dropped while
    /// `f` is pending).
    pub async fn with_connection<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let conn = self.acquire().await?;
        let mut guard = ReturnOnDrop {
            inner: Arc::clone(&self.inner),
            handle: Some(Arc::clone(&conn)),
        };
        let result = f(Arc::clone(&conn)).await;
        guard.handle = None;
        drop(guard);
        self.release(&conn).await;
        result
    }

    /// Get a snapshot of the pool's statistics
    pub async fn stats(&self) -> PoolStats {
        let (total, available, pending) = {
            let state = self.inner.state.lock().await;
            (
                state.connections.len(),
                state.available.len(),
                state.waiters.len(),
            )
        };
        self.inner.stats.snapshot(total, available, pending)
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Shut the pool down
    ///
    /// Idempotent. Rejects every pending acquire, destroys every
    /// registered connection (close failures are logged, not raised),
    /// and stops the idle reclaimer. Subsequent `acquire` calls fail
    /// immediately without touching the factory.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        let (waiters, connections) = {
            let mut state = self.inner.state.lock().await;
            state.shutting_down = true;
            let waiters = std::mem::take(&mut state.waiters);
            let connections: Vec<_> = state
                .connections
                .drain()
                .map(|(id, pooled)| (id, pooled.connection))
                .collect();
            state.available.clear();
            (waiters, connections)
        };

        if let Some(handle) = self.reclaimer.lock().take() {
            handle.abort();
        }

        for waiter in waiters {
            let _ = waiter.tx.send(Err(GraphliteError::ShuttingDown));
        }

        let count = connections.len();
        for (id, conn) in connections {
            self.inner.stats.record_destroyed();
            if let Err(e) = conn.close().await {
                self.inner.stats.record_error();
                tracing::warn!(
                    connection_id = %id,
                    error = %e,
                    "failed to close connection during shutdown"
                );
            }
        }
        tracing::info!(closed = count, "connection pool shut down");
    }
}

/// Returns a scoped connection to the pool if the scope never reached
/// its release
///
/// Disarmed (handle taken) on the normal and error paths of
/// `with_connection`; fires only when the enclosing future is dropped
/// while `f` is still pending.
struct ReturnOnDrop {
    inner: Arc<PoolInner>,
    handle: Option<Arc<dyn Connection>>,
}

impl Drop for ReturnOnDrop {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        // Dropped inside the runtime when the owning task is aborted; the
        // try_current guard covers drops during runtime shutdown, where
        // the pool is going away anyway.
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(async move {
                tracing::debug!("returning connection from a cancelled scope");
                inner.release_handle(&handle).await;
            });
        }
    }
}

impl PoolInner {
    /// Park a held connection and hand it to the oldest waiter, if any
    ///
    /// Returns false when the handle is unknown or already released.
    async fn release_handle(&self, handle: &Arc<dyn Connection>) -> bool {
        if self.park(handle).await {
            self.stats.record_released();
            self.satisfy_waiters().await;
            true
        } else {
            false
        }
    }

    /// Open a connection against a capacity reservation taken by the caller
    ///
    /// The reservation is returned whether the open succeeds or not, so a
    /// factory failure never consumes a capacity slot.
    async fn open_reserved(&self, in_use: bool) -> Result<Arc<dyn Connection>> {
        let opened = self.factory.open(&self.store_config).await;
        let mut state = self.state.lock().await;
        state.opening -= 1;
        match opened {
            Ok(conn) => {
                if state.shutting_down {
                    drop(state);
                    let _ = conn.close().await;
                    return Err(GraphliteError::ShuttingDown);
                }
                let pooled = PooledConnection::new(Arc::clone(&conn), in_use);
                let id = pooled.id;
                if !in_use {
                    state.available.push_back(id);
                }
                state.connections.insert(id, pooled);
                drop(state);
                self.stats.record_created();
                tracing::debug!(connection_id = %id, "opened new connection");
                Ok(conn)
            }
            Err(e) => {
                drop(state);
                self.stats.record_error();
                tracing::warn!(error = %e, "failed to open connection");
                Err(e)
            }
        }
    }

    /// One liveness round-trip before a reused handle is handed out
    async fn validate(&self, conn: &Arc<dyn Connection>) -> bool {
        match conn.ping().await {
            Ok(()) => true,
            Err(e) => {
                self.stats.record_error();
                tracing::debug!(error = %e, "connection failed validation");
                false
            }
        }
    }

    /// Remove a failed connection from the registry and close it
    async fn destroy(&self, id: Uuid, conn: &Arc<dyn Connection>) {
        let removed = {
            let mut state = self.state.lock().await;
            if let Some(pooled) = state.connections.get_mut(&id) {
                pooled.is_valid = false;
            }
            state.connections.remove(&id).is_some()
        };
        // Already drained by shutdown; it will close the connection.
        if !removed {
            return;
        }
        self.stats.record_destroyed();
        if let Err(e) = conn.close().await {
            self.stats.record_error();
            tracing::warn!(connection_id = %id, error = %e, "failed to close connection");
        }
    }

    /// Mark an in-use connection available again
    ///
    /// Returns false when the handle is unknown to the registry or not
    /// currently in use. Only valid connections rejoin the available list.
    async fn park(&self, handle: &Arc<dyn Connection>) -> bool {
        let mut state = self.state.lock().await;
        let id = state
            .connections
            .iter()
            .find(|(_, p)| p.in_use && p.is_valid && Arc::ptr_eq(&p.connection, handle))
            .map(|(id, _)| *id);
        match id {
            Some(id) => {
                if let Some(pooled) = state.connections.get_mut(&id) {
                    pooled.in_use = false;
                    pooled.touch();
                }
                state.available.push_back(id);
                true
            }
            None => false,
        }
    }

    /// Offer available or newly created connections to queued waiters,
    /// oldest first
    async fn satisfy_waiters(&self) {
        loop {
            let (waiter, offer) = {
                let mut state = self.state.lock().await;
                if state.shutting_down || state.waiters.is_empty() {
                    return;
                }
                if let Some(id) = state.available.pop_front() {
                    let conn = match state.connections.get_mut(&id) {
                        Some(pooled) => {
                            pooled.in_use = true;
                            pooled.touch();
                            Arc::clone(&pooled.connection)
                        }
                        None => continue,
                    };
                    match state.waiters.pop_front() {
                        Some(waiter) => (waiter, Some((id, conn))),
                        None => return,
                    }
                } else if state.has_capacity(self.config.max_connections()) {
                    state.opening += 1;
                    match state.waiters.pop_front() {
                        Some(waiter) => (waiter, None),
                        None => {
                            state.opening -= 1;
                            return;
                        }
                    }
                } else {
                    return;
                }
            };

            match offer {
                Some((id, conn)) => {
                    if self.config.validate_connections() && !self.validate(&conn).await {
                        self.destroy(id, &conn).await;
                        // The waiter keeps its turn: open a replacement if
                        // capacity allows, otherwise requeue it at the front.
                        let decision = {
                            let mut state = self.state.lock().await;
                            if state.shutting_down {
                                ReplaceDecision::PoolDown
                            } else if state.has_capacity(self.config.max_connections()) {
                                state.opening += 1;
                                ReplaceDecision::Open
                            } else {
                                ReplaceDecision::Requeue
                            }
                        };
                        match decision {
                            ReplaceDecision::Open => match self.open_reserved(true).await {
                                Ok(new_conn) => self.deliver(waiter, new_conn).await,
                                Err(e) => {
                                    let _ = waiter.tx.send(Err(e));
                                }
                            },
                            ReplaceDecision::Requeue => {
                                let mut state = self.state.lock().await;
                                if state.shutting_down {
                                    let _ = waiter.tx.send(Err(GraphliteError::ShuttingDown));
                                } else {
                                    state.waiters.push_front(waiter);
                                }
                                return;
                            }
                            ReplaceDecision::PoolDown => {
                                let _ = waiter.tx.send(Err(GraphliteError::ShuttingDown));
                                return;
                            }
                        }
                    } else {
                        self.deliver(waiter, conn).await;
                    }
                }
                None => match self.open_reserved(true).await {
                    Ok(conn) => self.deliver(waiter, conn).await,
                    Err(e) => {
                        let _ = waiter.tx.send(Err(e));
                    }
                },
            }
        }
    }

    /// Hand a connection to a waiter, returning it to the pool if the
    /// waiter timed out or went away in the meantime
    async fn deliver(&self, waiter: PendingAcquire, conn: Arc<dyn Connection>) {
        let waited = waiter.enqueued_at.elapsed();
        match waiter.tx.send(Ok(conn)) {
            Ok(()) => {
                tracing::trace!(waiter_id = %waiter.id, waited = ?waited, "pending acquire satisfied");
            }
            Err(rejected) => {
                if let Ok(conn) = rejected {
                    self.park(&conn).await;
                }
            }
        }
    }

    /// Destroy available connections idle past `idle_timeout`, keeping at
    /// least `min_connections` registered
    async fn reclaim_idle(&self) {
        let idle_timeout = self.config.idle_timeout();
        let min = self.config.min_connections();
        let mut victims = Vec::new();
        {
            let mut state = self.state.lock().await;
            if state.shutting_down {
                return;
            }
            let now = Instant::now();
            let mut keep = VecDeque::new();
            while let Some(id) = state.available.pop_front() {
                let expired = state
                    .connections
                    .get(&id)
                    .map(|p| now.duration_since(p.last_used_at) > idle_timeout)
                    .unwrap_or(false);
                if expired && state.connections.len() > min {
                    if let Some(pooled) = state.connections.remove(&id) {
                        tracing::debug!(
                            connection_id = %id,
                            lifetime = ?pooled.created_at.elapsed(),
                            "reclaiming idle connection"
                        );
                        victims.push((id, pooled.connection));
                    }
                } else {
                    keep.push_back(id);
                }
            }
            state.available = keep;
        }

        for (id, conn) in victims {
            self.stats.record_destroyed();
            if let Err(e) = conn.close().await {
                self.stats.record_error();
                tracing::warn!(
                    connection_id = %id,
                    error = %e,
                    "failed to close reclaimed connection"
                );
            }
        }
    }

    /// Spawn the periodic idle reclamation task
    ///
    /// The task holds only a weak reference, so dropping the pool ends it;
    /// `shutdown` aborts it explicitly.
    fn spawn_reclaimer(inner: &Arc<PoolInner>) -> JoinHandle<()> {
        let weak = Arc::downgrade(inner);
        let period = inner.config.reclaim_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the first
            // sweep runs one full period after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                inner.reclaim_idle().await;
            }
        })
    }
}
