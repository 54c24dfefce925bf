//! Bounded connection pool for relmap.
//!
//! A [`Pool`] hands out [`PooledConnection`]s up to `max_open` at a time and
//! keeps at most `max_idle` of them around after they are released. There is
//! no waiting: when every slot is checked out, [`Pool::acquire`] fails with
//! `Error::Pool(Exhausted)`.
//!
//! A pooled connection is itself a [`Connection`], so it can be handed to a
//! session or a transaction directly.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use relmap_core::error::{PoolError, PoolErrorKind};
use relmap_core::{
    Connection, Cx, Error, Executor, IsolationLevel, Outcome, Result, Row, Value,
};
use serde::Deserialize;

/// Connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of connections checked out at once
    pub max_open: usize,
    /// Maximum number of released connections kept for reuse
    pub max_idle: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: 10,
            max_idle: 2,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with the given max connections.
    pub fn new(max_open: usize) -> Self {
        Self {
            max_open,
            max_idle: Self::default().max_idle.min(max_open),
        }
    }

    /// Set the idle limit.
    pub fn max_idle(mut self, n: usize) -> Self {
        self.max_idle = n;
        self
    }

    /// Parse a configuration from JSON; missing keys take their defaults.
    ///
    /// ```
    /// let config = relmap_pool::PoolConfig::from_json(r#"{"max_open": 4}"#).unwrap();
    /// assert_eq!(config.max_open, 4);
    /// assert_eq!(config.max_idle, 2);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| pool_error(
            PoolErrorKind::Config,
            format!("invalid pool configuration: {e}"),
        ))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no pool can honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_open == 0 {
            return Err(pool_error(PoolErrorKind::Config, "max_open must be at least 1"));
        }
        if self.max_idle > self.max_open {
            return Err(pool_error(
                PoolErrorKind::Config,
                format!(
                    "max_idle ({}) exceeds max_open ({})",
                    self.max_idle, self.max_open
                ),
            ));
        }
        Ok(())
    }
}

fn pool_error(kind: PoolErrorKind, message: impl Into<String>) -> Error {
    Error::Pool(PoolError {
        kind,
        message: message.into(),
    })
}

/// Pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections that exist, checked out or idle
    pub open_connections: usize,
    /// Connections waiting in the idle list
    pub idle_connections: usize,
    /// Connections currently checked out
    pub active_connections: usize,
}

type Factory<C> = dyn Fn() -> Result<C> + Send + Sync;

struct PoolInner<C> {
    config: PoolConfig,
    idle: Mutex<Vec<C>>,
    open: AtomicUsize,
    closed: AtomicBool,
    factory: Box<Factory<C>>,
}

impl<C> PoolInner<C> {
    fn idle(&self) -> MutexGuard<'_, Vec<C>> {
        // The idle list stays consistent even if a holder panicked.
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, conn: C) {
        let mut idle = self.idle();
        if self.closed.load(Ordering::Acquire) || idle.len() >= self.config.max_idle {
            drop(idle);
            self.open.fetch_sub(1, Ordering::AcqRel);
            tracing::trace!("Closing released connection");
            drop(conn);
        } else {
            idle.push(conn);
        }
    }
}

/// A bounded pool of connections produced by a factory.
pub struct Pool<C> {
    inner: Arc<PoolInner<C>>,
}

impl<C> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> std::fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<C> Pool<C> {
    /// Create a pool; `factory` opens a new connection whenever the idle list
    /// is empty and a slot is free.
    pub fn new<F>(config: PoolConfig, factory: F) -> Result<Self>
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                idle: Mutex::new(Vec::new()),
                open: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                factory: Box::new(factory),
            }),
        })
    }

    /// Get the pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Check out a connection, reusing an idle one when possible.
    pub fn acquire(&self) -> Result<PooledConnection<C>> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(pool_error(PoolErrorKind::Closed, "pool is closed"));
        }
        if let Some(conn) = self.inner.idle().pop() {
            return Ok(self.wrap(conn));
        }

        let max_open = self.inner.config.max_open;
        self.inner
            .open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| {
                (open < max_open).then_some(open + 1)
            })
            .map_err(|open| {
                tracing::debug!(open, max_open, "Pool exhausted");
                pool_error(
                    PoolErrorKind::Exhausted,
                    format!("all {max_open} connections are in use"),
                )
            })?;

        match (self.inner.factory)() {
            Ok(conn) => {
                tracing::debug!("Opened pooled connection");
                Ok(self.wrap(conn))
            }
            Err(e) => {
                self.inner.open.fetch_sub(1, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    fn wrap(&self, conn: C) -> PooledConnection<C> {
        PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Get the current pool statistics.
    pub fn stats(&self) -> PoolStats {
        let open = self.inner.open.load(Ordering::Acquire);
        let idle = self.inner.idle().len();
        PoolStats {
            open_connections: open,
            idle_connections: idle,
            active_connections: open.saturating_sub(idle),
        }
    }

    /// Refuse further checkouts and drop every idle connection.
    ///
    /// Connections still checked out are dropped when they are released.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let drained: Vec<C> = self.inner.idle().drain(..).collect();
        self.inner.open.fetch_sub(drained.len(), Ordering::AcqRel);
        tracing::debug!(closed = drained.len(), "Pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// A connection checked out of a [`Pool`]; returned to it on drop.
pub struct PooledConnection<C> {
    conn: Option<C>,
    pool: Arc<PoolInner<C>>,
}

impl<C> PooledConnection<C> {
    fn conn(&self) -> &C {
        self.conn
            .as_ref()
            .expect("pooled connection is present until released")
    }
}

impl<C> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        self.conn()
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PooledConnection").field(&self.conn).finish()
    }
}

impl<C> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

impl<C: Executor> Executor for PooledConnection<C> {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        self.conn().query(cx, sql, params)
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        self.conn().execute(cx, sql, params)
    }

    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        self.conn().insert(cx, sql, params)
    }

    fn query_with_columns(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<(Vec<String>, Vec<Row>), Error>> + Send {
        self.conn().query_with_columns(cx, sql, params)
    }
}

impl<C: Connection> Connection for PooledConnection<C> {
    type Tx<'conn>
        = C::Tx<'conn>
    where
        Self: 'conn;

    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        self.conn().begin(cx)
    }

    fn begin_with(
        &self,
        cx: &Cx,
        isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        self.conn().begin_with(cx, isolation)
    }

    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.conn().ping(cx)
    }

    /// Close the underlying connection instead of returning it to the pool.
    fn close(mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        let conn = self.conn.take();
        let pool = Arc::clone(&self.pool);
        drop(self);
        async move {
            match conn {
                Some(conn) => {
                    pool.open.fetch_sub(1, Ordering::AcqRel);
                    conn.close(cx).await
                }
                None => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Dummy(usize);

    fn counting_pool(config: PoolConfig) -> (Pool<Dummy>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let pool = Pool::new(config, move || {
            Ok(Dummy(counter.fetch_add(1, Ordering::SeqCst)))
        })
        .unwrap();
        (pool, created)
    }

    #[test]
    fn test_config_from_json() {
        let config = PoolConfig::from_json(r#"{"max_open": 8, "max_idle": 3}"#).unwrap();
        assert_eq!(config, PoolConfig::new(8).max_idle(3));

        let defaults = PoolConfig::from_json("{}").unwrap();
        assert_eq!(defaults, PoolConfig::default());

        let err = PoolConfig::from_json(r#"{"max_open": 1, "max_idle": 5}"#).unwrap_err();
        assert!(matches!(err, Error::Pool(ref p) if p.kind == PoolErrorKind::Config));
        assert!(PoolConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_acquire_fails_fast_when_exhausted() {
        let (pool, _) = counting_pool(PoolConfig::new(2).max_idle(1));
        let a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();

        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, Error::Pool(ref p) if p.kind == PoolErrorKind::Exhausted));

        drop(a);
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn test_released_connections_are_reused() {
        let (pool, created) = counting_pool(PoolConfig::new(4).max_idle(2));
        let first = pool.acquire().unwrap();
        assert_eq!(first.0, 0);
        drop(first);

        let again = pool.acquire().unwrap();
        assert_eq!(again.0, 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_idle_limit_closes_extra_connections() {
        let (pool, _) = counting_pool(PoolConfig::new(3).max_idle(1));
        let held: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
        assert_eq!(pool.stats().active_connections, 3);

        drop(held);
        let stats = pool.stats();
        assert_eq!(stats.open_connections, 1);
        assert_eq!(stats.idle_connections, 1);
        assert_eq!(stats.active_connections, 0);
    }

    #[test]
    fn test_factory_failure_frees_the_slot() {
        let pool: Pool<Dummy> =
            Pool::new(PoolConfig::new(1), || Err(Error::Custom("refused".into()))).unwrap();
        assert!(matches!(pool.acquire(), Err(Error::Custom(_))));
        assert_eq!(pool.stats().open_connections, 0);
    }

    #[test]
    fn test_closed_pool_rejects_checkout() {
        let (pool, _) = counting_pool(PoolConfig::default());
        drop(pool.acquire().unwrap());
        assert_eq!(pool.stats().idle_connections, 1);

        pool.close();
        assert!(pool.is_closed());
        assert_eq!(pool.stats(), PoolStats::default());
        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, Error::Pool(ref p) if p.kind == PoolErrorKind::Closed));
    }
}
