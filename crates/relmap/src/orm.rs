//! The [`Orm`] handle: a connection pool, a table registry and every
//! read/write helper, each call on its own pooled connection.

use std::collections::HashMap;

use relmap_core::{
    Connection, Cx, Error, FromValue, IsolationLevel, Model, Outcome, ParamSource, Result, Value,
    try_result,
};
use relmap_pool::{Pool, PoolConfig, PooledConnection};
use relmap_query::{Session, transaction};
use relmap_schema::{Dialect, TableEntry, TableRegistry};
use serde::Deserialize;

/// Settings for an [`Orm`].
///
/// ```
/// let config = relmap::OrmConfig::from_json(
///     r#"{"dialect": "sqlite", "pool": {"max_open": 4, "max_idle": 1}}"#,
/// )
/// .unwrap();
/// assert_eq!(config.pool.max_open, 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OrmConfig {
    pub pool: PoolConfig,
    /// Dialect used for schema checks and truncation
    pub dialect: Dialect,
}

impl OrmConfig {
    pub fn new(pool: PoolConfig) -> Self {
        Self {
            pool,
            dialect: Dialect::default(),
        }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Parse a configuration from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Custom(format!("invalid orm configuration: {e}")))?;
        config.pool.validate()?;
        Ok(config)
    }
}

/// Entry point: pooled connections plus the registered tables.
pub struct Orm<C> {
    pool: Pool<C>,
    registry: TableRegistry,
}

impl<C> std::fmt::Debug for Orm<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orm")
            .field("pool", &self.pool)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(feature = "sqlite")]
impl Orm<relmap_sqlite::SqliteConnection> {
    /// An `Orm` whose pool opens SQLite connections with `sqlite`.
    ///
    /// Every `:memory:` connection is a separate database, so in-memory
    /// setups want `max_open` and `max_idle` of 1.
    pub fn sqlite(config: OrmConfig, sqlite: relmap_sqlite::SqliteConfig) -> Result<Self> {
        Self::new(config, move || relmap_sqlite::SqliteConnection::open(&sqlite))
    }
}

impl<C: Connection + 'static> Orm<C> {
    /// Create an `Orm`; `factory` opens connections as the pool needs them.
    pub fn new<F>(config: OrmConfig, factory: F) -> Result<Self>
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        let pool = Pool::new(config.pool, factory)?;
        tracing::debug!(dialect = ?config.dialect, "Created orm");
        Ok(Self {
            pool,
            registry: TableRegistry::new(config.dialect),
        })
    }

    pub fn pool(&self) -> &Pool<C> {
        &self.pool
    }

    /// A session over a freshly checked-out connection.
    ///
    /// The connection goes back to the pool when the session is dropped.
    pub fn session(&self) -> Result<Session<PooledConnection<C>>> {
        self.pool.acquire().map(Session::new)
    }

    /// Stop handing out connections and drop the idle ones.
    pub fn close(&self) {
        self.pool.close();
    }

    // ==================== Table registry ====================

    /// Register `M` for [`check_tables`](Self::check_tables), lookup and truncation.
    #[allow(clippy::result_large_err)]
    pub fn add_table<M: Model>(&mut self) -> Result<()> {
        self.registry.add_table::<M>()
    }

    /// The registered type for a table name.
    pub fn table(&self, name: &str) -> Option<&TableEntry> {
        self.registry.table(name)
    }

    /// Verify each registered type's persisted fields have backing columns.
    pub async fn check_tables(&self, cx: &Cx) -> Outcome<(), Error> {
        let conn = try_result!(self.pool.acquire());
        self.registry.check_tables(cx, &conn).await
    }

    pub async fn truncate_table(&self, cx: &Cx, name: &str) -> Outcome<(), Error> {
        let conn = try_result!(self.pool.acquire());
        self.registry.truncate_table(cx, &conn, name).await
    }

    pub async fn truncate_tables(&self, cx: &Cx) -> Outcome<(), Error> {
        let conn = try_result!(self.pool.acquire());
        self.registry.truncate_tables(cx, &conn).await
    }

    // ==================== Transactions ====================

    /// Run `f` in a transaction on one pooled connection.
    ///
    /// `Outcome::Ok` commits. Any other outcome rolls back and is returned.
    /// A panic in `f` rolls back and is re-raised with its original payload.
    ///
    /// ```rust,ignore
    /// orm.transaction(&cx, async |tx| {
    ///     try_outcome!(tx.insert(&cx, &mut order).await);
    ///     tx.exec_expect_rows(&cx, 1, "UPDATE stock SET n = n - 1 WHERE id = ?", &[item]).await
    /// })
    /// .await
    /// ```
    pub async fn transaction<T, F>(&self, cx: &Cx, f: F) -> Outcome<T, Error>
    where
        F: for<'c> AsyncFnOnce(&Session<C::Tx<'c>>) -> Outcome<T, Error>,
    {
        let conn = try_result!(self.pool.acquire());
        transaction::run(cx, &conn, None, f).await
    }

    /// Like [`transaction`](Self::transaction) with an explicit isolation level.
    pub async fn transaction_with<T, F>(
        &self,
        cx: &Cx,
        isolation: IsolationLevel,
        f: F,
    ) -> Outcome<T, Error>
    where
        F: for<'c> AsyncFnOnce(&Session<C::Tx<'c>>) -> Outcome<T, Error>,
    {
        let conn = try_result!(self.pool.acquire());
        transaction::run(cx, &conn, Some(isolation), f).await
    }

    // ==================== Reads ====================

    pub async fn select_one<M: Model>(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<M, Error> {
        try_result!(self.session()).select_one(cx, sql, params).await
    }

    pub async fn select_by_pk<M: Model>(&self, cx: &Cx, pk: impl Into<Value>) -> Outcome<M, Error> {
        try_result!(self.session()).select_by_pk(cx, pk).await
    }

    pub async fn select_many<M: Model>(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Vec<M>, Error> {
        try_result!(self.session()).select_many(cx, sql, params).await
    }

    pub async fn select_column<T: FromValue>(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Vec<T>, Error> {
        try_result!(self.session()).select_column(cx, sql, params).await
    }

    pub async fn select_str(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<String, Error> {
        try_result!(self.session()).select_str(cx, sql, params).await
    }

    pub async fn select_int(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<i64, Error> {
        try_result!(self.session()).select_int(cx, sql, params).await
    }

    pub async fn select_float(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<f64, Error> {
        try_result!(self.session()).select_float(cx, sql, params).await
    }

    pub async fn select_raw(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<(Vec<String>, Vec<Vec<String>>), Error> {
        try_result!(self.session()).select_raw(cx, sql, params).await
    }

    pub async fn select_raw_set(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Vec<HashMap<String, String>>, Error> {
        try_result!(self.session()).select_raw_set(cx, sql, params).await
    }

    // ==================== Writes ====================

    pub async fn insert<M: Model>(&self, cx: &Cx, record: &mut M) -> Outcome<(), Error> {
        try_result!(self.session()).insert(cx, record).await
    }

    pub async fn insert_batch<M: Model>(&self, cx: &Cx, records: &mut [M]) -> Outcome<(), Error> {
        try_result!(self.session()).insert_batch(cx, records).await
    }

    pub async fn exec(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<u64, Error> {
        try_result!(self.session()).exec(cx, sql, params).await
    }

    pub async fn exec_with_params<P: ParamSource + Sync + ?Sized>(
        &self,
        cx: &Cx,
        template: &str,
        source: &P,
    ) -> Outcome<u64, Error> {
        try_result!(self.session())
            .exec_with_params(cx, template, source)
            .await
    }

    pub async fn exec_expect_rows(
        &self,
        cx: &Cx,
        expected: u64,
        sql: &str,
        params: &[Value],
    ) -> Outcome<u64, Error> {
        try_result!(self.session())
            .exec_expect_rows(cx, expected, sql, params)
            .await
    }
}
