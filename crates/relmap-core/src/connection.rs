//! Driver query interface.
//!
//! - [`Executor`] - run a statement and get materialized rows, a row count or an id
//! - [`Connection`] - an `Executor` that can open transactions
//! - [`TransactionOps`] - an `Executor` scoped to one open transaction
//! - [`IsolationLevel`] - SQL transaction isolation levels
//!
//! Every call takes a `Cx` for cancellation and returns an asupersync `Outcome`.
//! Rows come back fully materialized, so a driver releases its cursor before
//! the returned future resolves.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Dirty reads, non-repeatable reads and phantoms are all possible.
    ReadUncommitted,

    /// Only committed changes from others are visible.
    #[default]
    ReadCommitted,

    /// A consistent snapshot for the whole transaction.
    RepeatableRead,

    /// Transactions appear to execute one after another.
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL syntax for this isolation level.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Anything that can run SQL: a connection, a pooled checkout or an open transaction.
///
/// Placeholders are positional `?`; `params` bind in order.
pub trait Executor: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send;

    /// Execute a statement (INSERT, UPDATE, DELETE) and return rows affected.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send;

    /// Execute an INSERT and return the first generated id.
    ///
    /// For a multi-row `VALUES` list this is the id of the first row; drivers
    /// that only know the last id must translate.
    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, crate::Error>> + Send;

    /// Execute a query and return the result's column names with its rows.
    ///
    /// The default takes the names from the first row, so an empty result
    /// has no columns; drivers that know the names up front override it.
    fn query_with_columns(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<(Vec<String>, Vec<Row>), crate::Error>> + Send {
        async move {
            match self.query(cx, sql, params).await {
                Outcome::Ok(rows) => {
                    let columns = rows
                        .first()
                        .map(|row| row.column_names().map(str::to_string).collect())
                        .unwrap_or_default();
                    Outcome::Ok((columns, rows))
                }
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send {
        (**self).query(cx, sql, params)
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send {
        (**self).execute(cx, sql, params)
    }

    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, crate::Error>> + Send {
        (**self).insert(cx, sql, params)
    }

    fn query_with_columns(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<(Vec<String>, Vec<Row>), crate::Error>> + Send {
        (**self).query_with_columns(cx, sql, params)
    }
}

/// A database connection capable of opening transactions.
///
/// ```rust,ignore
/// let tx = try_outcome!(conn.begin(&cx).await);
/// try_outcome!(tx.execute(&cx, "INSERT INTO log (msg) VALUES (?)", &[Value::from("hi")]).await);
/// try_outcome!(tx.commit(&cx).await);
/// ```
pub trait Connection: Executor {
    /// The transaction type returned by this connection.
    type Tx<'conn>: TransactionOps
    where
        Self: 'conn;

    /// Begin a transaction with the default isolation level.
    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, crate::Error>> + Send;

    /// Begin a transaction with a specific isolation level.
    fn begin_with(
        &self,
        cx: &Cx,
        isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, crate::Error>> + Send;

    /// Check if the connection is still usable.
    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    /// Check if the connection is still valid (ping as a bool).
    fn is_valid(&self, cx: &Cx) -> impl Future<Output = bool> + Send {
        async {
            match self.ping(cx).await {
                Outcome::Ok(()) => true,
                Outcome::Err(_) | Outcome::Cancelled(_) | Outcome::Panicked(_) => false,
            }
        }
    }

    /// Close the connection gracefully.
    fn close(self, cx: &Cx) -> impl Future<Output = Result<()>> + Send;
}

/// An open transaction.
///
/// Dropping it without calling [`commit`](TransactionOps::commit) rolls back.
pub trait TransactionOps: Executor {
    /// Create a named savepoint within this transaction.
    fn savepoint(
        &self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    /// Commit the transaction, making all changes permanent.
    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    /// Rollback the transaction, discarding all changes.
    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), crate::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_sql() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::ReadCommitted);
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
        assert_eq!(IsolationLevel::ReadUncommitted.as_sql(), "READ UNCOMMITTED");
    }
}
