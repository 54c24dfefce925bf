//! Session: every read and write helper bound to one executor.

use std::collections::HashMap;

use relmap_core::{
    Connection, Cx, Error, Executor, FromValue, IsolationLevel, Model, Outcome, ParamSource, Value,
};

use crate::{exec, insert, select, transaction};

/// A handle over one executor: a connection, a pooled checkout or an
/// open transaction.
///
/// ```rust,ignore
/// let session = Session::new(&conn);
/// let users: Vec<User> = try_outcome!(session.select_many(&cx, "SELECT * FROM user", &[]).await);
/// ```
#[derive(Debug)]
pub struct Session<E> {
    executor: E,
}

impl<E: Executor> Session<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// The underlying executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_inner(self) -> E {
        self.executor
    }

    /// First row as a record with relations loaded; `Error::NoRows` when empty.
    pub async fn select_one<M: Model>(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<M, Error> {
        select::select_one(cx, &self.executor, sql, params).await
    }

    /// Look a record up by its primary key.
    pub async fn select_by_pk<M: Model>(&self, cx: &Cx, pk: impl Into<Value>) -> Outcome<M, Error> {
        select::select_by_pk(cx, &self.executor, pk.into()).await
    }

    /// Every row as a record, relations batch-loaded.
    pub async fn select_many<M: Model>(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Vec<M>, Error> {
        select::select_many(cx, &self.executor, sql, params).await
    }

    pub async fn select_column<T: FromValue>(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Vec<T>, Error> {
        select::select_column(cx, &self.executor, sql, params).await
    }

    pub async fn select_str(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<String, Error> {
        select::select_str(cx, &self.executor, sql, params).await
    }

    pub async fn select_int(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<i64, Error> {
        select::select_int(cx, &self.executor, sql, params).await
    }

    pub async fn select_float(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<f64, Error> {
        select::select_float(cx, &self.executor, sql, params).await
    }

    pub async fn select_raw(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<(Vec<String>, Vec<Vec<String>>), Error> {
        select::select_raw(cx, &self.executor, sql, params).await
    }

    pub async fn select_raw_set(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Vec<HashMap<String, String>>, Error> {
        select::select_raw_set(cx, &self.executor, sql, params).await
    }

    pub async fn insert<M: Model>(&self, cx: &Cx, record: &mut M) -> Outcome<(), Error> {
        insert::insert(cx, &self.executor, record).await
    }

    pub async fn insert_batch<M: Model>(&self, cx: &Cx, records: &mut [M]) -> Outcome<(), Error> {
        insert::insert_batch(cx, &self.executor, records).await
    }

    pub async fn exec(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<u64, Error> {
        exec::exec(cx, &self.executor, sql, params).await
    }

    pub async fn exec_with_params<P: ParamSource + Sync + ?Sized>(
        &self,
        cx: &Cx,
        template: &str,
        source: &P,
    ) -> Outcome<u64, Error> {
        exec::exec_with_params(cx, &self.executor, template, source).await
    }

    pub async fn exec_expect_rows(
        &self,
        cx: &Cx,
        expected: u64,
        sql: &str,
        params: &[Value],
    ) -> Outcome<u64, Error> {
        exec::exec_expect_rows(cx, &self.executor, expected, sql, params).await
    }
}

impl<C: Connection> Session<C> {
    /// Run `f` in a transaction on this session's connection.
    pub async fn transaction<'s, T, F>(&'s self, cx: &Cx, f: F) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(&Session<C::Tx<'s>>) -> Outcome<T, Error>,
    {
        transaction::run(cx, &self.executor, None, f).await
    }

    /// Like [`transaction`](Self::transaction) with an explicit isolation level.
    pub async fn transaction_with<'s, T, F>(
        &'s self,
        cx: &Cx,
        isolation: IsolationLevel,
        f: F,
    ) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(&Session<C::Tx<'s>>) -> Outcome<T, Error>,
    {
        transaction::run(cx, &self.executor, Some(isolation), f).await
    }
}
