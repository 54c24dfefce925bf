//! Recording in-memory executor shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use asupersync::runtime::RuntimeBuilder;
use relmap_core::error::{QueryError, QueryErrorKind};
use relmap_core::{Cx, Error, Executor, Outcome, RelationKey, Row, Value};

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => panic!("expected error, got {other:?}"),
    }
}

pub fn block_on<F: Future>(f: F) -> F::Output {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(f)
}

pub fn row(pairs: &[(&str, Value)]) -> Row {
    Row::new(
        pairs.iter().map(|(c, _)| (*c).to_string()).collect(),
        pairs.iter().map(|(_, v)| v.clone()).collect(),
    )
}

/// Understands exactly the statements the resolver and helpers emit:
/// `SELECT * FROM t [WHERE c = ? | WHERE c IN (...)] [LIMIT 1]`.
/// Everything else is logged and answered with canned values.
#[derive(Default)]
pub struct FakeDb {
    pub(crate) tables: HashMap<String, Vec<Row>>,
    pub(crate) log: Mutex<Vec<(String, Vec<Value>)>>,
    pub first_id: i64,
    pub affected: u64,
    pub fail_on: Option<&'static str>,
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(name.to_string(), rows);
        self
    }

    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().expect("log lock").clone()
    }

    pub fn query_count(&self) -> usize {
        self.statements()
            .iter()
            .filter(|(sql, _)| sql.starts_with("SELECT"))
            .count()
    }

    fn record(&self, sql: &str, params: &[Value]) -> Option<Error> {
        self.log
            .lock()
            .expect("log lock")
            .push((sql.to_string(), params.to_vec()));
        self.fail_on.filter(|needle| sql.contains(needle)).map(|_| {
            Error::Query(QueryError {
                kind: QueryErrorKind::Database,
                sql: Some(sql.to_string()),
                message: "injected failure".to_string(),
                source: None,
            })
        })
    }

    fn select(&self, sql: &str, params: &[Value]) -> Vec<Row> {
        let mut words = sql.split_whitespace();
        let table = words
            .by_ref()
            .skip_while(|w| *w != "FROM")
            .nth(1)
            .unwrap_or_default();
        let rows = self.tables.get(table).cloned().unwrap_or_default();

        let filter_column = sql
            .split(" WHERE ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next());
        let mut rows: Vec<Row> = match filter_column {
            Some(column) => {
                let keys: Vec<RelationKey> =
                    params.iter().filter_map(RelationKey::from_value).collect();
                rows.into_iter()
                    .filter(|r| {
                        r.get_by_name(column)
                            .and_then(RelationKey::from_value)
                            .is_some_and(|k| keys.contains(&k))
                    })
                    .collect()
            }
            None => rows,
        };
        if sql.ends_with("LIMIT 1") {
            rows.truncate(1);
        }
        rows
    }
}

impl Executor for FakeDb {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = match self.record(sql, params) {
            Some(err) => Err(err),
            None => Ok(self.select(sql, params)),
        };
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = match self.record(sql, params) {
            Some(err) => Err(err),
            None => Ok(self.affected),
        };
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let result = match self.record(sql, params) {
            Some(err) => Err(err),
            None => Ok(self.first_id),
        };
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }
}
