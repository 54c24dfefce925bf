//! Shared models and helpers for the SQLite-backed facade tests.

#![allow(dead_code)]

use asupersync::runtime::RuntimeBuilder;
use relmap::{Error, Model, Orm, OrmConfig, Outcome, PoolConfig, SqliteConfig, SqliteConnection};

#[derive(Model, Debug, Default, Clone, PartialEq)]
pub struct Author {
    #[relmap(primary_key, auto_increment)]
    pub author_id: i64,
    pub name: String,
    #[relmap(relation = "has_one", table = "bio")]
    pub bio: Option<Box<Bio>>,
    #[relmap(relation = "has_many", table = "book")]
    pub books: Vec<Book>,
}

#[derive(Model, Debug, Default, Clone, PartialEq)]
pub struct Bio {
    #[relmap(primary_key, auto_increment)]
    pub id: i64,
    pub author_id: i64,
    pub text: String,
}

#[derive(Model, Debug, Default, Clone, PartialEq)]
pub struct Book {
    #[relmap(primary_key, auto_increment)]
    pub id: i64,
    pub author_id: Option<i64>,
    pub title: String,
    #[relmap(relation = "belongs_to", table = "author")]
    pub author: Option<Box<Author>>,
}

const SCHEMA: &str = "
    CREATE TABLE author (author_id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL);
    CREATE TABLE bio (id INTEGER PRIMARY KEY AUTOINCREMENT, author_id INTEGER NOT NULL, text TEXT NOT NULL);
    CREATE TABLE book (id INTEGER PRIMARY KEY AUTOINCREMENT, author_id INTEGER, title TEXT NOT NULL);
";

/// One in-memory database behind a single pooled connection.
pub fn orm() -> Orm<SqliteConnection> {
    let config = OrmConfig::new(PoolConfig::new(1).max_idle(1));
    let orm = Orm::sqlite(config, SqliteConfig::memory()).expect("open orm");
    orm.pool()
        .acquire()
        .expect("acquire connection")
        .execute_raw(SCHEMA)
        .expect("create schema");
    orm
}

pub fn author(name: &str) -> Author {
    Author {
        name: name.to_string(),
        ..Author::default()
    }
}

pub fn book(author_id: Option<i64>, title: &str) -> Book {
    Book {
        author_id,
        title: title.to_string(),
        ..Book::default()
    }
}

pub fn block_on<F: Future>(f: F) -> F::Output {
    RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime")
        .block_on(f)
}

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
