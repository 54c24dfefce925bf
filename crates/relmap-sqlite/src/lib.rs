//! SQLite driver for relmap.
//!
// FFI bindings require unsafe code
#![allow(unsafe_code)]
//!
//! Implements [`Executor`](relmap_core::Executor),
//! [`Connection`](relmap_core::Connection) and
//! [`TransactionOps`](relmap_core::TransactionOps) over a bundled libsqlite3.
//!
//! - Rows are fully read before a call returns; statements are finalized on every path
//! - `insert` reports the first rowid of a multi-row `VALUES` list
//! - Isolation levels map onto `BEGIN DEFERRED` / `IMMEDIATE` / `EXCLUSIVE`
//! - An uncommitted [`SqliteTransaction`] rolls back when dropped
//!
//! # Example
//!
//! ```rust,ignore
//! use relmap_sqlite::SqliteConnection;
//! use relmap_core::{Cx, Executor, Outcome, Value};
//!
//! let conn = SqliteConnection::open_memory()?;
//! conn.execute_raw("CREATE TABLE user (user_id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//! let cx = Cx::for_testing();
//! match conn.insert(&cx, "INSERT INTO user (name) VALUES (?)", &[Value::from("ann")]).await {
//!     Outcome::Ok(id) => println!("inserted {id}"),
//!     Outcome::Err(e) => eprintln!("{e}"),
//!     _ => {}
//! }
//! ```

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection, SqliteTransaction};

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
