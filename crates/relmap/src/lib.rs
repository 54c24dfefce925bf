//! relmap - tag-driven row mapping with batched relation loading.
//!
//! Records are plain structs with `#[derive(Model)]`. Relations are declared
//! on fields and loaded automatically after every select, one query per
//! relation no matter how many parents were read.
//!
//! # Quick Start
//!
//! ```ignore
//! use relmap::prelude::*;
//!
//! #[derive(Model, Debug, Default)]
//! struct User {
//!     #[relmap(primary_key, auto_increment)]
//!     user_id: i64,
//!     name: String,
//!     #[relmap(relation = "has_many", table = "post")]
//!     posts: Vec<Post>,
//! }
//!
//! #[derive(Model, Debug, Default)]
//! struct Post {
//!     #[relmap(primary_key, auto_increment)]
//!     id: i64,
//!     user_id: i64,
//!     title: String,
//! }
//!
//! async fn example(cx: &Cx, orm: &Orm<SqliteConnection>) -> Outcome<(), Error> {
//!     let mut ann = User { name: "ann".into(), ..User::default() };
//!     try_outcome!(orm.insert(cx, &mut ann).await);
//!
//!     // one query for users, one for all of their posts
//!     let users: Vec<User> = try_outcome!(orm.select_many(cx, "SELECT * FROM user", &[]).await);
//!
//!     orm.transaction(cx, async |tx| {
//!         let params = [Value::from("anna"), Value::from(ann.user_id)];
//!         try_outcome!(
//!             tx.exec_expect_rows(cx, 1, "UPDATE user SET name = ? WHERE user_id = ?", &params)
//!                 .await
//!         );
//!         Outcome::Ok(())
//!     })
//!     .await
//! }
//! ```
//!
//! # Crates
//!
//! - `relmap-core`: values, rows, descriptors, driver traits
//! - `relmap-macros`: `#[derive(Model)]`
//! - `relmap-query`: relation resolution, selects, inserts, execution
//! - `relmap-schema`: table registry and column checks
//! - `relmap-pool`: bounded connection pool
//! - `relmap-sqlite`: bundled SQLite driver (feature `sqlite`)

pub mod orm;

pub use orm::{Orm, OrmConfig};

pub use relmap_core::{
    Connection, Cx, Descriptor, Error, Executor, FieldInfo, FromValue, IsolationLevel, Model,
    Outcome, ParamSource, Relation, RelationKind, Result, Row, TransactionOps, Value,
    column_to_field, field_to_column, try_outcome, try_result,
};
pub use relmap_core::error;

pub use relmap_macros::Model;

pub use relmap_query::{CatchUnwind, Session, Template, resolve_many, resolve_one, transaction};

pub use relmap_pool::{Pool, PoolConfig, PoolStats, PooledConnection};

pub use relmap_schema::{ColumnMeta, Dialect, Introspector, TableEntry, TableRegistry};

#[cfg(feature = "sqlite")]
pub use relmap_sqlite::{SqliteConfig, SqliteConnection, SqliteTransaction};

/// Everything a typical caller needs.
pub mod prelude {
    pub use crate::{
        Connection, Cx, Error, Executor, FromValue, IsolationLevel, Model, Orm, OrmConfig,
        Outcome, PoolConfig, Result, Row, Session, TransactionOps, Value, try_outcome, try_result,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::{SqliteConfig, SqliteConnection};
}
