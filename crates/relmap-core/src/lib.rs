//! Core types and traits for relmap.
//!
//! This crate holds everything the query layer and the drivers agree on:
//!
//! - `Value` / `Row` for dynamically typed result data
//! - `Executor`, `Connection` and `TransactionOps` for driver access
//! - `Model` and `Descriptor` for record metadata
//! - the Field Mapper (`naming`) and the Row Scanner (`scan`)
//! - `Outcome` and `Cx` re-exported from asupersync

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod descriptor;
pub mod error;
pub mod key;
pub mod model;
pub mod naming;
pub mod params;
pub mod row;
pub mod scan;
pub mod value;

pub use connection::{Connection, Executor, IsolationLevel, TransactionOps};
pub use descriptor::{Descriptor, FieldInfo, FieldShape, RelationDecl, RelationKind, Relation};
pub use error::{Error, Result};
pub use key::RelationKey;
pub use model::Model;
pub use naming::{column_to_field, field_to_column};
pub use params::ParamSource;
pub use row::{ColumnInfo, FromValue, Row};
pub use scan::scan_row;
pub use value::Value;

/// Unwrap an `Outcome`, returning early from the enclosing async fn on anything but `Ok`.
///
/// ```ignore
/// let rows = try_outcome!(conn.query(cx, sql, &params).await);
/// ```
#[macro_export]
macro_rules! try_outcome {
    ($expr:expr) => {
        match $expr {
            $crate::Outcome::Ok(v) => v,
            $crate::Outcome::Err(e) => return $crate::Outcome::Err(e),
            $crate::Outcome::Cancelled(r) => return $crate::Outcome::Cancelled(r),
            $crate::Outcome::Panicked(p) => return $crate::Outcome::Panicked(p),
        }
    };
}

/// Like [`try_outcome!`] but for a plain `Result`, lifting the error into `Outcome::Err`.
#[macro_export]
macro_rules! try_result {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => return $crate::Outcome::Err(e),
        }
    };
}
