//! Schema support for relmap.
//!
//! - [`introspect`] - column metadata for SQLite and MySQL tables
//! - [`registry`] - registered record types: lookup, column checks and truncation

pub mod introspect;
pub mod registry;

pub use introspect::{ColumnMeta, Dialect, Introspector};
pub use registry::{TableEntry, TableRegistry};
