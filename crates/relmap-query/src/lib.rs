//! Relation loading and statement execution for relmap.
//!
//! Everything here is written against the driver-agnostic
//! [`Executor`](relmap_core::Executor) trait:
//!
//! - [`resolve`] - single-parent and batched relation loading
//! - [`select`] - record, scalar and raw reads
//! - [`insert`] - single and multi-row inserts with generated keys
//! - [`exec`] - pass-through, `#{name}` templates and row-count assertions
//! - [`transaction`] - commit/rollback scoping with panic propagation
//! - [`Session`] - all of the above bound to one executor

pub mod exec;
pub mod insert;
pub mod resolve;
pub mod select;
pub mod session;
pub mod template;
pub mod transaction;

pub use resolve::{resolve_many, resolve_one};
pub use session::Session;
pub use template::Template;
pub use transaction::CatchUnwind;
