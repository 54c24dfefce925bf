//! Model trait for tag-driven struct mapping.
//!
//! The `Model` trait is the contract between a record type and the scanner,
//! resolver and executor. It is normally derived with `#[derive(Model)]`
//! from `relmap-macros`; hand-written impls are supported and validated the
//! same way at descriptor time.

use crate::Result;
use crate::descriptor::{Descriptor, FieldInfo, RelationDecl};
use crate::error::Error;
use crate::row::Row;
use crate::value::Value;

/// Trait for types that map to a database table.
///
/// ```ignore
/// use relmap::Model;
///
/// #[derive(Model, Default)]
/// struct User {
///     #[relmap(primary_key, auto_increment)]
///     id: i64,
///     name: String,
///     #[relmap(relation = "has_many", table = "post")]
///     posts: Vec<Post>,
/// }
/// ```
pub trait Model: Sized + Default + Send + Sync + 'static {
    /// The Rust type name.
    const TYPE_NAME: &'static str;

    /// The database table name.
    const TABLE_NAME: &'static str;

    /// Field metadata in declaration order.
    fn fields() -> &'static [FieldInfo];

    /// Relation declarations in declaration order.
    fn relations() -> &'static [RelationDecl] {
        &[]
    }

    /// Bind `value` into the field called `field` (Field Mapper form).
    ///
    /// Returns `Ok(false)` when the type has no such persisted field.
    #[allow(clippy::result_large_err)]
    fn scan_field(&mut self, field: &str, value: &Value) -> Result<bool>;

    /// Current value of a persisted field, `None` if there is no such field.
    fn field_value(&self, field: &str) -> Option<Value>;

    /// Store the id generated by an INSERT into the primary key.
    #[allow(clippy::result_large_err)]
    fn set_generated_key(&mut self, id: i64) -> Result<()> {
        let _ = id;
        Err(Error::config(
            Self::TYPE_NAME,
            None,
            "type has no auto-increment primary key",
        ))
    }

    /// Populate the relation field `field` from already fetched target rows.
    ///
    /// Single references take the last row; collections take every row in
    /// order. Every row is scanned, so a bad row fails the call even when a
    /// later one would win.
    #[allow(clippy::result_large_err)]
    fn assign_related(&mut self, field: &str, rows: &[&Row]) -> Result<()> {
        let _ = rows;
        Err(Error::shape(
            "relation field",
            format!("{}.{} is not a relation field", Self::TYPE_NAME, field),
        ))
    }

    /// Build a record from a row through the Row Scanner.
    #[allow(clippy::result_large_err)]
    fn from_row(row: &Row) -> Result<Self> {
        crate::scan::scan_row(row)
    }

    /// Build and validate this type's descriptor.
    #[allow(clippy::result_large_err)]
    fn describe() -> Result<Descriptor> {
        Descriptor::of::<Self>()
    }
}
