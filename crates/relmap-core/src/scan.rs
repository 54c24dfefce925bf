//! Row Scanner.

use crate::Result;
use crate::model::Model;
use crate::naming::column_to_field;
use crate::row::{Row, with_column};

/// Bind every column of `row` into a fresh `M`.
///
/// Columns with no matching field are dropped; fields with no matching
/// column keep their default. Conversion errors carry the column name.
#[allow(clippy::result_large_err)]
pub fn scan_row<M: Model>(row: &Row) -> Result<M> {
    let mut record = M::default();
    for (column, value) in row.iter() {
        let field = column_to_field(column);
        let bound = record
            .scan_field(&field, value)
            .map_err(|e| with_column(e, column))?;
        if !bound {
            tracing::trace!(
                model = M::TYPE_NAME,
                column = %column,
                "column has no matching field; discarded"
            );
        }
    }
    Ok(record)
}
