//! INSERT builders for single records and homogeneous batches.

use relmap_core::{
    Cx, Descriptor, Error, Executor, FieldInfo, Model, Outcome, Value, try_outcome, try_result,
};

/// `INSERT INTO t (a, b) VALUES (?, ?), (?, ?)` for `rows` rows.
fn build_insert(table: &str, fields: &[&FieldInfo], rows: usize) -> String {
    if fields.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", table);
    }
    let columns: Vec<&str> = fields.iter().map(|f| f.column).collect();
    let tuple = format!("({})", vec!["?"; fields.len()].join(", "));
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        columns.join(", "),
        vec![tuple; rows].join(", ")
    )
}

#[allow(clippy::result_large_err)]
fn push_values<M: Model>(record: &M, fields: &[&FieldInfo], out: &mut Vec<Value>) -> Result<(), Error> {
    for field in fields {
        let value = record.field_value(field.name).ok_or_else(|| {
            Error::shape(
                "persisted field",
                format!("{} has no value for field {}", M::TYPE_NAME, field.name),
            )
        })?;
        out.push(value);
    }
    Ok(())
}

/// Insert one record. With an auto-increment key the generated id is
/// written back into the record.
#[tracing::instrument(level = "debug", skip_all, fields(model = M::TYPE_NAME))]
pub async fn insert<M: Model, E: Executor>(cx: &Cx, executor: &E, record: &mut M) -> Outcome<(), Error> {
    let desc = try_result!(Descriptor::of::<M>());
    let fields: Vec<&FieldInfo> = desc.insert_fields().collect();
    let sql = build_insert(desc.table, &fields, 1);
    let mut params = Vec::with_capacity(fields.len());
    try_result!(push_values(record, &fields, &mut params));
    tracing::trace!(sql = %sql, "Executing insert");

    if desc.auto_increment {
        let id = try_outcome!(executor.insert(cx, &sql, &params).await);
        try_result!(record.set_generated_key(id));
    } else {
        try_outcome!(executor.execute(cx, &sql, &params).await);
    }
    Outcome::Ok(())
}

/// Insert every record with one multi-row `VALUES` statement.
///
/// With an auto-increment key, record `i` receives `first_id + i`. That
/// relies on the engine handing out contiguous ids within one statement
/// and is engine-specific; it does not hold under concurrent
/// auto-increment contention.
#[tracing::instrument(level = "debug", skip_all, fields(model = M::TYPE_NAME, count = records.len()))]
pub async fn insert_batch<M: Model, E: Executor>(
    cx: &Cx,
    executor: &E,
    records: &mut [M],
) -> Outcome<(), Error> {
    if records.is_empty() {
        return Outcome::Ok(());
    }

    let desc = try_result!(Descriptor::of::<M>());
    let fields: Vec<&FieldInfo> = desc.insert_fields().collect();
    if fields.is_empty() && records.len() > 1 {
        return Outcome::Err(Error::shape(
            "insertable columns",
            format!("{} has no columns to batch-insert", M::TYPE_NAME),
        ));
    }

    let sql = build_insert(desc.table, &fields, records.len());
    let mut params = Vec::with_capacity(fields.len() * records.len());
    for record in records.iter() {
        try_result!(push_values(record, &fields, &mut params));
    }
    tracing::trace!(sql = %sql, "Executing batch insert");

    if desc.auto_increment {
        let first_id = try_outcome!(executor.insert(cx, &sql, &params).await);
        for (offset, record) in (0_i64..).zip(records.iter_mut()) {
            try_result!(record.set_generated_key(first_id + offset));
        }
    } else {
        try_outcome!(executor.execute(cx, &sql, &params).await);
    }
    Outcome::Ok(())
}
