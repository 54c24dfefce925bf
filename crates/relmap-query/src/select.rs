//! Read helpers: records with their relations, scalars and raw rows.

use std::collections::HashMap;

use relmap_core::{
    Cx, Error, Executor, FromValue, Model, Outcome, Row, Value, column_to_field, try_outcome,
    try_result,
};

use crate::resolve::{resolve_many, resolve_one};

/// First row of `sql` as an `M`, with its relations loaded.
///
/// No rows is `Error::NoRows`.
#[tracing::instrument(level = "debug", skip(cx, executor, params), fields(model = M::TYPE_NAME))]
pub async fn select_one<M: Model, E: Executor>(
    cx: &Cx,
    executor: &E,
    sql: &str,
    params: &[Value],
) -> Outcome<M, Error> {
    let desc = try_result!(M::describe());
    tracing::trace!(sql = %sql, "Executing select");
    let rows = try_outcome!(executor.query(cx, sql, params).await);
    let Some(row) = rows.first() else {
        return Outcome::Err(Error::NoRows);
    };
    let mut record = try_result!(M::from_row(row));
    try_outcome!(resolve_one(cx, executor, &desc, &mut record).await);
    Outcome::Ok(record)
}

/// Look a record up by primary key.
#[tracing::instrument(level = "debug", skip(cx, executor, pk), fields(model = M::TYPE_NAME))]
pub async fn select_by_pk<M: Model, E: Executor>(
    cx: &Cx,
    executor: &E,
    pk: Value,
) -> Outcome<M, Error> {
    let desc = try_result!(M::describe());
    let Some(key) = desc.primary_key else {
        return Outcome::Err(Error::config(
            M::TYPE_NAME,
            None,
            "select_by_pk needs a primary key",
        ));
    };
    let sql = format!("SELECT * FROM {} WHERE {} = ?", desc.table, key.column);
    select_one(cx, executor, &sql, &[pk]).await
}

/// Every row of `sql` as an `M`, relations loaded in batch.
#[tracing::instrument(level = "debug", skip(cx, executor, params), fields(model = M::TYPE_NAME))]
pub async fn select_many<M: Model, E: Executor>(
    cx: &Cx,
    executor: &E,
    sql: &str,
    params: &[Value],
) -> Outcome<Vec<M>, Error> {
    let desc = try_result!(M::describe());
    tracing::trace!(sql = %sql, "Executing select");
    let rows = try_outcome!(executor.query(cx, sql, params).await);
    let mut records = try_result!(rows.iter().map(M::from_row).collect::<Result<Vec<_>, _>>());
    drop(rows);
    try_outcome!(resolve_many(cx, executor, &desc, &mut records).await);
    Outcome::Ok(records)
}

fn single_column(row: &Row) -> Result<&Value, Error> {
    if row.len() == 1 {
        row.get(0).ok_or_else(|| Error::shape("one column", "row has no columns"))
    } else {
        Err(Error::shape(
            "one column",
            format!("scalar select returned {} columns", row.len()),
        ))
    }
}

/// The single column of every row as a list of scalars.
#[tracing::instrument(level = "debug", skip(cx, executor, params))]
pub async fn select_column<T: FromValue, E: Executor>(
    cx: &Cx,
    executor: &E,
    sql: &str,
    params: &[Value],
) -> Outcome<Vec<T>, Error> {
    let rows = try_outcome!(executor.query(cx, sql, params).await);
    let values = rows
        .iter()
        .map(|row| single_column(row).and_then(T::from_value))
        .collect::<Result<Vec<_>, _>>();
    values.map_or_else(Outcome::Err, Outcome::Ok)
}

async fn select_scalar<T: FromValue, E: Executor>(
    cx: &Cx,
    executor: &E,
    sql: &str,
    params: &[Value],
) -> Outcome<T, Error> {
    tracing::trace!(sql = %sql, "Executing scalar select");
    let rows = try_outcome!(executor.query(cx, sql, params).await);
    let Some(row) = rows.first() else {
        return Outcome::Err(Error::NoRows);
    };
    let value = try_result!(single_column(row));
    T::from_value(value).map_or_else(Outcome::Err, Outcome::Ok)
}

/// First column of the first row as text.
pub async fn select_str<E: Executor>(
    cx: &Cx,
    executor: &E,
    sql: &str,
    params: &[Value],
) -> Outcome<String, Error> {
    select_scalar(cx, executor, sql, params).await
}

/// First column of the first row as an integer.
pub async fn select_int<E: Executor>(
    cx: &Cx,
    executor: &E,
    sql: &str,
    params: &[Value],
) -> Outcome<i64, Error> {
    select_scalar(cx, executor, sql, params).await
}

/// First column of the first row as a float.
pub async fn select_float<E: Executor>(
    cx: &Cx,
    executor: &E,
    sql: &str,
    params: &[Value],
) -> Outcome<f64, Error> {
    select_scalar(cx, executor, sql, params).await
}

/// Column names plus every value rendered as text; NULL renders as "".
///
/// A zero-row result still carries its column names when the driver reports
/// them through [`Executor::query_with_columns`].
pub async fn select_raw<E: Executor>(
    cx: &Cx,
    executor: &E,
    sql: &str,
    params: &[Value],
) -> Outcome<(Vec<String>, Vec<Vec<String>>), Error> {
    let (columns, rows) = try_outcome!(executor.query_with_columns(cx, sql, params).await);
    let data = rows
        .iter()
        .map(|row| {
            row.values()
                .map(|v| v.to_text().unwrap_or_default())
                .collect()
        })
        .collect();
    Outcome::Ok((columns, data))
}

/// One map per row keyed by field name; NULL columns are left out.
pub async fn select_raw_set<E: Executor>(
    cx: &Cx,
    executor: &E,
    sql: &str,
    params: &[Value],
) -> Outcome<Vec<HashMap<String, String>>, Error> {
    let rows = try_outcome!(executor.query(cx, sql, params).await);
    let sets = rows
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|(col, v)| v.to_text().map(|text| (column_to_field(col), text)))
                .collect()
        })
        .collect();
    Outcome::Ok(sets)
}
