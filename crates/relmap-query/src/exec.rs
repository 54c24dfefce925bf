//! Statement execution: pass-through, named templates and row-count checks.

use relmap_core::error::RowsAffectedError;
use relmap_core::{Cx, Error, Executor, Outcome, ParamSource, Value, try_outcome, try_result};

use crate::template::Template;

/// Execute `sql` and return the number of affected rows.
#[tracing::instrument(level = "debug", skip(cx, executor, params))]
pub async fn exec<E: Executor>(
    cx: &Cx,
    executor: &E,
    sql: &str,
    params: &[Value],
) -> Outcome<u64, Error> {
    tracing::trace!(sql = %sql, params = params.len(), "Executing statement");
    executor.execute(cx, sql, params).await
}

/// Execute a `#{name}` template with values taken from `source`.
///
/// Every name is resolved before anything runs; an unknown name is
/// `Error::Param`. A template without placeholders runs with no arguments.
#[tracing::instrument(level = "debug", skip(cx, executor, source))]
pub async fn exec_with_params<E: Executor, P: ParamSource + Sync + ?Sized>(
    cx: &Cx,
    executor: &E,
    template: &str,
    source: &P,
) -> Outcome<u64, Error> {
    let parsed = Template::parse(template);
    if !parsed.has_placeholders() {
        tracing::warn!(template = %template, "template has no #{{...}} placeholders; executing as-is");
    }
    let params = try_result!(parsed.bind(source));
    tracing::trace!(sql = %parsed.sql(), params = params.len(), "Executing template");
    executor.execute(cx, parsed.sql(), &params).await
}

/// Execute `sql` and fail unless exactly `expected` rows were affected.
///
/// The statement is not undone on a mismatch; run it inside a transaction
/// for that.
#[tracing::instrument(level = "debug", skip(cx, executor, params))]
pub async fn exec_expect_rows<E: Executor>(
    cx: &Cx,
    executor: &E,
    expected: u64,
    sql: &str,
    params: &[Value],
) -> Outcome<u64, Error> {
    let actual = try_outcome!(executor.execute(cx, sql, params).await);
    if actual != expected {
        return Outcome::Err(Error::RowsAffected(RowsAffectedError {
            sql: sql.to_string(),
            expected,
            actual,
        }));
    }
    Outcome::Ok(actual)
}
