//! Scoped transactions.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};

use relmap_core::{
    Connection, Cx, Error, IsolationLevel, Outcome, TransactionOps, try_outcome,
};

use crate::session::Session;

/// Future adapter that turns a panic during `poll` into an `Err(payload)`.
pub struct CatchUnwind<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> CatchUnwind<F> {
    pub fn new(future: F) -> Self {
        Self {
            inner: Box::pin(future),
        }
    }
}

impl<F: Future> Future for CatchUnwind<F> {
    type Output = Result<F::Output, Box<dyn Any + Send>>;

    fn poll(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = self.inner.as_mut();
        match catch_unwind(AssertUnwindSafe(|| inner.poll(ctx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(value)) => Poll::Ready(Ok(value)),
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

/// Run `f` inside a transaction on `conn`.
///
/// `Outcome::Ok` commits. Any other outcome rolls back and is returned
/// unchanged. A panic inside `f` rolls back and is then resumed with the
/// original payload.
#[tracing::instrument(level = "debug", skip_all)]
pub async fn run<'c, C, T, F>(
    cx: &Cx,
    conn: &'c C,
    isolation: Option<IsolationLevel>,
    f: F,
) -> Outcome<T, Error>
where
    C: Connection,
    F: AsyncFnOnce(&Session<C::Tx<'c>>) -> Outcome<T, Error>,
{
    let tx = match isolation {
        Some(level) => try_outcome!(conn.begin_with(cx, level).await),
        None => try_outcome!(conn.begin(cx).await),
    };
    let session = Session::new(tx);

    let result = CatchUnwind::new(f(&session)).await;
    let tx = session.into_inner();

    match result {
        Ok(Outcome::Ok(value)) => {
            try_outcome!(tx.commit(cx).await);
            tracing::debug!("Transaction committed");
            Outcome::Ok(value)
        }
        Ok(other) => {
            rollback(cx, tx).await;
            other
        }
        Err(payload) => {
            rollback(cx, tx).await;
            resume_unwind(payload)
        }
    }
}

async fn rollback<T: TransactionOps>(cx: &Cx, tx: T) {
    match tx.rollback(cx).await {
        Outcome::Ok(()) => tracing::debug!("Transaction rolled back"),
        Outcome::Err(e) => tracing::warn!(error = %e, "Rollback failed"),
        Outcome::Cancelled(r) => tracing::warn!(reason = ?r, "Rollback cancelled"),
        Outcome::Panicked(p) => tracing::warn!(payload = ?p, "Rollback panicked"),
    }
}
