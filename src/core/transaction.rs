use futures::future::LocalBoxFuture;
use futures::FutureExt;
use log::{debug, error};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use crate::core::ports::repository::{Manager, TxStore};
use crate::error::Error;

/// Runs `work` inside one transaction of `manager`.
///
/// The transaction commits only when `work` returns `Ok`. An `Err`, a panic
/// inside `work`, or `deadline` running out all roll it back; a panic is
/// reported as `Error::Aborted` and the deadline as `Error::Timeout`.
/// Every call gets its own transaction; isolation between concurrent calls is
/// whatever the backend provides.
///
/// ```ignore
/// let id = run_in_transaction(&manager, deadline, move |tx| {
///     Box::pin(async move { tx.insert_application_unique(kind, insert).await })
/// })
/// .await?;
/// ```
pub async fn run_in_transaction<M, F, R>(manager: &M, deadline: Duration, work: F) -> Result<R, Error>
where
    M: Manager,
    F: for<'t> FnOnce(&'t mut M::TxStore) -> LocalBoxFuture<'t, Result<R, Error>>,
{
    let mut tx = within(deadline, manager.tx()).await?;
    let outcome = AssertUnwindSafe(tokio::time::timeout(deadline, work(&mut tx))).catch_unwind().await;
    match outcome {
        Ok(Ok(Ok(value))) => {
            tx.commit().await?;
            Ok(value)
        }
        Ok(Ok(Err(e))) => {
            debug!("rolling back transaction: {}", e);
            discard(tx).await;
            Err(e)
        }
        Ok(Err(_)) => {
            error!("transaction exceeded its deadline of {:?}, rolling back", deadline);
            discard(tx).await;
            Err(Error::Timeout(deadline))
        }
        Err(panic) => {
            let reason = panic_message(panic);
            error!("transaction work panicked, rolling back: {}", reason);
            discard(tx).await;
            Err(Error::Aborted(reason))
        }
    }
}

/// Bounds a single non-transactional store call by `deadline`.
pub async fn within<F, R>(deadline: Duration, fut: F) -> Result<R, Error>
where
    F: Future<Output = Result<R, Error>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(res) => res,
        Err(_) => Err(Error::Timeout(deadline)),
    }
}

async fn discard<T: TxStore>(tx: T) {
    // the caller sees the error that caused the rollback
    if let Err(e) = tx.rollback().await {
        error!("rollback failed: {}", e);
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        return (*s).to_owned();
    }
    if let Some(s) = panic.downcast_ref::<String>() {
        return s.clone();
    }
    "unknown panic".to_owned()
}
