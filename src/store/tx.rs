use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, error};

use crate::{error::StoreError, store::bounded};

/// A store that can open transactions.
///
/// Implementations must roll back a `Tx` that is dropped without being
/// committed. The orchestrator relies on that for panics and for futures
/// dropped mid-flight.
#[async_trait]
pub trait TxBackend: Send + Sync {
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;
    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError>;
}

/// Runs `work` inside one transaction.
///
/// Commits when `work` succeeds and returns the commit error if that fails.
/// When `work` fails or exceeds `limit`, the transaction is rolled back and
/// the original error (or `Timeout`) is returned. `work` must not open a
/// transaction of its own; anything it calls takes the `tx` it was handed.
pub async fn run_in_transaction<B, T, F>(
    backend: &B,
    limit: Duration,
    work: F,
) -> Result<T, StoreError>
where
    B: TxBackend,
    T: Send,
    F: for<'t> FnOnce(&'t B, &'t mut B::Tx) -> BoxFuture<'t, Result<T, StoreError>> + Send,
{
    let mut tx = bounded(limit, backend.begin()).await?;

    let outcome = match tokio::time::timeout(limit, work(backend, &mut tx)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(StoreError::Timeout),
    };

    match outcome {
        Ok(value) => {
            bounded(limit, backend.commit(tx)).await?;
            debug!("transaction committed");
            Ok(value)
        }
        Err(err) => {
            match tokio::time::timeout(limit, backend.rollback(tx)).await {
                Ok(Ok(())) => debug!(error = %err, "transaction rolled back"),
                Ok(Err(rollback_err)) => {
                    error!(error = %rollback_err, cause = %err, "rollback failed")
                }
                Err(_) => error!(cause = %err, "rollback timed out"),
            }
            Err(err)
        }
    }
}
