//! Application Layer
//!
//! The four economy services. Each public operation runs as one unit of
//! work: begin, do the work against the transaction, then [`finish`].

pub mod affinity;
pub mod config;
pub mod gifting;
pub(crate) mod idempotency;
pub mod ledger;
pub mod marketplace;

use crate::domain::repository::EconomyTx;
use crate::error::EconomyResult;

/// Commit on success, roll back on failure. A failed rollback is logged
/// and the original error is returned.
pub(crate) async fn finish<X, T>(tx: X, result: EconomyResult<T>) -> EconomyResult<T>
where
    X: EconomyTx,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
