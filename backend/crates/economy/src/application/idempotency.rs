//! Idempotent replay of committed outcomes.
//!
//! Both helpers must run while the caller's wallet lock is held, so two
//! requests with the same key cannot both miss the receipt.
//!
//! A receipt only replays for the request it was stored for: same operation
//! and same fingerprint (the parameters that decide what the operation
//! does). Anything else under that key is a reuse and is rejected.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use serde::{Serialize, de::DeserializeOwned};

use crate::domain::entity::receipt::Receipt;
use crate::domain::repository::EconomyTx;
use crate::domain::value_object::idempotency_key::IdempotencyKey;
use crate::error::{EconomyError, EconomyResult};

/// Stored outcome for `key`, if this exact request already committed under it.
pub(crate) async fn replay<X, T>(
    tx: &mut X,
    user_id: &UserId,
    key: Option<&IdempotencyKey>,
    operation: &str,
    fingerprint: &str,
) -> EconomyResult<Option<T>>
where
    X: EconomyTx,
    T: DeserializeOwned,
{
    let Some(key) = key else {
        return Ok(None);
    };
    match tx.find_receipt(user_id, key).await? {
        Some(receipt) if receipt.matches(operation, fingerprint) => {
            tracing::info!(user_id = %user_id, key = %key, operation, "Replaying stored outcome");
            Ok(Some(serde_json::from_value(receipt.outcome)?))
        }
        Some(_) => Err(EconomyError::IdempotencyKeyReused),
        None => Ok(None),
    }
}

/// Store `outcome` under `key` in the current unit of work.
pub(crate) async fn remember<X, T>(
    tx: &mut X,
    user_id: &UserId,
    key: Option<&IdempotencyKey>,
    operation: &str,
    fingerprint: &str,
    outcome: &T,
    now: DateTime<Utc>,
) -> EconomyResult<()>
where
    X: EconomyTx,
    T: Serialize,
{
    let Some(key) = key else {
        return Ok(());
    };
    let receipt = Receipt {
        user_id: *user_id,
        key: key.clone(),
        operation: operation.to_owned(),
        fingerprint: fingerprint.to_owned(),
        outcome: serde_json::to_value(outcome)?,
        created_at: now,
    };
    tx.insert_receipt(&receipt).await
}
