//! Idempotency Receipt

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use serde::{Deserialize, Serialize};

use crate::domain::value_object::idempotency_key::IdempotencyKey;

/// Stored outcome of a committed operation, keyed by (user, key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub user_id: UserId,
    pub key: IdempotencyKey,
    /// Operation name, e.g. `purchase`
    pub operation: String,
    /// Request parameters the outcome was produced for
    pub fingerprint: String,
    pub outcome: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Receipt {
    /// Whether this receipt was stored for the same request.
    pub fn matches(&self, operation: &str, fingerprint: &str) -> bool {
        self.operation == operation && self.fingerprint == fingerprint
    }
}
