//! VIP Purchase

use chrono::{DateTime, Months, Utc};
use kernel::id::{UserId, VipPurchaseId};
use serde::{Deserialize, Serialize};

use crate::domain::value_object::vip::{VipDuration, VipLevel, VipPlan};
use crate::error::{EconomyError, EconomyResult};

/// Append-only record of a membership bought with coins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VipPurchase {
    pub id: VipPurchaseId,
    pub user_id: UserId,
    pub level: VipLevel,
    pub duration: VipDuration,
    /// Coins
    pub price: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VipPurchase {
    /// Membership starting at `now` and running for the plan's months.
    pub fn new(user_id: UserId, plan: VipPlan, price: i64, now: DateTime<Utc>) -> EconomyResult<Self> {
        let expires_at = now
            .checked_add_months(Months::new(plan.duration.months()))
            .ok_or_else(|| EconomyError::Internal("vip expiry out of range".to_owned()))?;
        Ok(Self {
            id: VipPurchaseId::new(),
            user_id,
            level: plan.level,
            duration: plan.duration,
            price,
            expires_at,
            created_at: now,
        })
    }

    /// A membership is over once `expires_at` has passed.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
