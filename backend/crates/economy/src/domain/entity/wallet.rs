//! Wallet Entity

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use serde::{Deserialize, Serialize};

use crate::domain::value_object::{amount::Amount, currency::Currency};
use crate::error::{EconomyError, EconomyResult};

/// Starting balances for a newly opened wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletSeed {
    pub points: i64,
    pub coins: i64,
}

/// Both balances at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub points: i64,
    pub coins: i64,
}

/// One wallet per user.
///
/// Balances never go negative. Lifetime counters only grow and are updated
/// by the same call that moves the balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user_id: UserId,
    pub points: i64,
    pub coins: i64,
    pub total_points_earned: i64,
    pub total_coins_earned: i64,
    pub total_coins_spent: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn open(user_id: UserId, seed: WalletSeed, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            points: seed.points.max(0),
            coins: seed.coins.max(0),
            total_points_earned: 0,
            total_coins_earned: 0,
            total_coins_spent: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn balance(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Points => self.points,
            Currency::Coins => self.coins,
        }
    }

    pub fn balances(&self) -> Balance {
        Balance {
            points: self.points,
            coins: self.coins,
        }
    }

    pub fn credit(
        &mut self,
        currency: Currency,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> EconomyResult<()> {
        let delta = amount.get();
        match currency {
            Currency::Points => {
                self.points = checked_add(self.points, delta)?;
                self.total_points_earned = checked_add(self.total_points_earned, delta)?;
            }
            Currency::Coins => {
                self.coins = checked_add(self.coins, delta)?;
                self.total_coins_earned = checked_add(self.total_coins_earned, delta)?;
            }
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn debit(
        &mut self,
        currency: Currency,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> EconomyResult<()> {
        let delta = amount.get();
        let available = self.balance(currency);
        if available < delta {
            return Err(EconomyError::InsufficientFunds {
                currency,
                required: delta,
                available,
            });
        }
        match currency {
            Currency::Points => self.points = available - delta,
            Currency::Coins => {
                self.coins = available - delta;
                self.total_coins_spent = checked_add(self.total_coins_spent, delta)?;
            }
        }
        self.updated_at = now;
        Ok(())
    }
}

fn checked_add(lhs: i64, rhs: i64) -> EconomyResult<i64> {
    lhs.checked_add(rhs).ok_or(EconomyError::InvalidAmount)
}
