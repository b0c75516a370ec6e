//! Domain Services
//!
//! Pure pricing and reward rules. No I/O; the application layer feeds
//! them configured values.

use serde::{Deserialize, Serialize};

use crate::domain::value_object::amount::Amount;
use crate::domain::value_object::vip::{VipDuration, VipLevel, VipPlan};
use crate::error::{EconomyError, EconomyResult};

/// Basis points in one whole.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// How a sale price splits between platform and seller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub price: i64,
    pub platform_fee: i64,
    pub seller_earnings: i64,
}

impl Settlement {
    /// `platform_fee = floor(price * fee_bps / 10000)`, the seller gets the
    /// rest. The fee is never credited to any wallet.
    pub fn split(price: Amount, fee_bps: u32) -> Self {
        let price = price.get();
        let fee_bps = fee_bps.min(BPS_DENOMINATOR);
        let fee = i128::from(price) * i128::from(fee_bps) / i128::from(BPS_DENOMINATOR);
        // fee <= price, so the narrowing cannot fail
        let platform_fee = i64::try_from(fee).unwrap_or(price);
        Self {
            price,
            platform_fee,
            seller_earnings: price - platform_fee,
        }
    }
}

/// Coin-to-affinity conversion per action.
///
/// Each ratio is "coins per affinity point", applied with floor division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityRules {
    pub gift_coins_per_point: i64,
    pub red_packet_coins_per_point: i64,
    pub chat_turn_gain: i32,
}

impl Default for AffinityRules {
    fn default() -> Self {
        Self {
            gift_coins_per_point: 10,
            red_packet_coins_per_point: 5,
            chat_turn_gain: 1,
        }
    }
}

impl AffinityRules {
    pub fn gift_gain(&self, coins: i64) -> i32 {
        coins_to_affinity(coins, self.gift_coins_per_point)
    }

    pub fn red_packet_gain(&self, coins: i64) -> i32 {
        coins_to_affinity(coins, self.red_packet_coins_per_point)
    }
}

fn coins_to_affinity(coins: i64, coins_per_point: i64) -> i32 {
    let points = coins.max(0) / coins_per_point.max(1);
    i32::try_from(points).unwrap_or(i32::MAX)
}

/// Daily check-in payout by streak length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInRewards {
    pub base_points: i64,
    /// `(minimum streak, points)`, highest streak first
    pub tiers: Vec<(i32, i64)>,
}

impl Default for CheckInRewards {
    fn default() -> Self {
        Self {
            base_points: 10,
            tiers: vec![(7, 30), (3, 20)],
        }
    }
}

impl CheckInRewards {
    pub fn reward_for(&self, consecutive_days: i32) -> i64 {
        self.tiers
            .iter()
            .find(|(min_streak, _)| consecutive_days >= *min_streak)
            .map_or(self.base_points, |(_, points)| *points)
    }
}

/// Points to coins conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRules {
    pub min_points: i64,
    pub points_per_coin: i64,
}

impl Default for ExchangeRules {
    fn default() -> Self {
        Self {
            min_points: 100,
            points_per_coin: 10,
        }
    }
}

/// Result of pricing an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeQuote {
    pub points_spent: Amount,
    pub coins_earned: Amount,
}

impl ExchangeRules {
    /// The full `points` are spent; coins are `floor(points / points_per_coin)`.
    pub fn quote(&self, points: i64) -> EconomyResult<ExchangeQuote> {
        if points < self.min_points {
            return Err(EconomyError::BelowMinimumExchange {
                minimum: self.min_points,
            });
        }
        let points_spent = Amount::new(points)?;
        let coins_earned = Amount::new(points / self.points_per_coin.max(1))?;
        Ok(ExchangeQuote {
            points_spent,
            coins_earned,
        })
    }
}

/// Coin price of every VIP plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VipPricing {
    /// `(level, [monthly, quarterly, yearly])`
    pub table: Vec<(VipLevel, [i64; 3])>,
}

impl Default for VipPricing {
    fn default() -> Self {
        Self {
            table: vec![
                (VipLevel::Vip, [300, 800, 2_980]),
                (VipLevel::Svip, [680, 1_800, 6_800]),
                (VipLevel::Ssvip, [1_280, 3_500, 12_800]),
            ],
        }
    }
}

impl VipPricing {
    pub fn price(&self, plan: VipPlan) -> EconomyResult<Amount> {
        let column = match plan.duration {
            VipDuration::Monthly => 0,
            VipDuration::Quarterly => 1,
            VipDuration::Yearly => 2,
        };
        let prices = self
            .table
            .iter()
            .find(|(level, _)| *level == plan.level)
            .map(|(_, prices)| prices)
            .ok_or(EconomyError::InvalidVipPlan)?;
        Amount::new(prices[column])
    }
}

/// Points paid out when an invite code is redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteRewards {
    pub inviter_points: i64,
    pub invitee_points: i64,
}

impl Default for InviteRewards {
    fn default() -> Self {
        Self {
            inviter_points: 50,
            invitee_points: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(v: i64) -> Amount {
        Amount::new(v).unwrap()
    }

    #[test]
    fn test_settlement_floors_fee() {
        let s = Settlement::split(amount(50), 1_000);
        assert_eq!((s.platform_fee, s.seller_earnings), (5, 45));

        let s = Settlement::split(amount(9), 1_000);
        assert_eq!((s.platform_fee, s.seller_earnings), (0, 9));

        let s = Settlement::split(amount(1_999), 1_000);
        assert_eq!((s.platform_fee, s.seller_earnings), (199, 1_800));
        assert_eq!(s.platform_fee + s.seller_earnings, s.price);
    }

    #[test]
    fn test_settlement_large_price() {
        let s = Settlement::split(amount(i64::MAX), 1_000);
        assert_eq!(s.platform_fee + s.seller_earnings, i64::MAX);
    }

    #[test]
    fn test_affinity_ratios() {
        let rules = AffinityRules::default();
        assert_eq!(rules.gift_gain(100), 10);
        assert_eq!(rules.gift_gain(9), 0);
        assert_eq!(rules.red_packet_gain(100), 20);
        assert_eq!(rules.red_packet_gain(4), 0);
    }

    #[test]
    fn test_check_in_tiers() {
        let rewards = CheckInRewards::default();
        assert_eq!(rewards.reward_for(1), 10);
        assert_eq!(rewards.reward_for(2), 10);
        assert_eq!(rewards.reward_for(3), 20);
        assert_eq!(rewards.reward_for(6), 20);
        assert_eq!(rewards.reward_for(7), 30);
        assert_eq!(rewards.reward_for(30), 30);
    }

    #[test]
    fn test_exchange_quote() {
        let rules = ExchangeRules::default();
        assert!(matches!(
            rules.quote(99),
            Err(EconomyError::BelowMinimumExchange { minimum: 100 })
        ));
        let quote = rules.quote(105).unwrap();
        assert_eq!(quote.points_spent.get(), 105);
        assert_eq!(quote.coins_earned.get(), 10);
    }

    #[test]
    fn test_vip_pricing() {
        let pricing = VipPricing::default();
        let price = |level: i16, duration: &'static str| {
            let plan = VipPlan::parse(level, duration).unwrap();
            pricing.price(plan).unwrap().get()
        };
        assert_eq!(price(1, "monthly"), 300);
        assert_eq!(price(2, "quarterly"), 1_800);
        assert_eq!(price(3, "yearly"), 12_800);

        let partial = VipPricing {
            table: vec![(VipLevel::Vip, [1, 2, 3])],
        };
        assert!(matches!(
            partial.price(VipPlan::parse(2, "monthly").unwrap()),
            Err(EconomyError::InvalidVipPlan)
        ));
    }
}
