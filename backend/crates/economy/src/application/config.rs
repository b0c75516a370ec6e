//! Application Configuration
//!
//! Configuration for the economy application layer.

use crate::domain::entity::{spend::GiftItem, wallet::WalletSeed};
use crate::domain::services::{
    AffinityRules, CheckInRewards, ExchangeRules, InviteRewards, VipPricing,
};

/// Economy application configuration
#[derive(Debug, Clone)]
pub struct EconomyConfig {
    /// Balances of a wallet opened at sign-up
    pub signup_seed: WalletSeed,
    /// Balances of a wallet created on first use
    pub lazy_seed: WalletSeed,
    /// Marketplace commission in basis points (1000 = 10%)
    pub platform_fee_bps: u32,
    pub affinity: AffinityRules,
    pub gift_catalog: Vec<GiftItem>,
    pub check_in: CheckInRewards,
    pub exchange: ExchangeRules,
    pub vip_pricing: VipPricing,
    pub invite_rewards: InviteRewards,
    /// Coins credited per recharged currency unit
    pub recharge_coins_per_unit: i64,
    pub min_red_packet: i64,
    /// Page size for history queries
    pub history_limit: i64,
    /// Marketplace browse page size
    pub page_size: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            signup_seed: WalletSeed {
                points: 100,
                coins: 50,
            },
            lazy_seed: WalletSeed::default(),
            platform_fee_bps: 1_000,
            affinity: AffinityRules::default(),
            gift_catalog: default_gift_catalog(),
            check_in: CheckInRewards::default(),
            exchange: ExchangeRules::default(),
            vip_pricing: VipPricing::default(),
            invite_rewards: InviteRewards::default(),
            recharge_coins_per_unit: 10,
            min_red_packet: 1,
            history_limit: 50,
            page_size: 20,
        }
    }
}

impl EconomyConfig {
    pub fn gift(&self, gift_id: i64) -> Option<&GiftItem> {
        self.gift_catalog.iter().find(|item| item.id == gift_id)
    }
}

fn default_gift_catalog() -> Vec<GiftItem> {
    vec![
        GiftItem::new(1, "Little Heart", "❤️", 1, "A small sign of affection"),
        GiftItem::new(2, "Rose", "🌹", 10, "A romantic rose"),
        GiftItem::new(3, "Chocolate", "🍫", 20, "Sweet chocolate"),
        GiftItem::new(4, "Diamond", "💎", 50, "A precious diamond"),
        GiftItem::new(5, "Crown", "👑", 100, "A royal crown"),
        GiftItem::new(6, "Rocket", "🚀", 500, "Off to the stars"),
        GiftItem::new(7, "Castle", "🏰", 1_000, "A dream castle"),
        GiftItem::new(8, "Planet", "🌍", 5_000, "A whole planet for you"),
    ]
}
