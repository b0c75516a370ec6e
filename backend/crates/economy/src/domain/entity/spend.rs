//! Gift and Red-Packet Entities

use chrono::{DateTime, Utc};
use kernel::id::{CharacterId, SpendRecordId, UserId};
use serde::{Deserialize, Serialize};

use crate::domain::value_object::spend_channel::SpendChannel;

/// One entry of the gift catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftItem {
    pub id: i64,
    pub name: String,
    pub icon: String,
    /// Coins per unit
    pub price: i64,
    pub description: String,
}

impl GiftItem {
    pub fn new(id: i64, name: &str, icon: &str, price: i64, description: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            icon: icon.to_owned(),
            price,
            description: description.to_owned(),
        }
    }
}

/// Append-only record of coins spent on a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendRecord {
    pub id: SpendRecordId,
    pub user_id: UserId,
    pub character_id: CharacterId,
    pub channel: SpendChannel,
    /// Catalog item, gifts only
    pub gift_id: Option<i64>,
    pub quantity: i64,
    pub coins_spent: i64,
    pub affinity_gained: i32,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}
