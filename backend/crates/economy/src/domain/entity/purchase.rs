//! Purchase Entity

use chrono::{DateTime, Utc};
use kernel::id::{CharacterId, ListingId, PurchaseId, UserId};
use serde::{Deserialize, Serialize};

use crate::domain::entity::listing::Listing;
use crate::domain::services::Settlement;

/// Immutable record of one completed marketplace sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: PurchaseId,
    pub listing_id: ListingId,
    /// The listed (source) character
    pub character_id: CharacterId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub price: i64,
    pub platform_fee: i64,
    pub seller_earnings: i64,
    /// The buyer's copy
    pub cloned_character_id: CharacterId,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    pub fn record(
        listing: &Listing,
        buyer_id: UserId,
        settlement: Settlement,
        cloned_character_id: CharacterId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PurchaseId::new(),
            listing_id: listing.id,
            character_id: listing.character_id,
            buyer_id,
            seller_id: listing.seller_id,
            price: settlement.price,
            platform_fee: settlement.platform_fee,
            seller_earnings: settlement.seller_earnings,
            cloned_character_id,
            created_at: now,
        }
    }
}
