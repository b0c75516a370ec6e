//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in the
//! infrastructure layer.
//!
//! Writes only happen inside an [`EconomyTx`]. The `lock_*` methods take a
//! per-key exclusive lock that is held until `commit` or `rollback`;
//! callers acquire them in the order wallets (ascending user id), listing,
//! affinity pair, character.

use chrono::{DateTime, Utc};
use kernel::id::{CharacterId, ListingId, UserId};
use serde::{Deserialize, Serialize};

use crate::domain::entity::{
    affinity::{AffinityLogEntry, AffinityRecord},
    character::Character,
    check_in::CheckInRecord,
    invite::{InviteCode, InviteRecord},
    listing::{Listing, ReviewTotals},
    purchase::Purchase,
    receipt::Receipt,
    review::Review,
    spend::SpendRecord,
    vip::VipPurchase,
    wallet::{Wallet, WalletSeed},
};
use crate::domain::value_object::{idempotency_key::IdempotencyKey, spend_channel::SpendChannel};
use crate::error::EconomyResult;

/// Marketplace ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingSort {
    /// Most sales first
    #[default]
    Hot,
    Rating,
    PriceAsc,
    PriceDesc,
    Newest,
}

impl ListingSort {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "hot" => Some(Self::Hot),
            "rating" => Some(Self::Rating),
            "price_asc" => Some(Self::PriceAsc),
            "price_desc" => Some(Self::PriceDesc),
            "newest" => Some(Self::Newest),
            _ => None,
        }
    }
}

/// Marketplace browse parameters. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingQuery {
    /// Case-insensitive substring of the character name
    pub search: Option<String>,
    pub sort: ListingSort,
    pub page: u32,
    pub page_size: u32,
}

impl ListingQuery {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * i64::from(self.page_size)
    }

    /// Search term, trimmed and lowercased; `None` when blank.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }
}

/// A listing with the display fields of its character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    #[serde(flatten)]
    pub listing: Listing,
    pub character_name: String,
    pub character_avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub items: Vec<ListingView>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// Seller statistics over completed sales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsSummary {
    pub total_sales: i64,
    pub total_earnings: i64,
    pub unique_characters: i64,
}

/// One unit of work. Dropping without `commit` discards every write.
#[trait_variant::make(EconomyTx: Send)]
pub trait LocalEconomyTx {
    // wallets

    /// Lock the wallet, creating it from `seed` when absent.
    async fn lock_wallet(&mut self, user_id: &UserId, seed: WalletSeed) -> EconomyResult<Wallet>;

    async fn save_wallet(&mut self, wallet: &Wallet) -> EconomyResult<()>;

    // listings

    async fn lock_listing(&mut self, listing_id: &ListingId) -> EconomyResult<Option<Listing>>;

    async fn find_active_listing(
        &mut self,
        character_id: &CharacterId,
        seller_id: &UserId,
    ) -> EconomyResult<Option<Listing>>;

    async fn insert_listing(&mut self, listing: &Listing) -> EconomyResult<()>;

    async fn save_listing(&mut self, listing: &Listing) -> EconomyResult<()>;

    async fn insert_purchase(&mut self, purchase: &Purchase) -> EconomyResult<()>;

    async fn has_purchase(&mut self, listing_id: &ListingId, buyer_id: &UserId)
    -> EconomyResult<bool>;

    async fn has_review(&mut self, listing_id: &ListingId, reviewer_id: &UserId)
    -> EconomyResult<bool>;

    async fn insert_review(&mut self, review: &Review) -> EconomyResult<()>;

    /// Totals including writes made earlier in this unit of work.
    async fn review_totals(&mut self, listing_id: &ListingId) -> EconomyResult<ReviewTotals>;

    // characters

    async fn lock_character(&mut self, character_id: &CharacterId)
    -> EconomyResult<Option<Character>>;

    /// Unlocked read.
    async fn find_character(&mut self, character_id: &CharacterId)
    -> EconomyResult<Option<Character>>;

    async fn insert_character(&mut self, character: &Character) -> EconomyResult<()>;

    // affinity

    /// Lock the pair's record, creating it at zero when absent.
    async fn lock_affinity(
        &mut self,
        user_id: &UserId,
        character_id: &CharacterId,
        now: DateTime<Utc>,
    ) -> EconomyResult<AffinityRecord>;

    async fn save_affinity(&mut self, record: &AffinityRecord) -> EconomyResult<()>;

    async fn append_affinity_log(&mut self, entry: &AffinityLogEntry) -> EconomyResult<()>;

    // rewards and spends

    async fn insert_spend_record(&mut self, record: &SpendRecord) -> EconomyResult<()>;

    async fn last_check_in(&mut self, user_id: &UserId) -> EconomyResult<Option<CheckInRecord>>;

    async fn insert_check_in(&mut self, record: &CheckInRecord) -> EconomyResult<()>;

    async fn insert_vip_purchase(&mut self, purchase: &VipPurchase) -> EconomyResult<()>;

    // invites; the owner's wallet lock serializes writes to a code

    async fn find_invite_code(&mut self, user_id: &UserId) -> EconomyResult<Option<InviteCode>>;

    async fn insert_invite_code(&mut self, code: &InviteCode) -> EconomyResult<()>;

    async fn save_invite_code(&mut self, code: &InviteCode) -> EconomyResult<()>;

    async fn find_invite_by_invitee(&mut self, invitee_id: &UserId)
    -> EconomyResult<Option<InviteRecord>>;

    async fn insert_invite_record(&mut self, record: &InviteRecord) -> EconomyResult<()>;

    // idempotency

    async fn find_receipt(
        &mut self,
        user_id: &UserId,
        key: &IdempotencyKey,
    ) -> EconomyResult<Option<Receipt>>;

    async fn insert_receipt(&mut self, receipt: &Receipt) -> EconomyResult<()>;

    async fn commit(self) -> EconomyResult<()>;

    async fn rollback(self) -> EconomyResult<()>;
}

/// Durable economy store: read queries plus the unit-of-work factory.
#[trait_variant::make(EconomyStore: Send)]
pub trait LocalEconomyStore {
    type Tx: EconomyTx + Send;

    async fn begin(&self) -> EconomyResult<Self::Tx>;

    async fn find_wallet(&self, user_id: &UserId) -> EconomyResult<Option<Wallet>>;

    async fn find_character(&self, character_id: &CharacterId) -> EconomyResult<Option<Character>>;

    async fn find_listing(&self, listing_id: &ListingId) -> EconomyResult<Option<Listing>>;

    /// Active listings only.
    async fn browse_listings(&self, query: &ListingQuery) -> EconomyResult<ListingPage>;

    /// Every listing of the seller, newest first.
    async fn listings_by_seller(&self, seller_id: &UserId) -> EconomyResult<Vec<ListingView>>;

    /// Newest first.
    async fn purchases_by_buyer(&self, buyer_id: &UserId) -> EconomyResult<Vec<Purchase>>;

    async fn seller_earnings(&self, seller_id: &UserId) -> EconomyResult<EarningsSummary>;

    /// Newest first.
    async fn reviews_for_listing(&self, listing_id: &ListingId) -> EconomyResult<Vec<Review>>;

    async fn find_affinity(
        &self,
        user_id: &UserId,
        character_id: &CharacterId,
    ) -> EconomyResult<Option<AffinityRecord>>;

    /// Newest first.
    async fn affinity_log(
        &self,
        user_id: &UserId,
        character_id: &CharacterId,
        limit: i64,
    ) -> EconomyResult<Vec<AffinityLogEntry>>;

    /// Newest first, optionally filtered by channel.
    async fn spend_records(
        &self,
        user_id: &UserId,
        channel: Option<SpendChannel>,
        limit: i64,
    ) -> EconomyResult<Vec<SpendRecord>>;

    /// Newest first.
    async fn vip_purchases(&self, user_id: &UserId, limit: i64) -> EconomyResult<Vec<VipPurchase>>;

    /// Code lookup by its normalized text.
    async fn find_invite_code_by_code(&self, code: &str) -> EconomyResult<Option<InviteCode>>;

    /// Newest first.
    async fn invites_by_inviter(
        &self,
        inviter_id: &UserId,
        limit: i64,
    ) -> EconomyResult<Vec<InviteRecord>>;
}
