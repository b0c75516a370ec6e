//! In-memory Economy Store
//!
//! Committed tables sit behind one `RwLock`. A transaction takes per-key
//! locks from [`KeyedLocks`], stages its writes privately, and applies them
//! all at once on commit. Rollback (or drop) discards the staged writes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::id::{CharacterId, ListingId, UserId};
use platform::keyed_lock::KeyedLocks;
use tokio::sync::{OwnedMutexGuard, RwLock};

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
use crate::domain::repository::{
    EarningsSummary, EconomyStore, EconomyTx, ListingPage, ListingQuery, ListingSort, ListingView,
};
use crate::domain::value_object::{idempotency_key::IdempotencyKey, spend_channel::SpendChannel};
use crate::error::EconomyResult;

/// Lock slots left behind by finished transactions are pruned past this.
const LOCK_SLOT_SOFT_LIMIT: usize = 1_024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LockKey {
    Wallet(UserId),
    Listing(ListingId),
    Affinity(UserId, CharacterId),
    Character(CharacterId),
}

#[derive(Debug, Default)]
struct Tables {
    wallets: HashMap<UserId, Wallet>,
    characters: HashMap<CharacterId, Character>,
    listings: HashMap<ListingId, Listing>,
    purchases: Vec<Purchase>,
    reviews: Vec<Review>,
    affinity: HashMap<(UserId, CharacterId), AffinityRecord>,
    affinity_log: Vec<AffinityLogEntry>,
    spend_records: Vec<SpendRecord>,
    check_ins: Vec<CheckInRecord>,
    vip_purchases: Vec<VipPurchase>,
    invite_codes: HashMap<UserId, InviteCode>,
    invite_records: Vec<InviteRecord>,
    receipts: HashMap<(UserId, IdempotencyKey), Receipt>,
}

impl Tables {
    /// Apply staged writes: rows replace, append-only logs extend.
    fn absorb(&mut self, staged: Tables) {
        self.wallets.extend(staged.wallets);
        self.characters.extend(staged.characters);
        self.listings.extend(staged.listings);
        self.purchases.extend(staged.purchases);
        self.reviews.extend(staged.reviews);
        self.affinity.extend(staged.affinity);
        self.affinity_log.extend(staged.affinity_log);
        self.spend_records.extend(staged.spend_records);
        self.check_ins.extend(staged.check_ins);
        self.vip_purchases.extend(staged.vip_purchases);
        self.invite_codes.extend(staged.invite_codes);
        self.invite_records.extend(staged.invite_records);
        self.receipts.extend(staged.receipts);
    }

    fn listing_view(&self, listing: &Listing) -> ListingView {
        let character = self.characters.get(&listing.character_id);
        ListingView {
            listing: listing.clone(),
            character_name: character.map(|c| c.name.clone()).unwrap_or_default(),
            character_avatar: character.and_then(|c| c.avatar.clone()),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<Tables>,
    locks: KeyedLocks<LockKey>,
}

/// Process-local store for tests and single-node development.
#[derive(Debug, Clone, Default)]
pub struct MemoryEconomyStore {
    shared: Arc<Shared>,
}

impl MemoryEconomyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a character owned by the catalog collaborator.
    pub async fn insert_character(&self, character: Character) {
        self.shared
            .tables
            .write()
            .await
            .characters
            .insert(character.id, character);
    }

    pub async fn characters_owned_by(&self, owner_id: &UserId) -> Vec<Character> {
        let tables = self.shared.tables.read().await;
        tables
            .characters
            .values()
            .filter(|c| &c.owner_id == owner_id)
            .cloned()
            .collect()
    }
}

pub struct MemoryTx {
    shared: Arc<Shared>,
    staged: Tables,
    held: HashSet<LockKey>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl MemoryTx {
    /// Re-locking a key this transaction already holds is a no-op.
    async fn acquire(&mut self, key: LockKey) {
        if self.held.contains(&key) {
            return;
        }
        let guard = self.shared.locks.lock(key.clone()).await;
        self.held.insert(key);
        self.guards.push(guard);
    }

    fn release(self) {
        let shared = self.shared.clone();
        drop(self);
        if shared.locks.len() > LOCK_SLOT_SOFT_LIMIT {
            shared.locks.prune();
        }
    }

    async fn listing(&self, listing_id: &ListingId) -> Option<Listing> {
        match self.staged.listings.get(listing_id) {
            Some(listing) => Some(listing.clone()),
            None => self.shared.tables.read().await.listings.get(listing_id).cloned(),
        }
    }

    async fn character(&self, character_id: &CharacterId) -> Option<Character> {
        match self.staged.characters.get(character_id) {
            Some(character) => Some(character.clone()),
            None => self
                .shared
                .tables
                .read()
                .await
                .characters
                .get(character_id)
                .cloned(),
        }
    }
}

impl EconomyTx for MemoryTx {
    async fn lock_wallet(&mut self, user_id: &UserId, seed: WalletSeed) -> EconomyResult<Wallet> {
        self.acquire(LockKey::Wallet(*user_id)).await;
        if let Some(wallet) = self.staged.wallets.get(user_id) {
            return Ok(wallet.clone());
        }
        let committed = self.shared.tables.read().await.wallets.get(user_id).cloned();
        let wallet = match committed {
            Some(wallet) => wallet,
            None => {
                let wallet = Wallet::open(*user_id, seed, Utc::now());
                self.staged.wallets.insert(*user_id, wallet.clone());
                wallet
            }
        };
        Ok(wallet)
    }

    async fn save_wallet(&mut self, wallet: &Wallet) -> EconomyResult<()> {
        self.staged.wallets.insert(wallet.user_id, wallet.clone());
        Ok(())
    }

    async fn lock_listing(&mut self, listing_id: &ListingId) -> EconomyResult<Option<Listing>> {
        self.acquire(LockKey::Listing(*listing_id)).await;
        Ok(self.listing(listing_id).await)
    }

    async fn find_active_listing(
        &mut self,
        character_id: &CharacterId,
        seller_id: &UserId,
    ) -> EconomyResult<Option<Listing>> {
        let matches = |l: &Listing| {
            &l.character_id == character_id && &l.seller_id == seller_id && l.status.is_purchasable()
        };
        if let Some(listing) = self.staged.listings.values().find(|l| matches(l)) {
            return Ok(Some(listing.clone()));
        }
        let tables = self.shared.tables.read().await;
        Ok(tables
            .listings
            .values()
            .filter(|l| !self.staged.listings.contains_key(&l.id))
            .find(|l| matches(l))
            .cloned())
    }

    async fn insert_listing(&mut self, listing: &Listing) -> EconomyResult<()> {
        self.staged.listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn save_listing(&mut self, listing: &Listing) -> EconomyResult<()> {
        self.staged.listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn insert_purchase(&mut self, purchase: &Purchase) -> EconomyResult<()> {
        self.staged.purchases.push(purchase.clone());
        Ok(())
    }

    async fn has_purchase(&mut self, listing_id: &ListingId, buyer_id: &UserId) -> EconomyResult<bool> {
        let matches = |p: &Purchase| &p.listing_id == listing_id && &p.buyer_id == buyer_id;
        if self.staged.purchases.iter().any(matches) {
            return Ok(true);
        }
        Ok(self.shared.tables.read().await.purchases.iter().any(matches))
    }

    async fn has_review(&mut self, listing_id: &ListingId, reviewer_id: &UserId) -> EconomyResult<bool> {
        let matches = |r: &Review| &r.listing_id == listing_id && &r.reviewer_id == reviewer_id;
        if self.staged.reviews.iter().any(matches) {
            return Ok(true);
        }
        Ok(self.shared.tables.read().await.reviews.iter().any(matches))
    }

    async fn insert_review(&mut self, review: &Review) -> EconomyResult<()> {
        self.staged.reviews.push(review.clone());
        Ok(())
    }

    async fn review_totals(&mut self, listing_id: &ListingId) -> EconomyResult<ReviewTotals> {
        let tables = self.shared.tables.read().await;
        let totals = tables
            .reviews
            .iter()
            .chain(self.staged.reviews.iter())
            .filter(|r| &r.listing_id == listing_id)
            .fold(ReviewTotals::default(), |acc, r| ReviewTotals {
                count: acc.count + 1,
                sum: acc.sum + i64::from(r.rating.get()),
            });
        Ok(totals)
    }

    async fn lock_character(&mut self, character_id: &CharacterId) -> EconomyResult<Option<Character>> {
        self.acquire(LockKey::Character(*character_id)).await;
        Ok(self.character(character_id).await)
    }

    async fn find_character(&mut self, character_id: &CharacterId) -> EconomyResult<Option<Character>> {
        Ok(self.character(character_id).await)
    }

    async fn insert_character(&mut self, character: &Character) -> EconomyResult<()> {
        self.staged.characters.insert(character.id, character.clone());
        Ok(())
    }

    async fn lock_affinity(
        &mut self,
        user_id: &UserId,
        character_id: &CharacterId,
        now: DateTime<Utc>,
    ) -> EconomyResult<AffinityRecord> {
        self.acquire(LockKey::Affinity(*user_id, *character_id)).await;
        let pair = (*user_id, *character_id);
        if let Some(record) = self.staged.affinity.get(&pair) {
            return Ok(record.clone());
        }
        let committed = self.shared.tables.read().await.affinity.get(&pair).cloned();
        Ok(committed.unwrap_or_else(|| AffinityRecord::new(*user_id, *character_id, now)))
    }

    async fn save_affinity(&mut self, record: &AffinityRecord) -> EconomyResult<()> {
        self.staged
            .affinity
            .insert((record.user_id, record.character_id), record.clone());
        Ok(())
    }

    async fn append_affinity_log(&mut self, entry: &AffinityLogEntry) -> EconomyResult<()> {
        self.staged.affinity_log.push(entry.clone());
        Ok(())
    }

    async fn insert_spend_record(&mut self, record: &SpendRecord) -> EconomyResult<()> {
        self.staged.spend_records.push(record.clone());
        Ok(())
    }

    async fn last_check_in(&mut self, user_id: &UserId) -> EconomyResult<Option<CheckInRecord>> {
        let tables = self.shared.tables.read().await;
        Ok(tables
            .check_ins
            .iter()
            .chain(self.staged.check_ins.iter())
            .filter(|c| &c.user_id == user_id)
            .max_by_key(|c| c.check_in_date)
            .cloned())
    }

    async fn insert_check_in(&mut self, record: &CheckInRecord) -> EconomyResult<()> {
        self.staged.check_ins.push(record.clone());
        Ok(())
    }

    async fn insert_vip_purchase(&mut self, purchase: &VipPurchase) -> EconomyResult<()> {
        self.staged.vip_purchases.push(purchase.clone());
        Ok(())
    }

    async fn find_invite_code(&mut self, user_id: &UserId) -> EconomyResult<Option<InviteCode>> {
        if let Some(code) = self.staged.invite_codes.get(user_id) {
            return Ok(Some(code.clone()));
        }
        Ok(self.shared.tables.read().await.invite_codes.get(user_id).cloned())
    }

    async fn insert_invite_code(&mut self, code: &InviteCode) -> EconomyResult<()> {
        self.staged.invite_codes.insert(code.user_id, code.clone());
        Ok(())
    }

    async fn save_invite_code(&mut self, code: &InviteCode) -> EconomyResult<()> {
        self.staged.invite_codes.insert(code.user_id, code.clone());
        Ok(())
    }

    async fn find_invite_by_invitee(
        &mut self,
        invitee_id: &UserId,
    ) -> EconomyResult<Option<InviteRecord>> {
        let tables = self.shared.tables.read().await;
        Ok(tables
            .invite_records
            .iter()
            .chain(self.staged.invite_records.iter())
            .find(|r| &r.invitee_id == invitee_id)
            .cloned())
    }

    async fn insert_invite_record(&mut self, record: &InviteRecord) -> EconomyResult<()> {
        self.staged.invite_records.push(record.clone());
        Ok(())
    }

    async fn find_receipt(
        &mut self,
        user_id: &UserId,
        key: &IdempotencyKey,
    ) -> EconomyResult<Option<Receipt>> {
        let id = (*user_id, key.clone());
        if let Some(receipt) = self.staged.receipts.get(&id) {
            return Ok(Some(receipt.clone()));
        }
        Ok(self.shared.tables.read().await.receipts.get(&id).cloned())
    }

    async fn insert_receipt(&mut self, receipt: &Receipt) -> EconomyResult<()> {
        self.staged
            .receipts
            .insert((receipt.user_id, receipt.key.clone()), receipt.clone());
        Ok(())
    }

    async fn commit(mut self) -> EconomyResult<()> {
        let staged = std::mem::take(&mut self.staged);
        self.shared.tables.write().await.absorb(staged);
        self.release();
        Ok(())
    }

    async fn rollback(self) -> EconomyResult<()> {
        self.release();
        Ok(())
    }
}

fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

impl EconomyStore for MemoryEconomyStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> EconomyResult<MemoryTx> {
        Ok(MemoryTx {
            shared: self.shared.clone(),
            staged: Tables::default(),
            held: HashSet::new(),
            guards: Vec::new(),
        })
    }

    async fn find_wallet(&self, user_id: &UserId) -> EconomyResult<Option<Wallet>> {
        Ok(self.shared.tables.read().await.wallets.get(user_id).cloned())
    }

    async fn find_character(&self, character_id: &CharacterId) -> EconomyResult<Option<Character>> {
        Ok(self
            .shared
            .tables
            .read()
            .await
            .characters
            .get(character_id)
            .cloned())
    }

    async fn find_listing(&self, listing_id: &ListingId) -> EconomyResult<Option<Listing>> {
        Ok(self.shared.tables.read().await.listings.get(listing_id).cloned())
    }

    async fn browse_listings(&self, query: &ListingQuery) -> EconomyResult<ListingPage> {
        let tables = self.shared.tables.read().await;
        let term = query.search_term();
        let mut views: Vec<ListingView> = tables
            .listings
            .values()
            .filter(|l| l.status.is_purchasable())
            .map(|l| tables.listing_view(l))
            .filter(|v| {
                term.as_deref()
                    .is_none_or(|t| v.character_name.to_lowercase().contains(t))
            })
            .collect();

        views.sort_by(|a, b| {
            let (a, b) = (&a.listing, &b.listing);
            let primary = match query.sort {
                ListingSort::Hot => b.sales_count.cmp(&a.sales_count),
                ListingSort::Rating => b.rating.total_cmp(&a.rating),
                ListingSort::PriceAsc => a.price.cmp(&b.price),
                ListingSort::PriceDesc => b.price.cmp(&a.price),
                ListingSort::Newest => std::cmp::Ordering::Equal,
            };
            primary.then_with(|| b.created_at.cmp(&a.created_at))
        });

        let total = views.len() as i64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = views
            .into_iter()
            .skip(offset)
            .take(query.page_size as usize)
            .collect();

        Ok(ListingPage {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    async fn listings_by_seller(&self, seller_id: &UserId) -> EconomyResult<Vec<ListingView>> {
        let tables = self.shared.tables.read().await;
        let mut views: Vec<ListingView> = tables
            .listings
            .values()
            .filter(|l| &l.seller_id == seller_id)
            .map(|l| tables.listing_view(l))
            .collect();
        newest_first(&mut views, |v| v.listing.created_at);
        Ok(views)
    }

    async fn purchases_by_buyer(&self, buyer_id: &UserId) -> EconomyResult<Vec<Purchase>> {
        let tables = self.shared.tables.read().await;
        let mut purchases: Vec<Purchase> = tables
            .purchases
            .iter()
            .filter(|p| &p.buyer_id == buyer_id)
            .cloned()
            .collect();
        newest_first(&mut purchases, |p| p.created_at);
        Ok(purchases)
    }

    async fn seller_earnings(&self, seller_id: &UserId) -> EconomyResult<EarningsSummary> {
        let tables = self.shared.tables.read().await;
        let sales: Vec<&Purchase> = tables
            .purchases
            .iter()
            .filter(|p| &p.seller_id == seller_id)
            .collect();
        let characters: HashSet<CharacterId> = sales.iter().map(|p| p.character_id).collect();
        Ok(EarningsSummary {
            total_sales: sales.len() as i64,
            total_earnings: sales.iter().map(|p| p.seller_earnings).sum(),
            unique_characters: characters.len() as i64,
        })
    }

    async fn reviews_for_listing(&self, listing_id: &ListingId) -> EconomyResult<Vec<Review>> {
        let tables = self.shared.tables.read().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .iter()
            .filter(|r| &r.listing_id == listing_id)
            .cloned()
            .collect();
        newest_first(&mut reviews, |r| r.created_at);
        Ok(reviews)
    }

    async fn find_affinity(
        &self,
        user_id: &UserId,
        character_id: &CharacterId,
    ) -> EconomyResult<Option<AffinityRecord>> {
        let tables = self.shared.tables.read().await;
        Ok(tables.affinity.get(&(*user_id, *character_id)).cloned())
    }

    async fn affinity_log(
        &self,
        user_id: &UserId,
        character_id: &CharacterId,
        limit: i64,
    ) -> EconomyResult<Vec<AffinityLogEntry>> {
        let tables = self.shared.tables.read().await;
        // insertion order is commit order, so reverse it for newest first
        Ok(tables
            .affinity_log
            .iter()
            .rev()
            .filter(|e| &e.user_id == user_id && &e.character_id == character_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn spend_records(
        &self,
        user_id: &UserId,
        channel: Option<SpendChannel>,
        limit: i64,
    ) -> EconomyResult<Vec<SpendRecord>> {
        let tables = self.shared.tables.read().await;
        Ok(tables
            .spend_records
            .iter()
            .rev()
            .filter(|r| &r.user_id == user_id && channel.is_none_or(|c| r.channel == c))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn vip_purchases(&self, user_id: &UserId, limit: i64) -> EconomyResult<Vec<VipPurchase>> {
        let tables = self.shared.tables.read().await;
        Ok(tables
            .vip_purchases
            .iter()
            .rev()
            .filter(|p| &p.user_id == user_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn find_invite_code_by_code(&self, code: &str) -> EconomyResult<Option<InviteCode>> {
        let tables = self.shared.tables.read().await;
        Ok(tables.invite_codes.values().find(|c| c.code == code).cloned())
    }

    async fn invites_by_inviter(
        &self,
        inviter_id: &UserId,
        limit: i64,
    ) -> EconomyResult<Vec<InviteRecord>> {
        let tables = self.shared.tables.read().await;
        Ok(tables
            .invite_records
            .iter()
            .rev()
            .filter(|r| &r.inviter_id == inviter_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }
}
