//! Marketplace Engine
//!
//! Listing lifecycle, purchase settlement and reviews.
//!
//! A purchase is one unit of work: coin movement, the purchase record, the
//! listing update and the buyer's character copy commit together or not at
//! all.

use std::sync::Arc;

use chrono::Utc;
use kernel::id::{CharacterId, ListingId, UserId};
use serde::{Deserialize, Serialize};

use crate::application::config::EconomyConfig;
use crate::application::finish;
use crate::application::idempotency::{remember, replay};
use crate::application::ledger::{lock_pair, settle_in};
use crate::domain::entity::{
    listing::Listing, purchase::Purchase, review::Review, wallet::Balance,
};
use crate::domain::repository::{
    EarningsSummary, EconomyStore, EconomyTx, ListingPage, ListingQuery, ListingSort, ListingView,
};
use crate::domain::services::Settlement;
use crate::domain::value_object::{
    amount::Amount, idempotency_key::IdempotencyKey, rating::Rating,
};
use crate::error::{EconomyError, EconomyResult};

const PURCHASE: &str = "purchase";

#[derive(Debug, Clone)]
pub struct CreateListingInput {
    pub character_id: CharacterId,
    pub seller_id: UserId,
    pub price: i64,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct UpdateListingInput {
    pub listing_id: ListingId,
    pub seller_id: UserId,
    pub price: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PurchaseInput {
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOutcome {
    pub purchase: Purchase,
    pub buyer_balance: Balance,
}

#[derive(Debug, Clone)]
pub struct ReviewInput {
    pub listing_id: ListingId,
    pub reviewer_id: UserId,
    pub rating: i16,
    pub comment: String,
}

/// Browse parameters as received from the caller.
#[derive(Debug, Clone, Default)]
pub struct BrowseInput {
    pub search: Option<String>,
    pub sort: ListingSort,
    pub page: u32,
}

pub struct MarketplaceEngine<S>
where
    S: EconomyStore,
{
    store: Arc<S>,
    config: Arc<EconomyConfig>,
}

impl<S> MarketplaceEngine<S>
where
    S: EconomyStore,
{
    pub fn new(store: Arc<S>, config: Arc<EconomyConfig>) -> Self {
        Self { store, config }
    }

    pub async fn create_listing(&self, input: CreateListingInput) -> EconomyResult<Listing> {
        Listing::validate_price(input.price)?;

        let mut tx = self.store.begin().await?;
        let result: EconomyResult<_> = async {
            // serializes concurrent listings of one character
            let character = tx
                .lock_character(&input.character_id)
                .await?
                .ok_or(EconomyError::NotFound("character"))?;
            if character.owner_id != input.seller_id {
                return Err(EconomyError::NotOwner("character"));
            }
            if tx
                .find_active_listing(&input.character_id, &input.seller_id)
                .await?
                .is_some()
            {
                return Err(EconomyError::AlreadyListed);
            }

            let listing = Listing::new(
                input.character_id,
                input.seller_id,
                input.price,
                input.description,
                Utc::now(),
            )?;
            tx.insert_listing(&listing).await?;
            Ok(listing)
        }
        .await;
        let listing = finish(tx, result).await?;

        tracing::info!(
            listing_id = %listing.id,
            character_id = %listing.character_id,
            seller_id = %listing.seller_id,
            price = listing.price,
            "Listing created"
        );
        Ok(listing)
    }

    /// Change price and/or description of an active listing.
    pub async fn update_listing(&self, input: UpdateListingInput) -> EconomyResult<Listing> {
        let mut tx = self.store.begin().await?;
        let result: EconomyResult<_> = async {
            let mut listing = tx
                .lock_listing(&input.listing_id)
                .await?
                .ok_or(EconomyError::NotFound("listing"))?;
            listing.ensure_owned_by(&input.seller_id)?;
            listing.update_terms(input.price, input.description, Utc::now())?;
            tx.save_listing(&listing).await?;
            Ok(listing)
        }
        .await;
        let listing = finish(tx, result).await?;

        tracing::info!(listing_id = %listing.id, price = listing.price, "Listing updated");
        Ok(listing)
    }

    /// Withdraw a listing. Sold or already delisted listings are returned
    /// unchanged.
    pub async fn delist(&self, listing_id: &ListingId, seller_id: &UserId) -> EconomyResult<Listing> {
        let mut tx = self.store.begin().await?;
        let result: EconomyResult<_> = async {
            let mut listing = tx
                .lock_listing(listing_id)
                .await?
                .ok_or(EconomyError::NotFound("listing"))?;
            listing.ensure_owned_by(seller_id)?;
            if listing.delist(Utc::now()) {
                tx.save_listing(&listing).await?;
            }
            Ok(listing)
        }
        .await;
        let listing = finish(tx, result).await?;

        tracing::info!(listing_id = %listing.id, status = %listing.status, "Listing delisted");
        Ok(listing)
    }

    pub async fn purchase(&self, input: PurchaseInput) -> EconomyResult<PurchaseOutcome> {
        let key = input.idempotency_key.map(IdempotencyKey::new).transpose()?;

        let mut tx = self.store.begin().await?;
        let result = self
            .purchase_in(&mut tx, &input.listing_id, &input.buyer_id, key.as_ref())
            .await;
        let outcome = finish(tx, result).await?;

        tracing::info!(
            listing_id = %outcome.purchase.listing_id,
            buyer_id = %outcome.purchase.buyer_id,
            seller_id = %outcome.purchase.seller_id,
            price = outcome.purchase.price,
            platform_fee = outcome.purchase.platform_fee,
            "Listing purchased"
        );
        Ok(outcome)
    }

    async fn purchase_in(
        &self,
        tx: &mut S::Tx,
        listing_id: &ListingId,
        buyer_id: &UserId,
        key: Option<&IdempotencyKey>,
    ) -> EconomyResult<PurchaseOutcome> {
        let now = Utc::now();

        // the seller never changes, so an unlocked read is enough to know
        // which wallets to lock
        let seller_id = self
            .store
            .find_listing(listing_id)
            .await?
            .ok_or(EconomyError::NotFound("listing"))?
            .seller_id;
        if &seller_id == buyer_id {
            return Err(EconomyError::SelfPurchase);
        }

        let (mut buyer, mut seller) =
            lock_pair(tx, buyer_id, &seller_id, self.config.lazy_seed).await?;
        let fingerprint = listing_id.to_string();
        if let Some(outcome) = replay(tx, buyer_id, key, PURCHASE, &fingerprint).await? {
            return Ok(outcome);
        }

        let mut listing = tx
            .lock_listing(listing_id)
            .await?
            .ok_or(EconomyError::NotFound("listing"))?;
        listing.ensure_purchasable_by(buyer_id)?;

        let price = Amount::new(listing.price)?;
        let settlement = Settlement::split(price, self.config.platform_fee_bps);
        settle_in(tx, &mut buyer, &mut seller, price, settlement.seller_earnings, now).await?;

        let source = tx
            .find_character(&listing.character_id)
            .await?
            .ok_or(EconomyError::NotFound("character"))?;
        let copy = source.clone_for(*buyer_id, now);
        tx.insert_character(&copy).await?;

        let purchase = Purchase::record(&listing, *buyer_id, settlement, copy.id, now);
        tx.insert_purchase(&purchase).await?;

        listing.mark_sold(settlement.seller_earnings, now);
        tx.save_listing(&listing).await?;

        let outcome = PurchaseOutcome {
            purchase,
            buyer_balance: buyer.balances(),
        };
        remember(tx, buyer_id, key, PURCHASE, &fingerprint, &outcome, now).await?;
        Ok(outcome)
    }

    /// Review a purchased listing and refresh its mean rating.
    pub async fn add_review(&self, input: ReviewInput) -> EconomyResult<Review> {
        let rating = Rating::new(input.rating)?;

        let mut tx = self.store.begin().await?;
        let result: EconomyResult<_> = async {
            let now = Utc::now();
            let mut listing = tx
                .lock_listing(&input.listing_id)
                .await?
                .ok_or(EconomyError::NotFound("listing"))?;
            if !tx.has_purchase(&listing.id, &input.reviewer_id).await? {
                return Err(EconomyError::NotPurchased);
            }
            if tx.has_review(&listing.id, &input.reviewer_id).await? {
                return Err(EconomyError::DuplicateReview);
            }

            let review = Review::new(listing.id, input.reviewer_id, rating, input.comment, now);
            tx.insert_review(&review).await?;
            let totals = tx.review_totals(&listing.id).await?;
            listing.apply_review_totals(totals, now);
            tx.save_listing(&listing).await?;
            Ok(review)
        }
        .await;
        let review = finish(tx, result).await?;

        tracing::info!(
            listing_id = %review.listing_id,
            reviewer_id = %review.reviewer_id,
            rating = review.rating.get(),
            "Listing reviewed"
        );
        Ok(review)
    }

    pub async fn browse(&self, input: BrowseInput) -> EconomyResult<ListingPage> {
        let query = ListingQuery {
            search: input.search,
            sort: input.sort,
            page: input.page.max(1),
            page_size: self.config.page_size,
        };
        self.store.browse_listings(&query).await
    }

    pub async fn get_listing(&self, listing_id: &ListingId) -> EconomyResult<Listing> {
        self.store
            .find_listing(listing_id)
            .await?
            .ok_or(EconomyError::NotFound("listing"))
    }

    pub async fn my_listings(&self, seller_id: &UserId) -> EconomyResult<Vec<ListingView>> {
        self.store.listings_by_seller(seller_id).await
    }

    pub async fn my_purchases(&self, buyer_id: &UserId) -> EconomyResult<Vec<Purchase>> {
        self.store.purchases_by_buyer(buyer_id).await
    }

    pub async fn earnings(&self, seller_id: &UserId) -> EconomyResult<EarningsSummary> {
        self.store.seller_earnings(seller_id).await
    }

    pub async fn reviews(&self, listing_id: &ListingId) -> EconomyResult<Vec<Review>> {
        self.store.reviews_for_listing(listing_id).await
    }
}
