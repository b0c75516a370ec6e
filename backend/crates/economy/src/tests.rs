//! Use-case tests over the in-memory store.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use kernel::id::{CharacterId, ListingId, UserId};

use crate::application::gifting::{GiftInput, RedPacketInput};
use crate::application::ledger::VipPurchaseInput;
use crate::application::marketplace::{
    BrowseInput, CreateListingInput, PurchaseInput, ReviewInput, UpdateListingInput,
};
use crate::domain::entity::{character::Character, wallet::WalletSeed};
use crate::domain::repository::ListingSort;
use crate::domain::value_object::{
    affinity_level::AffinityLevel, change_type::AffinityChangeType, currency::Currency,
    listing_status::ListingStatus, spend_channel::SpendChannel, vip::VipLevel,
};
use crate::{
    AffinityTracker, EconomyConfig, EconomyError, GiftDispatcher, MarketplaceEngine,
    MemoryEconomyStore, WalletLedger,
};

struct Harness {
    store: Arc<MemoryEconomyStore>,
    ledger: WalletLedger<MemoryEconomyStore>,
    market: MarketplaceEngine<MemoryEconomyStore>,
    affinity: AffinityTracker<MemoryEconomyStore>,
    gifts: GiftDispatcher<MemoryEconomyStore>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(EconomyConfig::default())
    }

    fn with_config(config: EconomyConfig) -> Self {
        let store = Arc::new(MemoryEconomyStore::new());
        let config = Arc::new(config);
        Self {
            ledger: WalletLedger::new(store.clone(), config.clone()),
            market: MarketplaceEngine::new(store.clone(), config.clone()),
            affinity: AffinityTracker::new(store.clone(), config.clone()),
            gifts: GiftDispatcher::new(store.clone(), config),
            store,
        }
    }

    async fn user_with_coins(&self, coins: i64) -> UserId {
        let user = UserId::new();
        if coins > 0 {
            self.ledger.credit(&user, Currency::Coins, coins).await.unwrap();
        }
        user
    }

    async fn character(&self, owner: UserId, name: &str) -> CharacterId {
        let character = Character::new(owner, name, Utc::now());
        let id = character.id;
        self.store.insert_character(character).await;
        id
    }

    async fn listing(&self, seller: UserId, name: &str, price: i64) -> ListingId {
        let character_id = self.character(seller, name).await;
        self.market
            .create_listing(CreateListingInput {
                character_id,
                seller_id: seller,
                price,
                description: format!("{name} for sale"),
            })
            .await
            .unwrap()
            .id
    }

    async fn buy(&self, listing_id: ListingId, buyer: UserId) -> Result<(), EconomyError> {
        self.market
            .purchase(PurchaseInput {
                listing_id,
                buyer_id: buyer,
                idempotency_key: None,
            })
            .await
            .map(|_| ())
    }

    async fn coins(&self, user: &UserId) -> i64 {
        self.ledger.get_balance(user).await.unwrap().coins
    }
}

// ============================================================================
// Wallet ledger
// ============================================================================

#[tokio::test]
async fn test_open_wallet_seeds_once() {
    let h = Harness::new();
    let user = UserId::new();

    let wallet = h.ledger.open_wallet(&user).await.unwrap();
    assert_eq!((wallet.points, wallet.coins), (100, 50));
    assert_eq!(wallet.total_coins_earned, 0);

    h.ledger.debit(&user, Currency::Coins, 20).await.unwrap();
    let again = h.ledger.open_wallet(&user).await.unwrap();
    assert_eq!(again.coins, 30);
}

#[tokio::test]
async fn test_missing_wallet_reads_lazy_seed() {
    let h = Harness::with_config(EconomyConfig {
        lazy_seed: WalletSeed {
            points: 5,
            coins: 0,
        },
        ..EconomyConfig::default()
    });
    let user = UserId::new();

    let balance = h.ledger.get_balance(&user).await.unwrap();
    assert_eq!((balance.points, balance.coins), (5, 0));
    assert!(h.ledger.get_wallet(&user).await.unwrap().is_none());
}

#[tokio::test]
async fn test_debit_rejects_overdraft_without_change() {
    let h = Harness::new();
    let user = h.user_with_coins(30).await;

    let err = h.ledger.debit(&user, Currency::Coins, 31).await.unwrap_err();
    assert!(matches!(
        err,
        EconomyError::InsufficientFunds {
            currency: Currency::Coins,
            required: 31,
            available: 30,
        }
    ));
    assert_eq!(h.coins(&user).await, 30);

    assert!(matches!(
        h.ledger.credit(&user, Currency::Coins, 0).await,
        Err(EconomyError::InvalidAmount)
    ));
    assert!(matches!(
        h.ledger.debit(&user, Currency::Coins, -5).await,
        Err(EconomyError::InvalidAmount)
    ));
}

#[tokio::test]
async fn test_lifetime_counters() {
    let h = Harness::new();
    let user = h.user_with_coins(80).await;
    h.ledger.debit(&user, Currency::Coins, 30).await.unwrap();
    h.ledger.credit(&user, Currency::Points, 7).await.unwrap();

    let wallet = h.ledger.get_wallet(&user).await.unwrap().unwrap();
    assert_eq!(wallet.coins, 50);
    assert_eq!(wallet.total_coins_earned, 80);
    assert_eq!(wallet.total_coins_spent, 30);
    assert_eq!(wallet.total_points_earned, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let h = Arc::new(Harness::new());
    let user = h.user_with_coins(100).await;

    let mut handles = Vec::new();
    for _ in 0..25 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.ledger.debit(&user, Currency::Coins, 10).await.is_ok()
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(h.coins(&user).await, 0);
}

#[tokio::test]
async fn test_transfer_moves_both_sides() {
    let h = Harness::new();
    let alice = h.user_with_coins(40).await;
    let bob = h.user_with_coins(5).await;

    let outcome = h.ledger.transfer(&alice, &bob, 15).await.unwrap();
    assert_eq!(outcome.from.coins, 25);
    assert_eq!(outcome.to.coins, 20);

    let err = h.ledger.transfer(&bob, &alice, 21).await.unwrap_err();
    assert!(matches!(err, EconomyError::InsufficientFunds { .. }));
    assert_eq!(h.coins(&alice).await, 25);
    assert_eq!(h.coins(&bob).await, 20);

    assert!(matches!(
        h.ledger.transfer(&alice, &alice, 1).await,
        Err(EconomyError::SelfTransfer)
    ));
}

#[tokio::test]
async fn test_check_in_streak() {
    let h = Harness::new();
    let user = UserId::new();
    let day1 = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();

    let first = h.ledger.check_in_at(&user, day1).await.unwrap();
    assert_eq!(first.record.consecutive_days, 1);
    assert_eq!(first.balance.points, 10);

    let err = h
        .ledger
        .check_in_at(&user, day1 + Duration::hours(10))
        .await
        .unwrap_err();
    assert!(matches!(err, EconomyError::AlreadyCheckedIn));

    let day2 = h.ledger.check_in_at(&user, day1 + Duration::days(1)).await.unwrap();
    let day3 = h.ledger.check_in_at(&user, day1 + Duration::days(2)).await.unwrap();
    assert_eq!(day2.record.consecutive_days, 2);
    assert_eq!(day3.record.consecutive_days, 3);
    assert_eq!(day3.record.points_earned, 20);
    assert_eq!(day3.balance.points, 10 + 10 + 20);

    // a missed day restarts the streak
    let later = h.ledger.check_in_at(&user, day1 + Duration::days(5)).await.unwrap();
    assert_eq!(later.record.consecutive_days, 1);
    assert_eq!(later.record.points_earned, 10);
}

#[tokio::test]
async fn test_exchange_points() {
    let h = Harness::new();
    let user = UserId::new();
    h.ledger.credit(&user, Currency::Points, 250).await.unwrap();

    assert!(matches!(
        h.ledger.exchange_points(&user, 99).await,
        Err(EconomyError::BelowMinimumExchange { minimum: 100 })
    ));

    let outcome = h.ledger.exchange_points(&user, 125).await.unwrap();
    assert_eq!(outcome.quote.coins_earned.get(), 12);
    assert_eq!(outcome.balance.points, 125);
    assert_eq!(outcome.balance.coins, 12);

    let err = h.ledger.exchange_points(&user, 200).await.unwrap_err();
    assert!(matches!(
        err,
        EconomyError::InsufficientFunds {
            currency: Currency::Points,
            ..
        }
    ));
}

#[tokio::test]
async fn test_recharge() {
    let h = Harness::new();
    let user = UserId::new();

    let outcome = h.ledger.recharge(&user, 6).await.unwrap();
    assert_eq!(outcome.coins_added, 60);
    assert_eq!(outcome.balance.coins, 60);
    assert!(matches!(
        h.ledger.recharge(&user, 0).await,
        Err(EconomyError::InvalidAmount)
    ));
}

fn vip(user_id: UserId, level: i16, duration: &str) -> VipPurchaseInput {
    VipPurchaseInput {
        user_id,
        level,
        duration: duration.to_owned(),
        idempotency_key: None,
    }
}

#[tokio::test]
async fn test_purchase_vip_spends_coins() {
    let h = Harness::new();
    let user = h.user_with_coins(1_000).await;

    let outcome = h.ledger.purchase_vip(vip(user, 2, "monthly")).await.unwrap();
    assert_eq!(outcome.purchase.level, VipLevel::Svip);
    assert_eq!(outcome.purchase.price, 680);
    assert_eq!(outcome.balance.coins, 320);
    assert!(outcome.purchase.expires_at > outcome.purchase.created_at);

    let wallet = h.ledger.get_wallet(&user).await.unwrap().unwrap();
    assert_eq!(wallet.total_coins_spent, 680);

    let status = h.ledger.vip_status(&user).await.unwrap().unwrap();
    assert_eq!(status.id, outcome.purchase.id);
    let after_expiry = outcome.purchase.expires_at + Duration::seconds(1);
    assert!(h.ledger.vip_status_at(&user, after_expiry).await.unwrap().is_none());
}

#[tokio::test]
async fn test_purchase_vip_rejections_change_nothing() {
    let h = Harness::new();
    let user = h.user_with_coins(500).await;

    let err = h.ledger.purchase_vip(vip(user, 1, "quarterly")).await.unwrap_err();
    assert!(matches!(
        err,
        EconomyError::InsufficientFunds {
            currency: Currency::Coins,
            required: 800,
            available: 500,
        }
    ));
    for (level, duration) in [(0, "monthly"), (4, "monthly"), (1, "weekly")] {
        let err = h.ledger.purchase_vip(vip(user, level, duration)).await.unwrap_err();
        assert!(matches!(err, EconomyError::InvalidVipPlan));
    }

    assert_eq!(h.coins(&user).await, 500);
    assert!(h.ledger.vip_purchases(&user).await.unwrap().is_empty());
    assert!(h.ledger.vip_status(&user).await.unwrap().is_none());
}

#[tokio::test]
async fn test_purchase_vip_replays_idempotency_key() {
    let h = Harness::new();
    let user = h.user_with_coins(1_000).await;
    let keyed = |duration: &str| VipPurchaseInput {
        idempotency_key: Some("vip-1".to_owned()),
        ..vip(user, 1, duration)
    };

    let first = h.ledger.purchase_vip(keyed("monthly")).await.unwrap();
    let replayed = h.ledger.purchase_vip(keyed("monthly")).await.unwrap();
    assert_eq!(first, replayed);

    let err = h.ledger.purchase_vip(keyed("yearly")).await.unwrap_err();
    assert!(matches!(err, EconomyError::IdempotencyKeyReused));
    assert_eq!(h.coins(&user).await, 700);
    assert_eq!(h.ledger.vip_purchases(&user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_invite_code_is_stable() {
    let h = Harness::new();
    let user = UserId::new();

    let first = h.ledger.invite_code(&user).await.unwrap();
    let again = h.ledger.invite_code(&user).await.unwrap();
    assert_eq!(first, again);
    assert_ne!(h.ledger.invite_code(&UserId::new()).await.unwrap().code, first.code);
}

#[tokio::test]
async fn test_redeem_invite_rewards_both_sides() {
    let h = Harness::new();
    let inviter = UserId::new();
    let invitee = UserId::new();
    h.ledger.open_wallet(&inviter).await.unwrap();
    h.ledger.open_wallet(&invitee).await.unwrap();
    let code = h.ledger.invite_code(&inviter).await.unwrap();

    let outcome = h
        .ledger
        .redeem_invite(&invitee, &format!(" {} ", code.code.to_lowercase()))
        .await
        .unwrap();
    assert_eq!(outcome.balance.points, 130);
    assert_eq!(outcome.record.inviter_id, inviter);
    assert_eq!(outcome.record.code, code.code);

    let inviter_wallet = h.ledger.get_wallet(&inviter).await.unwrap().unwrap();
    assert_eq!(inviter_wallet.points, 150);
    assert_eq!(inviter_wallet.total_points_earned, 50);

    let code = h.ledger.invite_code(&inviter).await.unwrap();
    assert_eq!((code.invite_count, code.total_reward_points), (1, 50));
    assert_eq!(h.ledger.invites(&inviter).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_redeem_invite_rejections() {
    let h = Harness::new();
    let inviter = UserId::new();
    let invitee = UserId::new();
    let code = h.ledger.invite_code(&inviter).await.unwrap().code;

    assert!(matches!(
        h.ledger.redeem_invite(&invitee, "NOPE1234").await,
        Err(EconomyError::NotFound("invite code"))
    ));
    assert!(matches!(
        h.ledger.redeem_invite(&inviter, &code).await,
        Err(EconomyError::SelfInvite)
    ));

    h.ledger.redeem_invite(&invitee, &code).await.unwrap();
    let other_code = h.ledger.invite_code(&UserId::new()).await.unwrap().code;
    assert!(matches!(
        h.ledger.redeem_invite(&invitee, &other_code).await,
        Err(EconomyError::AlreadyInvited)
    ));

    // only the first redemption paid out
    assert_eq!(h.ledger.get_balance(&invitee).await.unwrap().points, 30);
    assert_eq!(h.ledger.get_balance(&inviter).await.unwrap().points, 50);
}

// ============================================================================
// Marketplace
// ============================================================================

#[tokio::test]
async fn test_purchase_settles_and_clones() {
    let h = Harness::new();
    let seller = h.user_with_coins(100).await;
    let buyer = h.user_with_coins(60).await;
    let listing_id = h.listing(seller, "Aria", 50).await;

    let outcome = h
        .market
        .purchase(PurchaseInput {
            listing_id,
            buyer_id: buyer,
            idempotency_key: None,
        })
        .await
        .unwrap();

    assert_eq!(outcome.buyer_balance.coins, 10);
    assert_eq!(h.coins(&buyer).await, 10);
    assert_eq!(h.coins(&seller).await, 145);
    assert_eq!(outcome.purchase.platform_fee, 5);
    assert_eq!(outcome.purchase.seller_earnings, 45);

    let owned = h.store.characters_owned_by(&buyer).await;
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, outcome.purchase.cloned_character_id);
    assert_eq!(owned[0].name, "Aria");
    assert_eq!(owned[0].source_character_id, Some(outcome.purchase.character_id));

    let listing = h.market.get_listing(&listing_id).await.unwrap();
    assert_eq!(listing.status, ListingStatus::Sold);
    assert_eq!(listing.sales_count, 1);
    assert_eq!(listing.total_revenue, 45);

    let earnings = h.market.earnings(&seller).await.unwrap();
    assert_eq!(earnings.total_sales, 1);
    assert_eq!(earnings.total_earnings, 45);
    assert_eq!(earnings.unique_characters, 1);
    assert_eq!(h.market.my_purchases(&buyer).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sold_listing_is_unavailable() {
    let h = Harness::new();
    let seller = UserId::new();
    let first = h.user_with_coins(50).await;
    let second = h.user_with_coins(50).await;
    let listing_id = h.listing(seller, "Mika", 20).await;

    h.buy(listing_id, first).await.unwrap();
    let err = h.buy(listing_id, second).await.unwrap_err();

    assert!(matches!(err, EconomyError::ListingUnavailable));
    assert_eq!(h.coins(&second).await, 50);
    assert!(h.store.characters_owned_by(&second).await.is_empty());
    assert_eq!(h.coins(&seller).await, 18);
}

#[tokio::test]
async fn test_purchase_rejections() {
    let h = Harness::new();
    let seller = h.user_with_coins(10).await;
    let poor = h.user_with_coins(5).await;
    let listing_id = h.listing(seller, "Nova", 30).await;

    assert!(matches!(
        h.buy(listing_id, seller).await,
        Err(EconomyError::SelfPurchase)
    ));
    assert!(matches!(
        h.buy(listing_id, poor).await,
        Err(EconomyError::InsufficientFunds { .. })
    ));
    assert!(matches!(
        h.buy(ListingId::new(), poor).await,
        Err(EconomyError::NotFound("listing"))
    ));

    let listing = h.market.get_listing(&listing_id).await.unwrap();
    assert_eq!(listing.status, ListingStatus::Active);
    assert_eq!(h.coins(&poor).await, 5);
    assert_eq!(h.coins(&seller).await, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchase_has_one_winner() {
    let h = Arc::new(Harness::new());
    let seller = UserId::new();
    let listing_id = h.listing(seller, "Lumi", 40).await;

    let mut buyers = Vec::new();
    for _ in 0..8 {
        buyers.push(h.user_with_coins(100).await);
    }

    let mut handles = Vec::new();
    for buyer in buyers.clone() {
        let h = h.clone();
        handles.push(tokio::spawn(async move { h.buy(listing_id, buyer).await }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => winners += 1,
            Err(err) => assert!(matches!(err, EconomyError::ListingUnavailable)),
        }
    }
    assert_eq!(winners, 1);

    let mut total = 0;
    for buyer in &buyers {
        total += h.coins(buyer).await;
    }
    assert_eq!(total, 8 * 100 - 40);
    assert_eq!(h.coins(&seller).await, 36);
}

#[tokio::test]
async fn test_create_listing_rules() {
    let h = Harness::new();
    let owner = UserId::new();
    let stranger = UserId::new();
    let character_id = h.character(owner, "Echo").await;

    let input = |seller_id, price| CreateListingInput {
        character_id,
        seller_id,
        price,
        description: String::new(),
    };

    assert!(matches!(
        h.market.create_listing(input(owner, 0)).await,
        Err(EconomyError::InvalidPrice)
    ));
    assert!(matches!(
        h.market.create_listing(input(stranger, 10)).await,
        Err(EconomyError::NotOwner("character"))
    ));

    let listing = h.market.create_listing(input(owner, 10)).await.unwrap();
    assert!(matches!(
        h.market.create_listing(input(owner, 12)).await,
        Err(EconomyError::AlreadyListed)
    ));

    // a withdrawn listing frees the character
    h.market.delist(&listing.id, &owner).await.unwrap();
    h.market.create_listing(input(owner, 12)).await.unwrap();

    assert!(matches!(
        h.market
            .create_listing(CreateListingInput {
                character_id: CharacterId::new(),
                seller_id: owner,
                price: 5,
                description: String::new(),
            })
            .await,
        Err(EconomyError::NotFound("character"))
    ));
}

#[tokio::test]
async fn test_update_and_delist() {
    let h = Harness::new();
    let seller = UserId::new();
    let other = UserId::new();
    let listing_id = h.listing(seller, "Sol", 25).await;

    let updated = h
        .market
        .update_listing(UpdateListingInput {
            listing_id,
            seller_id: seller,
            price: Some(30),
            description: None,
        })
        .await
        .unwrap();
    assert_eq!(updated.price, 30);
    assert_eq!(updated.description, "Sol for sale");

    assert!(matches!(
        h.market.delist(&listing_id, &other).await,
        Err(EconomyError::NotOwner("listing"))
    ));

    let delisted = h.market.delist(&listing_id, &seller).await.unwrap();
    assert_eq!(delisted.status, ListingStatus::Delisted);
    let again = h.market.delist(&listing_id, &seller).await.unwrap();
    assert_eq!(again.status, ListingStatus::Delisted);

    assert!(matches!(
        h.market
            .update_listing(UpdateListingInput {
                listing_id,
                seller_id: seller,
                price: Some(40),
                description: None,
            })
            .await,
        Err(EconomyError::ListingUnavailable)
    ));

    let buyer = h.user_with_coins(100).await;
    assert!(matches!(
        h.buy(listing_id, buyer).await,
        Err(EconomyError::ListingUnavailable)
    ));
}

#[tokio::test]
async fn test_delist_keeps_sold_listing() {
    let h = Harness::new();
    let seller = UserId::new();
    let buyer = h.user_with_coins(20).await;
    let listing_id = h.listing(seller, "Kai", 20).await;
    h.buy(listing_id, buyer).await.unwrap();

    let listing = h.market.delist(&listing_id, &seller).await.unwrap();
    assert_eq!(listing.status, ListingStatus::Sold);
}

#[tokio::test]
async fn test_review_rules() {
    let h = Harness::new();
    let seller = UserId::new();
    let buyer = h.user_with_coins(50).await;
    let outsider = UserId::new();
    let listing_id = h.listing(seller, "Iris", 10).await;
    h.buy(listing_id, buyer).await.unwrap();

    let review = |reviewer_id, rating| ReviewInput {
        listing_id,
        reviewer_id,
        rating,
        comment: "lovely".to_owned(),
    };

    assert!(matches!(
        h.market.add_review(review(buyer, 6)).await,
        Err(EconomyError::InvalidRating)
    ));
    assert!(matches!(
        h.market.add_review(review(outsider, 4)).await,
        Err(EconomyError::NotPurchased)
    ));

    h.market.add_review(review(buyer, 4)).await.unwrap();
    assert!(matches!(
        h.market.add_review(review(buyer, 5)).await,
        Err(EconomyError::DuplicateReview)
    ));

    let listing = h.market.get_listing(&listing_id).await.unwrap();
    assert_eq!(listing.review_count, 1);
    assert_eq!(listing.rating, 4.0);
    assert_eq!(h.market.reviews(&listing_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_browse_sort_search_and_paging() {
    let h = Harness::with_config(EconomyConfig {
        page_size: 2,
        ..EconomyConfig::default()
    });
    let seller = UserId::new();
    h.listing(seller, "Aurora", 30).await;
    h.listing(seller, "Blaze", 10).await;
    let hidden = h.listing(seller, "Aurelia", 20).await;
    h.listing(seller, "Cinder", 40).await;
    h.market.delist(&hidden, &seller).await.unwrap();

    let page = h
        .market
        .browse(BrowseInput {
            search: None,
            sort: ListingSort::PriceAsc,
            page: 1,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    let prices: Vec<i64> = page.items.iter().map(|v| v.listing.price).collect();
    assert_eq!(prices, vec![10, 30]);

    let second = h
        .market
        .browse(BrowseInput {
            search: None,
            sort: ListingSort::PriceAsc,
            page: 2,
        })
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].character_name, "Cinder");

    let found = h
        .market
        .browse(BrowseInput {
            search: Some("  AUR ".to_owned()),
            sort: ListingSort::PriceDesc,
            page: 1,
        })
        .await
        .unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.items[0].character_name, "Aurora");

    assert_eq!(h.market.my_listings(&seller).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_purchase_replays_idempotency_key() {
    let h = Harness::new();
    let seller = UserId::new();
    let buyer = h.user_with_coins(100).await;
    let listing_id = h.listing(seller, "Vega", 30).await;

    let input = || PurchaseInput {
        listing_id,
        buyer_id: buyer,
        idempotency_key: Some("order-1".to_owned()),
    };

    let first = h.market.purchase(input()).await.unwrap();
    let second = h.market.purchase(input()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.coins(&buyer).await, 70);
    assert_eq!(h.market.my_purchases(&buyer).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_purchase_key_reused_for_other_listing() {
    let h = Harness::new();
    let seller = UserId::new();
    let buyer = h.user_with_coins(100).await;
    let first_listing = h.listing(seller, "Vega", 30).await;
    let second_listing = h.listing(seller, "Rigel", 20).await;

    let purchase = |listing_id| PurchaseInput {
        listing_id,
        buyer_id: buyer,
        idempotency_key: Some("order-1".to_owned()),
    };
    h.market.purchase(purchase(first_listing)).await.unwrap();

    let err = h.market.purchase(purchase(second_listing)).await.unwrap_err();
    assert!(matches!(err, EconomyError::IdempotencyKeyReused));
    assert_eq!(h.coins(&buyer).await, 70);
    let untouched = h.market.get_listing(&second_listing).await.unwrap();
    assert_eq!(untouched.status, ListingStatus::Active);

    // a fresh key still buys it
    h.market
        .purchase(PurchaseInput {
            idempotency_key: Some("order-2".to_owned()),
            ..purchase(second_listing)
        })
        .await
        .unwrap();
    assert_eq!(h.coins(&buyer).await, 50);
}

// ============================================================================
// Affinity and spends
// ============================================================================

#[tokio::test]
async fn test_gift_crosses_level() {
    let h = Harness::new();
    let user = h.user_with_coins(500).await;
    let character = h.character(UserId::new(), "Luna").await;

    h.affinity
        .add_affinity(&user, &character, 95, AffinityChangeType::Chat, None)
        .await
        .unwrap();

    // Crown: 100 coins, 10 affinity
    let outcome = h
        .gifts
        .send_gift(GiftInput {
            user_id: user,
            character_id: character,
            gift_id: 5,
            quantity: 1,
            idempotency_key: None,
        })
        .await
        .unwrap();

    assert_eq!(outcome.balance.coins, 400);
    assert_eq!(outcome.affinity.change.before, 95);
    assert_eq!(outcome.affinity.change.after, 105);
    assert_eq!(outcome.affinity.change.level_before, AffinityLevel::Stranger);
    assert_eq!(outcome.affinity.change.level_after, AffinityLevel::Acquaintance);
    assert_eq!(outcome.record.affinity_gained, 10);
    assert_eq!(outcome.record.gift_id, Some(5));

    let history = h.affinity.history(&user, &character).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].change_type, AffinityChangeType::Gift);
    assert_eq!(history[0].before_value, 95);
    assert_eq!(history[0].after_value, 105);
}

#[tokio::test]
async fn test_affinity_saturates() {
    let h = Harness::new();
    let user = UserId::new();
    let character = h.character(UserId::new(), "Orion").await;

    h.affinity
        .add_affinity(&user, &character, 995, AffinityChangeType::Chat, None)
        .await
        .unwrap();
    let outcome = h
        .affinity
        .add_affinity(&user, &character, 50, AffinityChangeType::Gift, None)
        .await
        .unwrap();

    assert_eq!(outcome.record.value, 1000);
    assert_eq!(outcome.record.level, AffinityLevel::Soulmate);
    assert_eq!(outcome.change.applied(), 5);

    let penalty = h
        .affinity
        .add_affinity(&user, &character, -2000, AffinityChangeType::Penalty, None)
        .await
        .unwrap();
    assert_eq!(penalty.record.value, 0);
}

#[tokio::test]
async fn test_affinity_interaction_counters() {
    let h = Harness::new();
    let user = UserId::new();
    let character = h.character(UserId::new(), "Pax").await;
    let day = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();

    let chat = |at| {
        h.affinity
            .add_affinity_at(&user, &character, 1, AffinityChangeType::Chat, None, at)
    };

    chat(day).await.unwrap();
    chat(day + Duration::minutes(1)).await.unwrap();
    let next = chat(day + Duration::days(1)).await.unwrap();

    assert_eq!(next.record.total_interactions, 3);
    assert_eq!(next.record.daily_interactions, 1);
    assert_eq!(next.record.streak_days, 2);
}

#[tokio::test]
async fn test_unknown_pair_reads_zero() {
    let h = Harness::new();
    let record = h
        .affinity
        .get_affinity(&UserId::new(), &CharacterId::new())
        .await
        .unwrap();
    assert_eq!(record.value, 0);
    assert_eq!(record.level, AffinityLevel::Stranger);

    assert!(matches!(
        h.affinity.record_chat_turn(&UserId::new(), &CharacterId::new()).await,
        Err(EconomyError::NotFound("character"))
    ));
}

#[tokio::test]
async fn test_gift_failures_change_nothing() {
    let h = Harness::new();
    let user = h.user_with_coins(15).await;
    let character = h.character(UserId::new(), "Rin").await;

    let gift = |gift_id, quantity| GiftInput {
        user_id: user,
        character_id: character,
        gift_id,
        quantity,
        idempotency_key: None,
    };

    assert!(matches!(
        h.gifts.send_gift(gift(99, 1)).await,
        Err(EconomyError::NotFound("gift"))
    ));
    assert!(matches!(
        h.gifts.send_gift(gift(2, 0)).await,
        Err(EconomyError::InvalidAmount)
    ));
    assert!(matches!(
        h.gifts.send_gift(gift(2, 2)).await,
        Err(EconomyError::InsufficientFunds { .. })
    ));

    assert_eq!(h.coins(&user).await, 15);
    assert_eq!(h.affinity.get_affinity(&user, &character).await.unwrap().value, 0);
    assert!(h.affinity.history(&user, &character).await.unwrap().is_empty());
    assert!(h.gifts.records(&user, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_red_packet() {
    let h = Harness::new();
    let user = h.user_with_coins(100).await;
    let character = h.character(UserId::new(), "Zed").await;

    let outcome = h
        .gifts
        .send_red_packet(RedPacketInput {
            user_id: user,
            character_id: character,
            amount: 52,
            message: Some("  happy new year ".to_owned()),
            idempotency_key: None,
        })
        .await
        .unwrap();

    assert_eq!(outcome.balance.coins, 48);
    assert_eq!(outcome.record.affinity_gained, 10);
    assert_eq!(outcome.record.message.as_deref(), Some("happy new year"));

    assert!(matches!(
        h.gifts
            .send_red_packet(RedPacketInput {
                user_id: user,
                character_id: character,
                amount: 0,
                message: None,
                idempotency_key: None,
            })
            .await,
        Err(EconomyError::InvalidAmount)
    ));

    let packets = h
        .gifts
        .records(&user, Some(SpendChannel::RedPacket))
        .await
        .unwrap();
    assert_eq!(packets.len(), 1);
    assert!(h.gifts.records(&user, Some(SpendChannel::Gift)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_spend_idempotency() {
    let h = Harness::new();
    let user = h.user_with_coins(100).await;
    let character = h.character(UserId::new(), "Tao").await;

    let gift = GiftInput {
        user_id: user,
        character_id: character,
        gift_id: 2,
        quantity: 1,
        idempotency_key: Some("gift-42".to_owned()),
    };
    let first = h.gifts.send_gift(gift.clone()).await.unwrap();
    let replayed = h.gifts.send_gift(gift).await.unwrap();

    assert_eq!(first, replayed);
    assert_eq!(h.coins(&user).await, 90);
    assert_eq!(h.gifts.records(&user, None).await.unwrap().len(), 1);

    let err = h
        .gifts
        .send_red_packet(RedPacketInput {
            user_id: user,
            character_id: character,
            amount: 5,
            message: None,
            idempotency_key: Some("gift-42".to_owned()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EconomyError::IdempotencyKeyReused));
    assert_eq!(h.coins(&user).await, 90);
}

#[tokio::test]
async fn test_spend_key_reused_with_other_parameters() {
    let h = Harness::new();
    let user = h.user_with_coins(200).await;
    let character = h.character(UserId::new(), "Tao").await;
    let other = h.character(UserId::new(), "Mira").await;

    let gift = GiftInput {
        user_id: user,
        character_id: character,
        gift_id: 2,
        quantity: 1,
        idempotency_key: Some("gift-7".to_owned()),
    };
    h.gifts.send_gift(gift.clone()).await.unwrap();

    for changed in [
        GiftInput { quantity: 2, ..gift.clone() },
        GiftInput { gift_id: 3, ..gift.clone() },
        GiftInput { character_id: other, ..gift.clone() },
    ] {
        let err = h.gifts.send_gift(changed).await.unwrap_err();
        assert!(matches!(err, EconomyError::IdempotencyKeyReused));
    }

    let packet = RedPacketInput {
        user_id: user,
        character_id: character,
        amount: 25,
        message: None,
        idempotency_key: Some("packet-1".to_owned()),
    };
    h.gifts.send_red_packet(packet.clone()).await.unwrap();
    let err = h
        .gifts
        .send_red_packet(RedPacketInput { amount: 30, ..packet })
        .await
        .unwrap_err();
    assert!(matches!(err, EconomyError::IdempotencyKeyReused));

    assert_eq!(h.coins(&user).await, 200 - 10 - 25);
    assert_eq!(h.gifts.records(&user, None).await.unwrap().len(), 2);
}
