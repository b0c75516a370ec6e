//! Marketplace Listing Entity

use chrono::{DateTime, Utc};
use kernel::id::{CharacterId, ListingId, UserId};
use serde::{Deserialize, Serialize};

use crate::domain::value_object::listing_status::ListingStatus;
use crate::error::{EconomyError, EconomyResult};

/// Aggregate of all reviews on one listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewTotals {
    pub count: i64,
    pub sum: i64,
}

impl ReviewTotals {
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ListingId,
    pub character_id: CharacterId,
    pub seller_id: UserId,
    /// Coins
    pub price: i64,
    pub description: String,
    pub status: ListingStatus,
    pub sales_count: i64,
    /// Seller earnings accumulated from sales
    pub total_revenue: i64,
    /// Mean review rating, 0 when unreviewed
    pub rating: f64,
    pub review_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub const MIN_PRICE: i64 = 1;

    pub fn new(
        character_id: CharacterId,
        seller_id: UserId,
        price: i64,
        description: String,
        now: DateTime<Utc>,
    ) -> EconomyResult<Self> {
        Self::validate_price(price)?;
        Ok(Self {
            id: ListingId::new(),
            character_id,
            seller_id,
            price,
            description,
            status: ListingStatus::Active,
            sales_count: 0,
            total_revenue: 0,
            rating: 0.0,
            review_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn validate_price(price: i64) -> EconomyResult<()> {
        if price >= Self::MIN_PRICE {
            Ok(())
        } else {
            Err(EconomyError::InvalidPrice)
        }
    }

    pub fn ensure_owned_by(&self, seller_id: &UserId) -> EconomyResult<()> {
        if &self.seller_id == seller_id {
            Ok(())
        } else {
            Err(EconomyError::NotOwner("listing"))
        }
    }

    pub fn ensure_purchasable_by(&self, buyer_id: &UserId) -> EconomyResult<()> {
        if !self.status.is_purchasable() {
            return Err(EconomyError::ListingUnavailable);
        }
        if &self.seller_id == buyer_id {
            return Err(EconomyError::SelfPurchase);
        }
        Ok(())
    }

    pub fn mark_sold(&mut self, seller_earnings: i64, now: DateTime<Utc>) {
        self.status = ListingStatus::Sold;
        self.sales_count += 1;
        self.total_revenue += seller_earnings;
        self.updated_at = now;
    }

    /// Withdraw an active listing. Returns whether the status changed.
    ///
    /// `Sold` and `Delisted` are terminal. Delisting a sold listing is not
    /// an error: the listing stays sold and is left unchanged.
    pub fn delist(&mut self, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = ListingStatus::Delisted;
        self.updated_at = now;
        true
    }

    pub fn update_terms(
        &mut self,
        price: Option<i64>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> EconomyResult<()> {
        if !self.status.is_purchasable() {
            return Err(EconomyError::ListingUnavailable);
        }
        if let Some(price) = price {
            Self::validate_price(price)?;
            self.price = price;
        }
        if let Some(description) = description {
            self.description = description;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn apply_review_totals(&mut self, totals: ReviewTotals, now: DateTime<Utc>) {
        self.rating = totals.mean();
        self.review_count = totals.count;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(price: i64) -> Listing {
        Listing::new(CharacterId::new(), UserId::new(), price, String::new(), Utc::now()).unwrap()
    }

    #[test]
    fn test_price_floor() {
        assert!(matches!(
            Listing::new(CharacterId::new(), UserId::new(), 0, String::new(), Utc::now()),
            Err(EconomyError::InvalidPrice)
        ));
        assert_eq!(listing(1).price, 1);
    }

    #[test]
    fn test_purchasable_checks() {
        let mut l = listing(10);
        assert!(matches!(
            l.ensure_purchasable_by(&l.seller_id.clone()),
            Err(EconomyError::SelfPurchase)
        ));
        assert!(l.ensure_purchasable_by(&UserId::new()).is_ok());

        l.mark_sold(9, Utc::now());
        assert!(matches!(
            l.ensure_purchasable_by(&UserId::new()),
            Err(EconomyError::ListingUnavailable)
        ));
        assert_eq!(l.sales_count, 1);
        assert_eq!(l.total_revenue, 9);
    }

    #[test]
    fn test_delist_keeps_terminal_states() {
        let mut sold = listing(10);
        sold.mark_sold(9, Utc::now());
        assert!(!sold.delist(Utc::now()));
        assert_eq!(sold.status, ListingStatus::Sold);

        let mut active = listing(10);
        assert!(active.delist(Utc::now()));
        assert_eq!(active.status, ListingStatus::Delisted);
        assert!(!active.delist(Utc::now()));
    }

    #[test]
    fn test_review_mean() {
        let mut l = listing(10);
        l.apply_review_totals(ReviewTotals { count: 2, sum: 9 }, Utc::now());
        assert_eq!(l.rating, 4.5);
        assert_eq!(l.review_count, 2);
    }
}
