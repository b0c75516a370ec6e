//! Review Entity

use chrono::{DateTime, Utc};
use kernel::id::{ListingId, ReviewId, UserId};
use serde::{Deserialize, Serialize};

use crate::domain::value_object::rating::Rating;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub listing_id: ListingId,
    pub reviewer_id: UserId,
    pub rating: Rating,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(
        listing_id: ListingId,
        reviewer_id: UserId,
        rating: Rating,
        comment: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReviewId::new(),
            listing_id,
            reviewer_id,
            rating,
            comment,
            created_at: now,
        }
    }
}
