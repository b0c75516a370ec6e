//! Review Rating

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};

/// Star rating, 1 to 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub struct Rating(i16);

impl Rating {
    pub const MIN: i16 = 1;
    pub const MAX: i16 = 5;

    pub fn new(stars: i16) -> EconomyResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&stars) {
            Ok(Self(stars))
        } else {
            Err(EconomyError::InvalidRating)
        }
    }

    #[inline]
    pub const fn get(&self) -> i16 {
        self.0
    }
}

impl TryFrom<i16> for Rating {
    type Error = EconomyError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i16 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}
