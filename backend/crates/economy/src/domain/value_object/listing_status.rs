//! Listing Status

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marketplace listing lifecycle.
///
/// `Active` is the only state with outgoing transitions: to `Sold` on the
/// first purchase, or to `Delisted` by the seller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum ListingStatus {
    #[default]
    Active = 0,
    Sold = 1,
    Delisted = 2,
}

impl ListingStatus {
    /// Numeric ID for database storage
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Sold => "sold",
            Self::Delisted => "delisted",
        }
    }

    #[inline]
    pub const fn is_purchasable(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// No transition leaves a terminal state
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Sold | Self::Delisted)
    }

    #[inline]
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::Active),
            1 => Some(Self::Sold),
            2 => Some(Self::Delisted),
            _ => None,
        }
    }

    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "active" => Some(Self::Active),
            "sold" => Some(Self::Sold),
            "delisted" => Some(Self::Delisted),
            _ => None,
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        for status in [ListingStatus::Active, ListingStatus::Sold, ListingStatus::Delisted] {
            assert_eq!(ListingStatus::from_id(status.id()), Some(status));
            assert_eq!(ListingStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(ListingStatus::from_id(9), None);
    }

    #[test]
    fn test_only_active_is_purchasable() {
        assert!(ListingStatus::Active.is_purchasable());
        assert!(!ListingStatus::Sold.is_purchasable());
        assert!(ListingStatus::Sold.is_terminal());
        assert!(ListingStatus::Delisted.is_terminal());
        assert!(!ListingStatus::Active.is_terminal());
    }
}
