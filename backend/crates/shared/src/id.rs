//! Common ID Types
//!
//! Type-safe ID wrappers for domain entities.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Generic typed ID wrapper
///
/// The marker only exists at compile time, so the trait impls below are
/// written by hand to avoid requiring them on the marker.
///
/// Usage:
/// ```
/// use kernel::id::{Id, markers};
/// type UserId = Id<markers::User>;
/// let a: UserId = Id::new();
/// let b = a;
/// assert_eq!(a, b);
/// ```
pub struct Id<T> {
    value: Uuid,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    /// Random ID (UUID v4)
    pub fn new() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self {
            value: uuid,
            _marker: PhantomData,
        }
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.value
    }

    pub fn into_uuid(self) -> Uuid {
        self.value
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordering is used to acquire row locks in a stable order.
impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> From<Uuid> for Id<T> {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

impl<T> From<Id<T>> for Uuid {
    fn from(id: Id<T>) -> Self {
        id.value
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Uuid::deserialize(deserializer).map(Self::from_uuid)
    }
}

/// Marker types for different entity IDs
pub mod markers {
    /// Account holder (owned by the identity service)
    pub struct User;

    /// Companion character (owned by the character catalog)
    pub struct Character;

    pub struct Listing;

    pub struct Purchase;

    pub struct Review;

    /// Gift or red-packet settlement record
    pub struct SpendRecord;

    pub struct AffinityLog;

    pub struct CheckIn;

    pub struct Captcha;

    /// Membership bought with coins
    pub struct VipPurchase;

    pub struct InviteRecord;
}

pub type UserId = Id<markers::User>;
pub type CharacterId = Id<markers::Character>;
pub type ListingId = Id<markers::Listing>;
pub type PurchaseId = Id<markers::Purchase>;
pub type ReviewId = Id<markers::Review>;
pub type SpendRecordId = Id<markers::SpendRecord>;
pub type AffinityLogId = Id<markers::AffinityLog>;
pub type CheckInId = Id<markers::CheckIn>;
pub type CaptchaId = Id<markers::Captcha>;
pub type VipPurchaseId = Id<markers::VipPurchase>;
pub type InviteRecordId = Id<markers::InviteRecord>;
