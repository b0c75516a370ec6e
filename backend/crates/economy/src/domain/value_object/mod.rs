//! Value Object Module

pub mod affinity_level;
pub mod amount;
pub mod change_type;
pub mod currency;
pub mod idempotency_key;
pub mod listing_status;
pub mod rating;
pub mod spend_channel;
pub mod vip;
