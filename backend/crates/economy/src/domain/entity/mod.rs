//! Entity Module

pub mod affinity;
pub mod character;
pub mod check_in;
pub mod invite;
pub mod listing;
pub mod purchase;
pub mod receipt;
pub mod review;
pub mod spend;
pub mod vip;
pub mod wallet;
