//! Economy Backend Module
//!
//! The in-app economy of the companion-chat service:
//! - Wallet ledger - points and coins per user, lifetime counters,
//!   check-in rewards, point exchange, recharge, VIP memberships, invite
//!   rewards
//! - Affinity tracker - bounded closeness score per (user, character)
//! - Marketplace engine - listing, purchase with platform fee and character
//!   cloning, reviews
//! - Gift / red-packet dispatcher - coin spends that grant affinity
//!
//! Layout:
//! - `domain/` - entities, value objects, pure rules, store traits
//! - `application/` - config and the four services
//! - `infra/` - Postgres and in-memory stores
//!
//! ## Consistency model
//! Every operation is one unit of work on an [`EconomyTx`]: rows are locked
//! (wallets by ascending user id, then listing, then affinity, then
//! character), validated, written, and committed together. Any failure
//! rolls the whole unit back, so no balance, listing, or affinity change is
//! ever visible on its own.
//!
//! [`EconomyTx`]: domain::repository::EconomyTx

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

pub use application::config::EconomyConfig;
pub use application::{
    affinity::AffinityTracker, gifting::GiftDispatcher, ledger::WalletLedger,
    marketplace::MarketplaceEngine,
};
pub use error::{EconomyError, EconomyResult};
pub use infra::memory::MemoryEconomyStore;
pub use infra::postgres::PgEconomyStore;

pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[cfg(test)]
mod tests;
