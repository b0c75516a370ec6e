//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations with no domain vocabulary:
//! - Digest and comparison helpers
//! - TTL-indexed concurrent storage
//! - Fixed-window rate counters
//! - Per-key async locks

pub mod crypto;
pub mod keyed_lock;
pub mod rate_limit;
pub mod ttl_store;
