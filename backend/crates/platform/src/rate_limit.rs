//! Rate Limiting Infrastructure
//!
//! Fixed-window counters keyed by an opaque string. A window opens on the
//! first hit for a key and lasts `window`; once it has passed, the next hit
//! opens a fresh window with count 1.

use std::time::Duration;

use crate::ttl_store::{TtlEntry, TtlStore};

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Outcome of one counter check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Configured ceiling for the window
    pub limit: u32,
    /// Hits counted in the current window, including this one
    pub count: u32,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

impl RateLimitResult {
    fn from_count(count: u32, reset_at_ms: i64, config: &RateLimitConfig) -> Self {
        Self {
            allowed: count <= config.max_requests,
            limit: config.max_requests,
            count,
            remaining: config.max_requests.saturating_sub(count),
            reset_at_ms,
        }
    }

    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        retry_after_secs(self.reset_at_ms, now_ms)
    }
}

/// `ceil((reset_at_ms - now_ms) / 1000)`, never negative.
pub fn retry_after_secs(reset_at_ms: i64, now_ms: i64) -> u64 {
    let remaining_ms = reset_at_ms.saturating_sub(now_ms).max(0) as u64;
    remaining_ms.div_ceil(1000)
}

pub type RateLimitStoreError = Box<dyn std::error::Error + Send + Sync>;

/// Trait for rate limit storage backends
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Count one hit against `key` and report whether it stayed within the
    /// ceiling. The hit is counted even when it is rejected.
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitStoreError>;

    /// Read the current window without counting a hit. A key with no live
    /// window reports count 0.
    async fn peek(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitStoreError>;

    /// Drop windows that have ended. Returns how many were removed.
    async fn sweep_expired(&self, now_ms: i64) -> Result<usize, RateLimitStoreError>;

    /// Number of tracked windows.
    async fn len(&self) -> Result<usize, RateLimitStoreError>;
}

/// In-process fixed-window counters.
#[derive(Debug, Default)]
pub struct FixedWindowCounter {
    windows: TtlStore<String, u32>,
}

impl FixedWindowCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self, key: &str, config: &RateLimitConfig, now_ms: i64) -> RateLimitResult {
        let window_ms = config.window_ms();
        self.windows.upsert(
            key.to_owned(),
            now_ms,
            || TtlEntry::new(0, now_ms.saturating_add(window_ms)),
            |entry| {
                entry.value = entry.value.saturating_add(1);
                RateLimitResult::from_count(entry.value, entry.expires_at_ms, config)
            },
        )
    }

    pub fn current(&self, key: &str, config: &RateLimitConfig, now_ms: i64) -> RateLimitResult {
        match self.windows.get(&key.to_owned(), now_ms) {
            Some(entry) => RateLimitResult::from_count(entry.value, entry.expires_at_ms, config),
            None => RateLimitResult::from_count(0, now_ms.saturating_add(config.window_ms()), config),
        }
    }

    pub fn sweep(&self, now_ms: i64) -> usize {
        self.windows.sweep_expired(now_ms)
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

impl RateLimitStore for FixedWindowCounter {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitStoreError> {
        Ok(self.hit(key, config, now_ms))
    }

    async fn peek(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitStoreError> {
        Ok(self.current(key, config, now_ms))
    }

    async fn sweep_expired(&self, now_ms: i64) -> Result<usize, RateLimitStoreError> {
        Ok(self.sweep(now_ms))
    }

    async fn len(&self) -> Result<usize, RateLimitStoreError> {
        Ok(self.tracked())
    }
}
