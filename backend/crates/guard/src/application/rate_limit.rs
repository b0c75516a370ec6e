//! Rate Limit Use Case

use std::sync::Arc;

use platform::rate_limit::{RateLimitConfig, RateLimitResult, RateLimitStore};

use crate::application::now_ms;
use crate::domain::value_objects::LimiterName;
use crate::error::{GuardError, GuardResult};

/// One named fixed-window limiter.
pub struct RateLimiter<L>
where
    L: RateLimitStore,
{
    name: LimiterName,
    config: RateLimitConfig,
    store: Arc<L>,
}

impl<L> RateLimiter<L>
where
    L: RateLimitStore,
{
    pub fn new(name: LimiterName, config: RateLimitConfig, store: Arc<L>) -> Self {
        Self {
            name,
            config,
            store,
        }
    }

    pub fn name(&self) -> LimiterName {
        self.name
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count a request from `client_key` (normally the client address).
    ///
    /// On success the result carries limit / remaining / reset for response
    /// headers. Over the ceiling fails with `RateLimited`.
    pub async fn check(&self, client_key: &str) -> GuardResult<RateLimitResult> {
        self.check_at(client_key, now_ms()).await
    }

    pub async fn check_at(&self, client_key: &str, now_ms: i64) -> GuardResult<RateLimitResult> {
        let result = self
            .store
            .check_and_increment(&self.name.key_for(client_key), &self.config, now_ms)
            .await?;

        if !result.allowed {
            let retry_after_secs = result.retry_after_secs(now_ms);
            tracing::warn!(
                limiter = %self.name,
                client = client_key,
                count = result.count,
                retry_after_secs,
                "Rate limit exceeded"
            );
            return Err(GuardError::RateLimited {
                limiter: self.name,
                retry_after_secs,
            });
        }

        Ok(result)
    }
}
