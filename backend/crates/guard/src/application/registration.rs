//! Registration Throttle Use Case
//!
//! Sign-ups are capped per network address and, when present, per device
//! fingerprint. `check` must run before the account is created and
//! `record` only after it was created, so failed attempts never count.

use std::sync::Arc;

use platform::crypto::digest_key;
use platform::rate_limit::{RateLimitConfig, RateLimitStore};

use crate::application::now_ms;
use crate::domain::value_objects::{RegistrationLimit, RegistrationSubject};
use crate::error::{GuardError, GuardResult};

const IP_KEY_PREFIX: &str = "reg_ip_";
const DEVICE_KEY_PREFIX: &str = "reg_device_";

pub struct RegistrationThrottle<L>
where
    L: RateLimitStore,
{
    store: Arc<L>,
    config: RateLimitConfig,
}

impl<L> RegistrationThrottle<L>
where
    L: RateLimitStore,
{
    pub fn new(store: Arc<L>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    fn keys(subject: &RegistrationSubject) -> Vec<(RegistrationLimit, String)> {
        let mut keys = vec![(
            RegistrationLimit::Ip,
            format!("{IP_KEY_PREFIX}{}", subject.ip()),
        )];
        if let Some(device) = subject.device_id() {
            keys.push((
                RegistrationLimit::Device,
                digest_key(DEVICE_KEY_PREFIX, device),
            ));
        }
        keys
    }

    pub async fn check(&self, subject: &RegistrationSubject) -> GuardResult<()> {
        self.check_at(subject, now_ms()).await
    }

    /// Fails with `RegistrationThrottled` once either counter has reached
    /// the ceiling in its current window. Does not count anything.
    pub async fn check_at(&self, subject: &RegistrationSubject, now_ms: i64) -> GuardResult<()> {
        for (limit, key) in Self::keys(subject) {
            let window = self.store.peek(&key, &self.config, now_ms).await?;
            if window.count >= self.config.max_requests {
                let retry_after_secs = window.retry_after_secs(now_ms);
                tracing::warn!(
                    limit = limit.code(),
                    ip = subject.ip(),
                    registrations = window.count,
                    retry_after_secs,
                    "Registration throttled"
                );
                return Err(GuardError::RegistrationThrottled {
                    limit,
                    retry_after_secs,
                });
            }
        }
        Ok(())
    }

    pub async fn record(&self, subject: &RegistrationSubject) -> GuardResult<()> {
        self.record_at(subject, now_ms()).await
    }

    /// Count one completed registration against every applicable key.
    pub async fn record_at(&self, subject: &RegistrationSubject, now_ms: i64) -> GuardResult<()> {
        for (limit, key) in Self::keys(subject) {
            let window = self
                .store
                .check_and_increment(&key, &self.config, now_ms)
                .await?;
            tracing::debug!(
                limit = limit.code(),
                registrations = window.count,
                "Registration recorded"
            );
        }
        Ok(())
    }
}
