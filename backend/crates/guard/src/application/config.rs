//! Application Configuration

use std::time::Duration;

use platform::rate_limit::RateLimitConfig;

use crate::domain::value_objects::{CaptchaPolicy, LimiterName};

#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Every request, per client address
    pub global_limit: RateLimitConfig,
    /// Login attempts, per client address
    pub login_limit: RateLimitConfig,
    /// Registration endpoint hits, per client address
    pub register_limit: RateLimitConfig,
    /// Chat messages, per client address
    pub chat_limit: RateLimitConfig,
    pub captcha_ttl: Duration,
    pub captcha_policy: CaptchaPolicy,
    /// Completed registrations, per address and per device
    pub registration_limit: RateLimitConfig,
    pub sweep_interval: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            global_limit: RateLimitConfig::new(100, 60),
            login_limit: RateLimitConfig::new(5, 15 * 60),
            register_limit: RateLimitConfig::new(3, 60 * 60),
            chat_limit: RateLimitConfig::new(30, 60),
            captcha_ttl: Duration::from_secs(5 * 60),
            captcha_policy: CaptchaPolicy::default(),
            registration_limit: RateLimitConfig::new(3, 60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl GuardConfig {
    /// Loose limits for local development.
    pub fn development() -> Self {
        Self {
            global_limit: RateLimitConfig::new(10_000, 60),
            login_limit: RateLimitConfig::new(100, 60),
            register_limit: RateLimitConfig::new(100, 60),
            chat_limit: RateLimitConfig::new(1_000, 60),
            registration_limit: RateLimitConfig::new(100, 60),
            ..Self::default()
        }
    }

    pub fn limit_for(&self, name: LimiterName) -> &RateLimitConfig {
        match name {
            LimiterName::Global => &self.global_limit,
            LimiterName::Login => &self.login_limit,
            LimiterName::Register => &self.register_limit,
            LimiterName::Chat => &self.chat_limit,
        }
    }

    pub fn captcha_ttl_ms(&self) -> i64 {
        self.captcha_ttl.as_millis() as i64
    }
}
