//! Abuse Guard facade
//!
//! Owns every abuse-control component so the process can hold one value
//! and sweep or report on all of them together.

use std::sync::Arc;

use platform::rate_limit::{RateLimitResult, RateLimitStore};
use serde::Serialize;

use crate::application::config::GuardConfig;
use crate::application::issue_captcha::{IssueCaptchaOutput, IssueCaptchaUseCase};
use crate::application::now_ms;
use crate::application::rate_limit::RateLimiter;
use crate::application::registration::RegistrationThrottle;
use crate::application::verify_captcha::VerifyCaptchaUseCase;
use crate::domain::repository::CaptchaRepository;
use crate::domain::value_objects::{LimiterName, RegistrationSubject};
use crate::error::GuardResult;

/// Live entry counts for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardStats {
    pub rate_limit_entries: usize,
    pub captcha_entries: usize,
    pub registration_entries: usize,
}

/// Entries removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rate_limits: usize,
    pub captchas: usize,
    pub registrations: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.rate_limits + self.captchas + self.registrations
    }
}

pub struct AbuseGuard<C, L>
where
    C: CaptchaRepository,
    L: RateLimitStore,
{
    config: Arc<GuardConfig>,
    captcha_repo: Arc<C>,
    rate_counters: Arc<L>,
    registration_counters: Arc<L>,
    limiters: [RateLimiter<L>; 4],
    issue_captcha: IssueCaptchaUseCase<C>,
    verify_captcha: VerifyCaptchaUseCase<C>,
    registration: RegistrationThrottle<L>,
}

impl<C, L> AbuseGuard<C, L>
where
    C: CaptchaRepository,
    L: RateLimitStore,
{
    pub fn new(
        config: Arc<GuardConfig>,
        captcha_repo: Arc<C>,
        rate_counters: Arc<L>,
        registration_counters: Arc<L>,
    ) -> Self {
        let limiters = LimiterName::ALL.map(|name| {
            RateLimiter::new(
                name,
                config.limit_for(name).clone(),
                rate_counters.clone(),
            )
        });
        Self {
            issue_captcha: IssueCaptchaUseCase::new(captcha_repo.clone(), config.clone()),
            verify_captcha: VerifyCaptchaUseCase::new(captcha_repo.clone(), config.clone()),
            registration: RegistrationThrottle::new(
                registration_counters.clone(),
                config.registration_limit.clone(),
            ),
            limiters,
            config,
            captcha_repo,
            rate_counters,
            registration_counters,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn limiter(&self, name: LimiterName) -> &RateLimiter<L> {
        let index = match name {
            LimiterName::Global => 0,
            LimiterName::Login => 1,
            LimiterName::Register => 2,
            LimiterName::Chat => 3,
        };
        &self.limiters[index]
    }

    pub async fn check_rate(
        &self,
        name: LimiterName,
        client_key: &str,
    ) -> GuardResult<RateLimitResult> {
        self.limiter(name).check(client_key).await
    }

    pub async fn issue_captcha(&self) -> GuardResult<IssueCaptchaOutput> {
        self.issue_captcha.execute().await
    }

    pub fn captcha_issuer(&self) -> &IssueCaptchaUseCase<C> {
        &self.issue_captcha
    }

    pub async fn verify_captcha(&self, captcha_id: &str, answer: &str) -> GuardResult<()> {
        self.verify_captcha.execute(captcha_id, answer).await
    }

    pub fn captcha_verifier(&self) -> &VerifyCaptchaUseCase<C> {
        &self.verify_captcha
    }

    pub async fn check_registration(&self, subject: &RegistrationSubject) -> GuardResult<()> {
        self.registration.check(subject).await
    }

    pub async fn record_registration(&self, subject: &RegistrationSubject) -> GuardResult<()> {
        self.registration.record(subject).await
    }

    pub fn registration_throttle(&self) -> &RegistrationThrottle<L> {
        &self.registration
    }

    pub async fn sweep_expired(&self) -> GuardResult<SweepReport> {
        self.sweep_expired_at(now_ms()).await
    }

    pub async fn sweep_expired_at(&self, now_ms: i64) -> GuardResult<SweepReport> {
        Ok(SweepReport {
            rate_limits: self.rate_counters.sweep_expired(now_ms).await?,
            captchas: self.captcha_repo.sweep_expired(now_ms).await?,
            registrations: self.registration_counters.sweep_expired(now_ms).await?,
        })
    }

    pub async fn stats(&self) -> GuardResult<GuardStats> {
        Ok(GuardStats {
            rate_limit_entries: self.rate_counters.len().await?,
            captcha_entries: self.captcha_repo.count().await?,
            registration_entries: self.registration_counters.len().await?,
        })
    }
}
