//! In-process stores
//!
//! Captcha challenges live in a [`TtlStore`]; judging runs under the key's
//! shard lock so a challenge can be passed at most once even under
//! concurrent submissions.

use std::sync::Arc;

use kernel::id::CaptchaId;
use platform::rate_limit::FixedWindowCounter;
use platform::ttl_store::{Retention, TtlStore};

use crate::application::config::GuardConfig;
use crate::application::guard::AbuseGuard;
use crate::domain::entities::{CaptchaChallenge, CaptchaVerdict};
use crate::domain::repository::CaptchaRepository;
use crate::domain::value_objects::CaptchaPolicy;
use crate::error::GuardResult;

/// Guard wired to in-process stores.
pub type InMemoryGuard = AbuseGuard<MemoryCaptchaRepository, FixedWindowCounter>;

#[derive(Debug, Default)]
pub struct MemoryCaptchaRepository {
    challenges: TtlStore<CaptchaId, CaptchaChallenge>,
}

impl MemoryCaptchaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live challenge by id, without judging it.
    pub fn find(&self, captcha_id: &CaptchaId, now_ms: i64) -> Option<CaptchaChallenge> {
        self.challenges
            .get(captcha_id, now_ms)
            .map(|entry| entry.value)
    }
}

impl CaptchaRepository for MemoryCaptchaRepository {
    async fn create(&self, challenge: &CaptchaChallenge) -> GuardResult<()> {
        self.challenges
            .insert(challenge.id, challenge.clone(), challenge.expires_at_ms);
        Ok(())
    }

    async fn judge(
        &self,
        captcha_id: &CaptchaId,
        answer: &str,
        now_ms: i64,
        policy: &CaptchaPolicy,
    ) -> GuardResult<Option<CaptchaVerdict>> {
        Ok(self.challenges.modify(captcha_id, |entry| {
            let verdict = entry.value.judge(answer, now_ms, policy);
            let retention = if verdict.consumes_challenge() {
                Retention::Discard
            } else {
                Retention::Keep
            };
            (verdict, retention)
        }))
    }

    async fn sweep_expired(&self, now_ms: i64) -> GuardResult<usize> {
        Ok(self.challenges.sweep_expired(now_ms))
    }

    async fn count(&self) -> GuardResult<usize> {
        Ok(self.challenges.len())
    }
}

impl InMemoryGuard {
    /// Guard with fresh in-process stores. Rate limiters and the
    /// registration throttle get separate counter stores so their entry
    /// counts can be reported apart.
    pub fn in_memory(config: GuardConfig) -> Self {
        AbuseGuard::new(
            Arc::new(config),
            Arc::new(MemoryCaptchaRepository::new()),
            Arc::new(FixedWindowCounter::new()),
            Arc::new(FixedWindowCounter::new()),
        )
    }
}
