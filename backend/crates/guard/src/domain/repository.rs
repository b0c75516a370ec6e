//! Repository Traits
//!
//! Interfaces for challenge persistence. Rate counters use
//! `platform::rate_limit::RateLimitStore` directly.

use kernel::id::CaptchaId;

use crate::domain::entities::{CaptchaChallenge, CaptchaVerdict};
use crate::domain::value_objects::CaptchaPolicy;
use crate::error::GuardResult;

#[trait_variant::make(CaptchaRepository: Send)]
pub trait LocalCaptchaRepository {
    async fn create(&self, challenge: &CaptchaChallenge) -> GuardResult<()>;

    /// Judge an answer against a stored challenge in one atomic step,
    /// removing the challenge when the verdict consumes it. `None` when the
    /// id is unknown.
    async fn judge(
        &self,
        captcha_id: &CaptchaId,
        answer: &str,
        now_ms: i64,
        policy: &CaptchaPolicy,
    ) -> GuardResult<Option<CaptchaVerdict>>;

    async fn sweep_expired(&self, now_ms: i64) -> GuardResult<usize>;

    /// Stored challenges, including expired ones not yet swept
    async fn count(&self) -> GuardResult<usize>;
}
