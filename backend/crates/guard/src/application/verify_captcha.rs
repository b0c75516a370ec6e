//! Verify Captcha Use Case

use std::sync::Arc;

use kernel::id::CaptchaId;
use uuid::Uuid;

use crate::application::config::GuardConfig;
use crate::application::now_ms;
use crate::domain::entities::CaptchaVerdict;
use crate::domain::repository::CaptchaRepository;
use crate::error::{GuardError, GuardResult};

pub struct VerifyCaptchaUseCase<C>
where
    C: CaptchaRepository,
{
    captcha_repo: Arc<C>,
    config: Arc<GuardConfig>,
}

impl<C> VerifyCaptchaUseCase<C>
where
    C: CaptchaRepository,
{
    pub fn new(captcha_repo: Arc<C>, config: Arc<GuardConfig>) -> Self {
        Self {
            captcha_repo,
            config,
        }
    }

    pub async fn execute(&self, captcha_id: &str, answer: &str) -> GuardResult<()> {
        self.execute_at(captcha_id, answer, now_ms()).await
    }

    /// A passed challenge is consumed and cannot be passed again. An
    /// expired one is removed. A wrong answer keeps the challenge unless the
    /// policy says otherwise.
    pub async fn execute_at(&self, captcha_id: &str, answer: &str, now_ms: i64) -> GuardResult<()> {
        let captcha_id = captcha_id.trim();
        if captcha_id.is_empty() {
            return Err(GuardError::InvalidInput("captcha id is required"));
        }
        if answer.trim().is_empty() {
            return Err(GuardError::InvalidInput("captcha answer is required"));
        }
        // a malformed id cannot name a stored challenge
        let Ok(uuid) = Uuid::parse_str(captcha_id) else {
            return Err(GuardError::CaptchaNotFound);
        };
        let captcha_id = CaptchaId::from_uuid(uuid);

        let verdict = self
            .captcha_repo
            .judge(&captcha_id, answer, now_ms, &self.config.captcha_policy)
            .await?
            .ok_or(GuardError::CaptchaNotFound)?;

        match verdict {
            CaptchaVerdict::Passed => {
                tracing::debug!(%captcha_id, "Captcha passed");
                Ok(())
            }
            CaptchaVerdict::Expired => Err(GuardError::CaptchaExpired),
            CaptchaVerdict::Mismatch { exhausted } => {
                tracing::warn!(%captcha_id, exhausted, "Captcha answer mismatch");
                Err(GuardError::CaptchaMismatch)
            }
        }
    }
}
