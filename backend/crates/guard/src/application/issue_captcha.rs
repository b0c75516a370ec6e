//! Issue Captcha Use Case

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::id::CaptchaId;
use serde::Serialize;

use crate::application::config::GuardConfig;
use crate::domain::entities::CaptchaChallenge;
use crate::domain::repository::CaptchaRepository;
use crate::domain::services::{MathQuestion, generate_math_question};
use crate::error::GuardResult;

/// What the client gets to see. The answer never leaves the server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCaptchaOutput {
    pub captcha_id: CaptchaId,
    pub question: String,
    pub expires_at_ms: i64,
}

pub struct IssueCaptchaUseCase<C>
where
    C: CaptchaRepository,
{
    captcha_repo: Arc<C>,
    config: Arc<GuardConfig>,
}

impl<C> IssueCaptchaUseCase<C>
where
    C: CaptchaRepository,
{
    pub fn new(captcha_repo: Arc<C>, config: Arc<GuardConfig>) -> Self {
        Self {
            captcha_repo,
            config,
        }
    }

    pub async fn execute(&self) -> GuardResult<IssueCaptchaOutput> {
        // thread rng is !Send, keep it out of the await
        let question = generate_math_question(&mut rand::rng());
        self.issue(question, Utc::now()).await
    }

    /// Store a challenge for an already generated question.
    pub async fn issue(
        &self,
        question: MathQuestion,
        now: DateTime<Utc>,
    ) -> GuardResult<IssueCaptchaOutput> {
        let challenge = CaptchaChallenge::new(question, self.config.captcha_ttl_ms(), now);
        self.captcha_repo.create(&challenge).await?;

        tracing::info!(
            captcha_id = %challenge.id,
            expires_at_ms = challenge.expires_at_ms,
            "Issued captcha"
        );

        Ok(IssueCaptchaOutput {
            captcha_id: challenge.id,
            question: challenge.question,
            expires_at_ms: challenge.expires_at_ms,
        })
    }
}
