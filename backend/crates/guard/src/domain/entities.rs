//! Domain Entities

use chrono::{DateTime, Utc};
use kernel::id::CaptchaId;

use crate::domain::services::{MathQuestion, answer_matches};
use crate::domain::value_objects::CaptchaPolicy;

/// Captcha challenge - a question issued to a client, valid until
/// `expires_at_ms` and for at most one successful answer.
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
    pub id: CaptchaId,
    pub question: String,
    pub answer: String,
    pub failed_attempts: u32,
    pub expires_at_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of judging one submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaVerdict {
    Passed,
    Expired,
    Mismatch { exhausted: bool },
}

impl CaptchaVerdict {
    /// Whether the challenge must be removed after this verdict.
    pub fn consumes_challenge(&self) -> bool {
        match self {
            CaptchaVerdict::Passed | CaptchaVerdict::Expired => true,
            CaptchaVerdict::Mismatch { exhausted } => *exhausted,
        }
    }
}

impl CaptchaChallenge {
    pub fn new(question: MathQuestion, ttl_ms: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: CaptchaId::new(),
            question: question.text,
            answer: question.answer,
            failed_attempts: 0,
            expires_at_ms: now.timestamp_millis() + ttl_ms,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms < now_ms
    }

    pub fn judge(&mut self, submitted: &str, now_ms: i64, policy: &CaptchaPolicy) -> CaptchaVerdict {
        if self.is_expired(now_ms) {
            return CaptchaVerdict::Expired;
        }
        if answer_matches(&self.answer, submitted) {
            return CaptchaVerdict::Passed;
        }
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        CaptchaVerdict::Mismatch {
            exhausted: policy.burn_on_mismatch || self.failed_attempts >= policy.max_attempts,
        }
    }
}
