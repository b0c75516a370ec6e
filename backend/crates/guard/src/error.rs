//! Guard Error Types
//!
//! Abuse-control rejections, convertible into the unified
//! `kernel::error::AppError`.

use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::rate_limit::RateLimitStoreError;
use thiserror::Error;

use crate::domain::value_objects::{LimiterName, RegistrationLimit};

pub type GuardResult<T> = Result<T, GuardError>;

#[derive(Debug, Error)]
pub enum GuardError {
    /// Window ceiling exceeded for one named limiter
    #[error("Too many requests ({limiter})")]
    RateLimited {
        limiter: LimiterName,
        retry_after_secs: u64,
    },

    /// Unknown id, already used, or already swept
    #[error("Captcha not found or already used")]
    CaptchaNotFound,

    #[error("Captcha expired")]
    CaptchaExpired,

    #[error("Captcha answer is incorrect")]
    CaptchaMismatch,

    #[error("{limit}")]
    RegistrationThrottled {
        limit: RegistrationLimit,
        retry_after_secs: u64,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    /// Counter backend failure
    #[error("Counter store error: {0}")]
    Store(String),
}

impl GuardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GuardError::RateLimited { .. } | GuardError::RegistrationThrottled { .. } => {
                ErrorKind::TooManyRequests
            }
            GuardError::CaptchaNotFound | GuardError::CaptchaExpired => ErrorKind::Gone,
            GuardError::CaptchaMismatch => ErrorKind::UnprocessableEntity,
            GuardError::InvalidInput(_) => ErrorKind::BadRequest,
            GuardError::Store(_) => ErrorKind::ServiceUnavailable,
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GuardError::RateLimited {
                retry_after_secs, ..
            }
            | GuardError::RegistrationThrottled {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }

    fn log(&self) {
        match self {
            GuardError::Store(msg) => {
                tracing::error!(message = %msg, "Guard counter store error");
            }
            GuardError::RateLimited {
                limiter,
                retry_after_secs,
            } => {
                tracing::warn!(%limiter, retry_after_secs, "Request rejected by rate limiter");
            }
            GuardError::RegistrationThrottled {
                limit,
                retry_after_secs,
            } => {
                tracing::warn!(limit = limit.code(), retry_after_secs, "Registration throttled");
            }
            _ => {
                tracing::debug!(error = %self, "Guard rejection");
            }
        }
    }
}

impl From<RateLimitStoreError> for GuardError {
    fn from(err: RateLimitStoreError) -> Self {
        GuardError::Store(err.to_string())
    }
}

impl From<GuardError> for AppError {
    fn from(err: GuardError) -> Self {
        err.log();
        let app_err = AppError::new(err.kind(), err.to_string());
        match err.retry_after_secs() {
            Some(secs) => app_err
                .with_action("Wait before trying again")
                .with_retry_after(secs),
            None => app_err,
        }
    }
}
