//! Economy Error Types
//!
//! Economy-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

use crate::domain::value_object::currency::Currency;

pub type EconomyResult<T> = Result<T, EconomyError>;

#[derive(Debug, Error)]
pub enum EconomyError {
    /// Amount is zero, negative, or overflows
    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Insufficient {currency}: required {required}, available {available}")]
    InsufficientFunds {
        currency: Currency,
        required: i64,
        available: i64,
    },

    /// Listing price below the minimum of 1 coin
    #[error("Invalid price")]
    InvalidPrice,

    #[error("Rating must be between 1 and 5")]
    InvalidRating,

    #[error("Not the owner of this {0}")]
    NotOwner(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Character already has an active listing")]
    AlreadyListed,

    /// Listing is sold or delisted
    #[error("Listing is no longer available")]
    ListingUnavailable,

    #[error("Cannot purchase your own listing")]
    SelfPurchase,

    #[error("Cannot transfer to yourself")]
    SelfTransfer,

    #[error("Only buyers can review a listing")]
    NotPurchased,

    #[error("Listing already reviewed")]
    DuplicateReview,

    #[error("Already checked in today")]
    AlreadyCheckedIn,

    #[error("At least {minimum} points are required to exchange")]
    BelowMinimumExchange { minimum: i64 },

    /// Unknown VIP level or duration
    #[error("Invalid VIP plan")]
    InvalidVipPlan,

    #[error("Cannot redeem your own invite code")]
    SelfInvite,

    /// The invitee already redeemed a code
    #[error("Invite already redeemed")]
    AlreadyInvited,

    #[error("Invalid idempotency key")]
    InvalidIdempotencyKey,

    /// Key already used for a different operation or different parameters
    #[error("Idempotency key reused for a different request")]
    IdempotencyKeyReused,

    /// Lost a race with a concurrent writer; safe to retry
    #[error("Concurrent update: {0}")]
    Conflict(String),

    /// Store unreachable or exhausted
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EconomyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EconomyError::InvalidAmount
            | EconomyError::InvalidPrice
            | EconomyError::InvalidRating
            | EconomyError::BelowMinimumExchange { .. }
            | EconomyError::InvalidVipPlan
            | EconomyError::InvalidIdempotencyKey => ErrorKind::BadRequest,
            EconomyError::InsufficientFunds { .. } => ErrorKind::PaymentRequired,
            EconomyError::NotOwner(_) | EconomyError::NotPurchased => ErrorKind::Forbidden,
            EconomyError::NotFound(_) => ErrorKind::NotFound,
            EconomyError::AlreadyListed
            | EconomyError::DuplicateReview
            | EconomyError::AlreadyCheckedIn
            | EconomyError::AlreadyInvited
            | EconomyError::IdempotencyKeyReused
            | EconomyError::Conflict(_) => ErrorKind::Conflict,
            EconomyError::ListingUnavailable => ErrorKind::Gone,
            EconomyError::SelfPurchase | EconomyError::SelfTransfer | EconomyError::SelfInvite => {
                ErrorKind::UnprocessableEntity
            }
            EconomyError::StoreUnavailable(_) => ErrorKind::ServiceUnavailable,
            EconomyError::Database(_) | EconomyError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    fn log(&self) {
        match self {
            EconomyError::Database(e) => {
                tracing::error!(error = %e, "Economy database error");
            }
            EconomyError::Internal(msg) => {
                tracing::error!(message = %msg, "Economy internal error");
            }
            EconomyError::StoreUnavailable(msg) => {
                tracing::error!(message = %msg, "Economy store unavailable");
            }
            EconomyError::InsufficientFunds {
                currency,
                required,
                available,
            } => {
                tracing::warn!(%currency, required, available, "Insufficient funds");
            }
            EconomyError::Conflict(msg) => {
                tracing::warn!(message = %msg, "Economy write conflict");
            }
            _ => {
                tracing::debug!(error = %self, "Economy error");
            }
        }
    }
}

/// Unique constraints that carry business meaning.
const ACTIVE_LISTING_CONSTRAINT: &str = "character_listings_one_active";
const REVIEW_CONSTRAINT: &str = "listing_reviews_one_per_reviewer";
const CHECK_IN_CONSTRAINT: &str = "check_ins_one_per_day";
const INVITEE_CONSTRAINT: &str = "invite_records_one_per_invitee";

impl From<sqlx::Error> for EconomyError {
    fn from(err: sqlx::Error) -> Self {
        let classified = match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Some(EconomyError::StoreUnavailable(err.to_string()))
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|code| code.into_owned());
                match code.as_deref() {
                    // serialization_failure / deadlock_detected
                    Some("40001") | Some("40P01") => {
                        Some(EconomyError::Conflict(db_err.message().to_owned()))
                    }
                    Some("23505") => Some(match db_err.constraint() {
                        Some(ACTIVE_LISTING_CONSTRAINT) => EconomyError::AlreadyListed,
                        Some(REVIEW_CONSTRAINT) => EconomyError::DuplicateReview,
                        Some(CHECK_IN_CONSTRAINT) => EconomyError::AlreadyCheckedIn,
                        Some(INVITEE_CONSTRAINT) => EconomyError::AlreadyInvited,
                        _ => EconomyError::Conflict(db_err.message().to_owned()),
                    }),
                    _ => None,
                }
            }
            _ => None,
        };
        classified.unwrap_or_else(|| EconomyError::Database(err))
    }
}

impl From<serde_json::Error> for EconomyError {
    fn from(err: serde_json::Error) -> Self {
        EconomyError::Internal(format!("receipt encoding: {err}"))
    }
}

impl From<EconomyError> for AppError {
    fn from(err: EconomyError) -> Self {
        err.log();
        let kind = err.kind();
        let message = err.to_string();
        match err {
            EconomyError::Database(source) => {
                AppError::new(kind, "Database error").with_source(source)
            }
            EconomyError::Conflict(_) => {
                AppError::new(kind, "Concurrent update").with_action("Retry the operation")
            }
            EconomyError::InsufficientFunds { .. } => {
                AppError::new(kind, message).with_action("Top up your wallet")
            }
            _ => AppError::new(kind, message),
        }
    }
}
