//! Amount

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};

/// A strictly positive quantity of one currency.
///
/// Every ledger movement goes through this type, so a zero or negative
/// delta cannot reach a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> EconomyResult<Self> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(EconomyError::InvalidAmount)
        }
    }

    #[inline]
    pub const fn get(&self) -> i64 {
        self.0
    }

    /// `self * factor`, failing on overflow.
    pub fn checked_mul(&self, factor: i64) -> EconomyResult<Self> {
        self.0
            .checked_mul(factor)
            .ok_or(EconomyError::InvalidAmount)
            .and_then(Self::new)
    }
}

impl TryFrom<i64> for Amount {
    type Error = EconomyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive() {
        assert!(Amount::new(1).is_ok());
        assert!(matches!(Amount::new(0), Err(EconomyError::InvalidAmount)));
        assert!(matches!(Amount::new(-5), Err(EconomyError::InvalidAmount)));
    }

    #[test]
    fn test_checked_mul() {
        assert_eq!(Amount::new(500).unwrap().checked_mul(3).unwrap().get(), 1_500);
        assert!(Amount::new(i64::MAX).unwrap().checked_mul(2).is_err());
    }
}
