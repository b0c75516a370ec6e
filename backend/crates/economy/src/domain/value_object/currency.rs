//! Currency

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two wallet balances.
///
/// - **Points**: earned by activity (check-in, sign-up bonus), exchangeable
///   for coins
/// - **Coins**: premium currency, spent on gifts, red packets and purchases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Points,
    Coins,
}

impl Currency {
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::Coins => "coins",
        }
    }

    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "points" => Some(Self::Points),
            "coins" => Some(Self::Coins),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
