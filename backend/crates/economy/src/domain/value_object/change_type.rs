//! Affinity Change Type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an affinity score moved. Stored on every log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum AffinityChangeType {
    Chat = 0,
    Gift = 1,
    RedPacket = 2,
    /// Moderation deduction
    Penalty = 3,
    /// Manual correction by an operator
    Adjustment = 4,
}

impl AffinityChangeType {
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Gift => "gift",
            Self::RedPacket => "red_packet",
            Self::Penalty => "penalty",
            Self::Adjustment => "adjustment",
        }
    }

    #[inline]
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::Chat),
            1 => Some(Self::Gift),
            2 => Some(Self::RedPacket),
            3 => Some(Self::Penalty),
            4 => Some(Self::Adjustment),
            _ => None,
        }
    }
}

impl fmt::Display for AffinityChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
