//! Spend Channel

use serde::{Deserialize, Serialize};
use std::fmt;

/// How coins were spent on a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum SpendChannel {
    Gift = 0,
    RedPacket = 1,
}

impl SpendChannel {
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Gift => "gift",
            Self::RedPacket => "red_packet",
        }
    }

    #[inline]
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::Gift),
            1 => Some(Self::RedPacket),
            _ => None,
        }
    }
}

impl fmt::Display for SpendChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
