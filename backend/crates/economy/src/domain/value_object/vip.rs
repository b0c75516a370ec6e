//! VIP Plan
//!
//! A plan is a membership level bought for a fixed duration.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EconomyError, EconomyResult};

/// Paid membership tier. Level 0 (no membership) is never sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum VipLevel {
    Vip = 1,
    Svip = 2,
    Ssvip = 3,
}

impl VipLevel {
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Vip => "vip",
            Self::Svip => "svip",
            Self::Ssvip => "ssvip",
        }
    }

    #[inline]
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::Vip),
            2 => Some(Self::Svip),
            3 => Some(Self::Ssvip),
            _ => None,
        }
    }
}

impl fmt::Display for VipLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum VipDuration {
    Monthly = 0,
    Quarterly = 1,
    Yearly = 2,
}

impl VipDuration {
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    /// Calendar months covered.
    #[inline]
    pub const fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Yearly => 12,
        }
    }

    #[inline]
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::Monthly),
            1 => Some(Self::Quarterly),
            2 => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }
}

impl fmt::Display for VipDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A level together with how long it is bought for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VipPlan {
    pub level: VipLevel,
    pub duration: VipDuration,
}

impl VipPlan {
    /// Parse client input: level id 1-3, duration code.
    pub fn parse(level: i16, duration: &str) -> EconomyResult<Self> {
        let level = VipLevel::from_id(level).ok_or(EconomyError::InvalidVipPlan)?;
        let duration =
            VipDuration::from_code(duration.trim()).ok_or(EconomyError::InvalidVipPlan)?;
        Ok(Self { level, duration })
    }
}

impl fmt::Display for VipPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.level, self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_parse() {
        let plan = VipPlan::parse(2, " quarterly ").unwrap();
        assert_eq!(plan.level, VipLevel::Svip);
        assert_eq!(plan.duration.months(), 3);

        assert!(matches!(VipPlan::parse(0, "monthly"), Err(EconomyError::InvalidVipPlan)));
        assert!(matches!(VipPlan::parse(4, "monthly"), Err(EconomyError::InvalidVipPlan)));
        assert!(matches!(VipPlan::parse(1, "weekly"), Err(EconomyError::InvalidVipPlan)));
    }

    #[test]
    fn test_storage_codes() {
        for level in [VipLevel::Vip, VipLevel::Svip, VipLevel::Ssvip] {
            assert_eq!(VipLevel::from_id(level.id()), Some(level));
        }
        for duration in [VipDuration::Monthly, VipDuration::Quarterly, VipDuration::Yearly] {
            assert_eq!(VipDuration::from_id(duration.id()), Some(duration));
            assert_eq!(VipDuration::from_code(duration.code()), Some(duration));
        }
    }
}
