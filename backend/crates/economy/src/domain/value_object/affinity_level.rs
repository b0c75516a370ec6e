//! Affinity Level

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest storable affinity value
pub const AFFINITY_MIN: i32 = 0;
/// Highest storable affinity value
pub const AFFINITY_MAX: i32 = 1_000;

/// Named band of the affinity score.
///
/// | value     | level        |
/// |-----------|--------------|
/// | 0-99      | stranger     |
/// | 100-299   | acquaintance |
/// | 300-499   | friend       |
/// | 500-699   | close friend |
/// | 700-899   | intimate     |
/// | 900-1000  | soulmate     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum AffinityLevel {
    #[default]
    Stranger = 0,
    Acquaintance = 1,
    Friend = 2,
    CloseFriend = 3,
    Intimate = 4,
    Soulmate = 5,
}

impl AffinityLevel {
    /// Lower bound of each band, highest first.
    const THRESHOLDS: [(i32, AffinityLevel); 6] = [
        (900, AffinityLevel::Soulmate),
        (700, AffinityLevel::Intimate),
        (500, AffinityLevel::CloseFriend),
        (300, AffinityLevel::Friend),
        (100, AffinityLevel::Acquaintance),
        (AFFINITY_MIN, AffinityLevel::Stranger),
    ];

    /// Level for a (clamped) affinity value.
    pub fn from_value(value: i32) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(floor, _)| value >= *floor)
            .map(|(_, level)| *level)
            .unwrap_or_default()
    }

    /// Smallest value belonging to this level.
    pub fn floor(&self) -> i32 {
        Self::THRESHOLDS
            .iter()
            .find(|(_, level)| level == self)
            .map(|(floor, _)| *floor)
            .unwrap_or(AFFINITY_MIN)
    }

    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Stranger => "stranger",
            Self::Acquaintance => "acquaintance",
            Self::Friend => "friend",
            Self::CloseFriend => "close_friend",
            Self::Intimate => "intimate",
            Self::Soulmate => "soulmate",
        }
    }

    #[inline]
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::Stranger),
            1 => Some(Self::Acquaintance),
            2 => Some(Self::Friend),
            3 => Some(Self::CloseFriend),
            4 => Some(Self::Intimate),
            5 => Some(Self::Soulmate),
            _ => None,
        }
    }
}

impl fmt::Display for AffinityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Clamp an arbitrary score into `[AFFINITY_MIN, AFFINITY_MAX]`.
#[inline]
pub fn clamp_affinity(value: i64) -> i32 {
    value.clamp(AFFINITY_MIN as i64, AFFINITY_MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(AffinityLevel::from_value(0), AffinityLevel::Stranger);
        assert_eq!(AffinityLevel::from_value(99), AffinityLevel::Stranger);
        assert_eq!(AffinityLevel::from_value(100), AffinityLevel::Acquaintance);
        assert_eq!(AffinityLevel::from_value(299), AffinityLevel::Acquaintance);
        assert_eq!(AffinityLevel::from_value(300), AffinityLevel::Friend);
        assert_eq!(AffinityLevel::from_value(500), AffinityLevel::CloseFriend);
        assert_eq!(AffinityLevel::from_value(700), AffinityLevel::Intimate);
        assert_eq!(AffinityLevel::from_value(899), AffinityLevel::Intimate);
        assert_eq!(AffinityLevel::from_value(900), AffinityLevel::Soulmate);
        assert_eq!(AffinityLevel::from_value(1_000), AffinityLevel::Soulmate);
    }

    #[test]
    fn test_floor_matches_from_value() {
        for level in [
            AffinityLevel::Stranger,
            AffinityLevel::Acquaintance,
            AffinityLevel::Friend,
            AffinityLevel::CloseFriend,
            AffinityLevel::Intimate,
            AffinityLevel::Soulmate,
        ] {
            assert_eq!(AffinityLevel::from_value(level.floor()), level);
            assert_eq!(AffinityLevel::from_id(level.id()), Some(level));
        }
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_affinity(-50), 0);
        assert_eq!(clamp_affinity(1_250), 1_000);
        assert_eq!(clamp_affinity(42), 42);
    }
}
