//! Affinity Entities
//!
//! One [`AffinityRecord`] per (user, character) pair and an append-only
//! [`AffinityLogEntry`] per mutation.

use chrono::{DateTime, NaiveDate, Utc};
use kernel::id::{AffinityLogId, CharacterId, UserId};
use serde::{Deserialize, Serialize};

use crate::domain::value_object::affinity_level::{AffinityLevel, clamp_affinity};
use crate::domain::value_object::change_type::AffinityChangeType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffinityRecord {
    pub user_id: UserId,
    pub character_id: CharacterId,
    /// Always within `[AFFINITY_MIN, AFFINITY_MAX]`
    pub value: i32,
    pub level: AffinityLevel,
    pub total_interactions: i64,
    /// Interactions on `last_interaction_on`
    pub daily_interactions: i32,
    /// Consecutive UTC days with at least one interaction
    pub streak_days: i32,
    pub last_interaction_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Before/after view of one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffinityChange {
    pub before: i32,
    pub after: i32,
    pub level_before: AffinityLevel,
    pub level_after: AffinityLevel,
}

impl AffinityChange {
    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }

    /// Effective delta after clamping.
    pub fn applied(&self) -> i32 {
        self.after - self.before
    }
}

impl AffinityRecord {
    /// A pair that has never interacted.
    pub fn new(user_id: UserId, character_id: CharacterId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            character_id,
            value: 0,
            level: AffinityLevel::Stranger,
            total_interactions: 0,
            daily_interactions: 0,
            streak_days: 0,
            last_interaction_on: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply `delta`, saturating at the bounds, and count the interaction.
    pub fn apply(&mut self, delta: i32, now: DateTime<Utc>) -> AffinityChange {
        let before = self.value;
        let level_before = self.level;

        self.value = clamp_affinity(i64::from(before) + i64::from(delta));
        self.level = AffinityLevel::from_value(self.value);
        self.total_interactions += 1;
        self.touch_day(now.date_naive());
        self.updated_at = now;

        AffinityChange {
            before,
            after: self.value,
            level_before,
            level_after: self.level,
        }
    }

    fn touch_day(&mut self, today: NaiveDate) {
        match self.last_interaction_on {
            // a clock stepping backwards counts as the same day
            Some(last) if last >= today => {
                self.daily_interactions += 1;
            }
            Some(last) if today.pred_opt() == Some(last) => {
                self.daily_interactions = 1;
                self.streak_days += 1;
            }
            _ => {
                self.daily_interactions = 1;
                self.streak_days = 1;
            }
        }
        self.last_interaction_on = Some(self.last_interaction_on.map_or(today, |d| d.max(today)));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffinityLogEntry {
    pub id: AffinityLogId,
    pub user_id: UserId,
    pub character_id: CharacterId,
    pub change_type: AffinityChangeType,
    /// Requested delta, before clamping
    pub change_value: i32,
    pub before_value: i32,
    pub after_value: i32,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AffinityLogEntry {
    pub fn record(
        record: &AffinityRecord,
        change_type: AffinityChangeType,
        delta: i32,
        change: &AffinityChange,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AffinityLogId::new(),
            user_id: record.user_id,
            character_id: record.character_id,
            change_type,
            change_value: delta,
            before_value: change.before,
            after_value: change.after,
            reason,
            created_at: now,
        }
    }
}
