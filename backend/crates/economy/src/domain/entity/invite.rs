//! Invite Codes and Rewards

use chrono::{DateTime, Utc};
use kernel::id::{InviteRecordId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of a generated code.
pub const INVITE_CODE_LEN: usize = 8;

/// A user's personal invite code. One per user, never reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCode {
    pub user_id: UserId,
    pub code: String,
    pub invite_count: i32,
    pub total_reward_points: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl InviteCode {
    pub fn generate(user_id: UserId, now: DateTime<Utc>) -> Self {
        let code = Uuid::new_v4().simple().to_string()[..INVITE_CODE_LEN].to_ascii_uppercase();
        Self {
            user_id,
            code,
            invite_count: 0,
            total_reward_points: 0,
            active: true,
            created_at: now,
        }
    }

    /// Canonical form of a code typed by a user.
    pub fn normalize(raw: &str) -> String {
        raw.trim().to_ascii_uppercase()
    }

    pub fn record_invite(&mut self, reward_points: i64) {
        self.invite_count = self.invite_count.saturating_add(1);
        self.total_reward_points = self.total_reward_points.saturating_add(reward_points);
    }
}

/// Append-only record of a redeemed code. One per invitee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRecord {
    pub id: InviteRecordId,
    pub inviter_id: UserId,
    pub invitee_id: UserId,
    pub code: String,
    /// Points credited to the inviter
    pub inviter_points: i64,
    /// Points credited to the invitee
    pub invitee_points: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_is_normalized() {
        let code = InviteCode::generate(UserId::new(), Utc::now());
        assert_eq!(code.code.len(), INVITE_CODE_LEN);
        assert_eq!(InviteCode::normalize(&code.code.to_lowercase()), code.code);
        assert_eq!(InviteCode::normalize("  ab12cd34 "), "AB12CD34");
    }

    #[test]
    fn test_record_invite_accumulates() {
        let mut code = InviteCode::generate(UserId::new(), Utc::now());
        code.record_invite(50);
        code.record_invite(50);
        assert_eq!((code.invite_count, code.total_reward_points), (2, 100));
    }
}
