//! Daily Check-in Record

use chrono::{DateTime, NaiveDate, Utc};
use kernel::id::{CheckInId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRecord {
    pub id: CheckInId,
    pub user_id: UserId,
    /// UTC calendar day
    pub check_in_date: NaiveDate,
    pub consecutive_days: i32,
    pub points_earned: i64,
    pub created_at: DateTime<Utc>,
}

impl CheckInRecord {
    /// Streak length for a check-in on `today` following `previous`.
    ///
    /// Returns `None` when `previous` already covers `today`.
    pub fn next_streak(previous: Option<&CheckInRecord>, today: NaiveDate) -> Option<i32> {
        match previous {
            Some(last) if last.check_in_date >= today => None,
            Some(last) if today.pred_opt() == Some(last.check_in_date) => {
                Some(last.consecutive_days.saturating_add(1))
            }
            _ => Some(1),
        }
    }
}
